//! User administration and self-service endpoints.

use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, State},
};
use playdock_core::{GameStore, UserId};
use serde::Deserialize;
use serde_json::{Value, json};
use validator::Validate;

use super::{ApiError, WriteAck};
use crate::auth::{AuthService, RequireAdmin, RequireAuth, Role, UserStore};

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct NewUser {
    #[validate(length(min = 1, max = 64))]
    username: String,
    #[validate(length(min = 1))]
    password: String,
    #[serde(default)]
    role: Role,
}

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct UserPatch {
    #[validate(length(min = 1, max = 64))]
    username: Option<String>,
    role: Option<Role>,
}

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct NewName {
    #[validate(length(min = 1, max = 64))]
    name: String,
}

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct NewPassword {
    #[validate(length(min = 1))]
    password: String,
}

pub(crate) async fn list(
    _admin: RequireAdmin,
    State(users): State<Arc<UserStore>>,
) -> Result<Json<Value>, ApiError> {
    let users: Vec<_> = users.list()?.iter().map(|u| u.to_summary()).collect();
    Ok(Json(json!({ "users": users })))
}

pub(crate) async fn get(
    _admin: RequireAdmin,
    State(users): State<Arc<UserStore>>,
    Path(id): Path<UserId>,
) -> Result<Json<Value>, ApiError> {
    let user = users.get(id)?.ok_or(ApiError::NotFound("User"))?;
    Ok(Json(json!({ "user": user.to_summary() })))
}

pub(crate) async fn create(
    RequireAdmin(admin): RequireAdmin,
    State(auth): State<Arc<AuthService>>,
    Json(body): Json<NewUser>,
) -> Result<Json<WriteAck>, ApiError> {
    body.validate()?;
    let user = auth
        .create_identity(&body.username, &body.password, body.role)
        .await?;

    tracing::info!(
        by = %admin.username(),
        username = %user.username,
        role = %user.role,
        "User created"
    );
    Ok(Json(WriteAck::RecordInserted(1)))
}

pub(crate) async fn update(
    _admin: RequireAdmin,
    State(users): State<Arc<UserStore>>,
    Path(id): Path<UserId>,
    Json(body): Json<UserPatch>,
) -> Result<Json<WriteAck>, ApiError> {
    body.validate()?;
    if body.username.is_none() && body.role.is_none() {
        return Ok(Json(WriteAck::RecordUpdated(0)));
    }

    let updated = users.update(id, body.username.as_deref(), body.role)?;
    Ok(Json(WriteAck::RecordUpdated(usize::from(updated))))
}

pub(crate) async fn rename(
    _admin: RequireAdmin,
    State(users): State<Arc<UserStore>>,
    Path(id): Path<UserId>,
    Json(body): Json<NewName>,
) -> Result<Json<WriteAck>, ApiError> {
    body.validate()?;
    let renamed = users.rename(id, &body.name)?;
    Ok(Json(WriteAck::RecordUpdated(usize::from(renamed))))
}

pub(crate) async fn delete(
    _admin: RequireAdmin,
    State(users): State<Arc<UserStore>>,
    State(games): State<Arc<GameStore>>,
    Path(id): Path<UserId>,
) -> Result<Json<WriteAck>, ApiError> {
    let deleted = users.delete(id)?;
    if deleted {
        let games = games.delete_by_owner(id)?;
        tracing::info!(user_id = %id, games, "User deleted");
    }

    Ok(Json(WriteAck::RecordDeleted(usize::from(deleted))))
}

pub(crate) async fn me(user: RequireAuth) -> Json<Value> {
    Json(json!({ "user": user.principal }))
}

pub(crate) async fn change_password(
    user: RequireAuth,
    State(auth): State<Arc<AuthService>>,
    State(users): State<Arc<UserStore>>,
    Json(body): Json<NewPassword>,
) -> Result<Json<WriteAck>, ApiError> {
    body.validate()?;
    let hash = auth.hash_password(&body.password).await?;
    let updated = users.update_password(user.user_id(), &hash)?;

    tracing::info!(user_id = %user.user_id(), "Password changed");
    Ok(Json(WriteAck::RecordUpdated(usize::from(updated))))
}

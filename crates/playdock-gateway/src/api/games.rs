//! Game library endpoints. Users only see and edit their own games.

use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, Query, State},
};
use playdock_core::{GameDraft, GameId, GamePatch, GameStore, UserId};
use serde::Deserialize;
use serde_json::{Value, json};

use super::{ApiError, WriteAck};
use crate::auth::{RequireAdmin, RequireAuth};

#[derive(Debug, Deserialize)]
pub(crate) struct OwnerQuery {
    id: UserId,
}

pub(crate) async fn list(
    user: RequireAuth,
    State(games): State<Arc<GameStore>>,
) -> Result<Json<Value>, ApiError> {
    let games = games.list_by_owner(user.user_id())?;
    Ok(Json(json!({ "games": games })))
}

pub(crate) async fn get(
    user: RequireAuth,
    State(games): State<Arc<GameStore>>,
    Path(id): Path<GameId>,
) -> Result<Json<Value>, ApiError> {
    let game = games
        .get_owned(id, user.user_id())?
        .ok_or(ApiError::NotFound("Game"))?;
    Ok(Json(json!({ "game": game })))
}

pub(crate) async fn create(
    user: RequireAuth,
    State(games): State<Arc<GameStore>>,
    Json(draft): Json<GameDraft>,
) -> Result<Json<WriteAck>, ApiError> {
    games.create(user.user_id(), draft)?;
    Ok(Json(WriteAck::RecordInserted(1)))
}

pub(crate) async fn update(
    user: RequireAuth,
    State(games): State<Arc<GameStore>>,
    Path(id): Path<GameId>,
    Json(patch): Json<GamePatch>,
) -> Result<Json<WriteAck>, ApiError> {
    let updated = games.update(id, user.user_id(), patch)?.is_some();
    Ok(Json(WriteAck::RecordUpdated(usize::from(updated))))
}

pub(crate) async fn delete(
    user: RequireAuth,
    State(games): State<Arc<GameStore>>,
    Path(id): Path<GameId>,
) -> Result<Json<WriteAck>, ApiError> {
    let allowed = games
        .get(id)?
        .is_some_and(|g| g.owner_id == user.user_id() || user.is_admin());

    let deleted = allowed && games.delete(id)?;
    Ok(Json(WriteAck::RecordDeleted(usize::from(deleted))))
}

pub(crate) async fn list_for_user(
    _admin: RequireAdmin,
    State(games): State<Arc<GameStore>>,
    Query(query): Query<OwnerQuery>,
) -> Result<Json<Value>, ApiError> {
    let games = games.list_by_owner(query.id)?;
    Ok(Json(json!({ "games": games })))
}

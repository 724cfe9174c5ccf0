//! User management and game library endpoints.

mod games;
mod users;

use axum::{
    Json, Router,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, patch},
};
use playdock_core::GameStoreError;
use serde::Serialize;
use thiserror::Error;

use crate::auth::AuthError;
use crate::server::GatewayState;

/// Errors returned by the CRUD handlers.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Authentication or user store failure.
    #[error(transparent)]
    Auth(#[from] AuthError),

    /// Game store failure.
    #[error(transparent)]
    Games(#[from] GameStoreError),

    /// Requested record does not exist or is not visible to the caller.
    #[error("{0} not found")]
    NotFound(&'static str),
}

impl From<validator::ValidationErrors> for ApiError {
    fn from(errors: validator::ValidationErrors) -> Self {
        Self::Auth(errors.into())
    }
}

#[derive(Serialize)]
struct Message {
    msg: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            Self::Auth(e) => e.into_response(),
            Self::Games(GameStoreError::Validation(e)) => AuthError::from(e).into_response(),
            Self::Games(e) => {
                tracing::error!(error = %e, "Game store failure");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(Message {
                        msg: "Internal server error".to_string(),
                    }),
                )
                    .into_response()
            }
            Self::NotFound(what) => (
                StatusCode::NOT_FOUND,
                Json(Message {
                    msg: format!("{what} not found"),
                }),
            )
                .into_response(),
        }
    }
}

/// Write acknowledgements, matching the record counters clients expect.
#[derive(Debug, Serialize)]
#[serde(rename_all = "snake_case")]
pub(crate) enum WriteAck {
    RecordInserted(usize),
    RecordUpdated(usize),
    RecordDeleted(usize),
}

/// Routes mounted under `/api/v1`.
pub fn api_router() -> Router<GatewayState> {
    Router::new()
        .route("/users", get(users::list).post(users::create))
        .route(
            "/users/{id}",
            get(users::get).patch(users::update).delete(users::delete),
        )
        .route("/users/{id}/name", patch(users::rename))
        .route("/me", get(users::me))
        .route("/me/password", patch(users::change_password))
        .route("/games", get(games::list).post(games::create))
        .route(
            "/games/{id}",
            get(games::get).patch(games::update).delete(games::delete),
        )
        .route("/admin/games", get(games::list_for_user))
}

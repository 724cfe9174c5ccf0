//! Authentication extractors and error responses for axum.

use std::sync::Arc;

use axum::{
    Json,
    extract::{FromRef, FromRequestParts},
    http::{StatusCode, header::AUTHORIZATION, request::Parts},
    response::{IntoResponse, Response},
};
use axum_extra::extract::cookie::CookieJar;
use playdock_core::UserId;
use serde::Serialize;

use super::identity::{Principal, Role};
use super::service::AuthService;
use super::token::TokenCodec;
use super::{AuthError, GENERIC_LOGIN_FAILURE, TokenError};

/// Error body returned by every auth failure.
#[derive(Debug, Serialize)]
pub(crate) struct ErrorBody {
    pub(crate) msg: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) code: Option<&'static str>,
}

impl ErrorBody {
    pub(crate) fn generic_login_failure() -> Self {
        Self {
            msg: GENERIC_LOGIN_FAILURE.to_string(),
            code: None,
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let (status, body) = match &self {
            Self::InvalidCredentials => (StatusCode::UNAUTHORIZED, ErrorBody::generic_login_failure()),
            Self::InvalidRole => (StatusCode::NOT_FOUND, ErrorBody::generic_login_failure()),
            Self::DuplicateUser(_) => (StatusCode::CONFLICT, coded(&self, "user_exists")),
            Self::Token(_) => (StatusCode::UNAUTHORIZED, coded(&self, "invalid_token")),
            Self::PermissionDenied(_) => (StatusCode::FORBIDDEN, coded(&self, "permission_denied")),
            Self::Validation(_) => (StatusCode::BAD_REQUEST, coded(&self, "validation_error")),
            Self::StoreUnavailable(_) | Self::Hashing(_) | Self::Config(_) => {
                tracing::error!(error = %self, "Internal auth failure");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorBody {
                        msg: "Internal server error".to_string(),
                        code: Some("internal_error"),
                    },
                )
            }
        };

        (status, Json(body)).into_response()
    }
}

fn coded(error: &AuthError, code: &'static str) -> ErrorBody {
    ErrorBody {
        msg: error.to_string(),
        code: Some(code),
    }
}

/// Extractor for authenticated requests.
///
/// Reads the session cookie, falling back to `Authorization: Bearer`.
/// Rejects with 401 before the handler runs.
#[derive(Debug, Clone)]
pub struct RequireAuth {
    /// The authenticated principal.
    pub principal: Principal,
}

impl RequireAuth {
    /// Get the user ID.
    #[must_use]
    pub const fn user_id(&self) -> UserId {
        self.principal.user_id
    }

    /// Get the username.
    #[must_use]
    pub fn username(&self) -> &str {
        &self.principal.username
    }

    /// Get the user role.
    #[must_use]
    pub const fn role(&self) -> Role {
        self.principal.role
    }

    /// Check if user is admin.
    #[must_use]
    pub const fn is_admin(&self) -> bool {
        self.principal.role.is_admin()
    }
}

impl<S> FromRequestParts<S> for RequireAuth
where
    S: Send + Sync,
    Arc<AuthService>: FromRef<S>,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let auth = Arc::<AuthService>::from_ref(state);
        let token = presented_token(parts, &auth).ok_or(TokenError::Missing)?;
        let principal = auth.authenticate(&token)?;

        Ok(Self { principal })
    }
}

fn presented_token(parts: &Parts, auth: &AuthService) -> Option<String> {
    let jar = CookieJar::from_headers(&parts.headers);
    auth.session().read(&jar).or_else(|| {
        parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(TokenCodec::extract_from_header)
            .map(str::to_string)
    })
}

/// Require admin role extractor.
#[derive(Debug, Clone)]
pub struct RequireAdmin(pub RequireAuth);

impl<S> FromRequestParts<S> for RequireAdmin
where
    S: Send + Sync,
    Arc<AuthService>: FromRef<S>,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let auth = RequireAuth::from_request_parts(parts, state).await?;

        if !auth.is_admin() {
            return Err(AuthError::PermissionDenied(
                "Admin role required".to_string(),
            ));
        }

        Ok(Self(auth))
    }
}

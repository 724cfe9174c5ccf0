//! HTTP handlers for register, login, admin login and logout.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{FromRef, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::post,
};
use axum_extra::extract::cookie::CookieJar;
use serde::Deserialize;
use validator::Validate;

use super::AuthError;
use super::middleware::ErrorBody;
use super::service::AuthService;

/// Username and password submitted to the auth endpoints.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct Credentials {
    /// Account name.
    #[validate(length(min = 1, max = 64))]
    pub username: String,
    /// Plaintext password.
    #[validate(length(min = 1))]
    pub password: String,
}

/// Rejection for the admin login endpoint.
///
/// Unknown user, wrong password and missing admin role all become the same
/// 404 response. Other errors keep their normal mapping.
#[derive(Debug)]
pub struct AdminLoginRejection(pub AuthError);

impl IntoResponse for AdminLoginRejection {
    fn into_response(self) -> Response {
        match self.0 {
            AuthError::InvalidCredentials | AuthError::InvalidRole => {
                (StatusCode::NOT_FOUND, Json(ErrorBody::generic_login_failure())).into_response()
            }
            other => other.into_response(),
        }
    }
}

/// Routes for `/register`, `/login`, `/admin/login` and `/logout`.
pub fn auth_router<S>() -> Router<S>
where
    S: Clone + Send + Sync + 'static,
    Arc<AuthService>: FromRef<S>,
{
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/admin/login", post(admin_login))
        .route("/logout", post(logout))
}

async fn register(
    State(auth): State<Arc<AuthService>>,
    jar: CookieJar,
    Json(body): Json<Credentials>,
) -> Result<impl IntoResponse, AuthError> {
    body.validate()?;
    let (jar, grant) = auth.register(jar, &body.username, &body.password).await?;
    Ok((StatusCode::CREATED, jar, Json(grant)))
}

async fn login(
    State(auth): State<Arc<AuthService>>,
    jar: CookieJar,
    Json(body): Json<Credentials>,
) -> Result<impl IntoResponse, AuthError> {
    let (jar, grant) = auth.login(jar, &body.username, &body.password).await?;
    Ok((StatusCode::CREATED, jar, Json(grant)))
}

async fn admin_login(
    State(auth): State<Arc<AuthService>>,
    jar: CookieJar,
    Json(body): Json<Credentials>,
) -> Result<impl IntoResponse, AdminLoginRejection> {
    let (jar, grant) = auth
        .login_admin(jar, &body.username, &body.password)
        .await
        .map_err(AdminLoginRejection)?;
    Ok((StatusCode::CREATED, jar, Json(grant)))
}

async fn logout(State(auth): State<Arc<AuthService>>, jar: CookieJar) -> impl IntoResponse {
    let (jar, ack) = auth.logout(jar);
    (StatusCode::CREATED, jar, Json(ack))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_admin_rejection_collapses_causes() {
        for error in [AuthError::InvalidCredentials, AuthError::InvalidRole] {
            let response = AdminLoginRejection(error).into_response();
            assert_eq!(response.status(), StatusCode::NOT_FOUND);
        }

        let store = AdminLoginRejection(AuthError::StoreUnavailable("down".into())).into_response();
        assert_eq!(store.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_credentials_validation() {
        let ok = Credentials {
            username: "alice".into(),
            password: "pw1".into(),
        };
        assert!(ok.validate().is_ok());

        let empty_name = Credentials {
            username: String::new(),
            password: "pw1".into(),
        };
        assert!(empty_name.validate().is_err());

        let long_name = Credentials {
            username: "x".repeat(65),
            password: "pw1".into(),
        };
        assert!(long_name.validate().is_err());

        let empty_password = Credentials {
            username: "alice".into(),
            password: String::new(),
        };
        assert!(empty_password.validate().is_err());
    }
}

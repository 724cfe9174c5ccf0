//! Gateway server.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use axum::{Router, extract::FromRef, routing::get};
use playdock_core::{AuthConfig, Config, GameStore};
use tower_http::{cors::CorsLayer, timeout::TimeoutLayer, trace::TraceLayer};

use crate::GatewayError;
use crate::api::api_router;
use crate::auth::{AuthService, CredentialStore, UserStore, auth_router, setup::auto_setup_from_env};

/// Gateway configuration.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Port to listen on.
    pub port: u16,
    /// Bind address.
    pub bind_address: String,
    /// Enable CORS.
    pub cors: bool,
    /// Per-request timeout.
    pub timeout: Duration,
    /// Data directory for persistent storage.
    pub data_dir: PathBuf,
    /// Authentication configuration.
    pub auth: AuthConfig,
}

impl GatewayConfig {
    /// Derive the server settings from a loaded configuration file.
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self {
            port: config.gateway.port,
            bind_address: config.gateway.bind_address(),
            cors: config.gateway.cors,
            timeout: config.gateway.timeout(),
            data_dir: config.data_dir(),
            auth: config.auth.clone(),
        }
    }
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

/// Gateway server state shared across handlers.
#[derive(Clone)]
pub struct GatewayState {
    /// Authentication flows and token checks.
    pub auth: Arc<AuthService>,
    /// User records.
    pub users: Arc<UserStore>,
    /// Game libraries.
    pub games: Arc<GameStore>,
}

impl GatewayState {
    /// Open the stores inside `data_dir` and build the auth service.
    ///
    /// # Errors
    ///
    /// Returns error if the database cannot be opened or auth setup fails.
    pub fn open(data_dir: &std::path::Path, auth: &AuthConfig) -> Result<Self, GatewayError> {
        std::fs::create_dir_all(data_dir)
            .map_err(|e| GatewayError::Config(format!("Failed to create data dir: {e}")))?;

        let db = sled::open(data_dir.join("db"))
            .map_err(|e| GatewayError::Server(format!("Failed to open database: {e}")))?;

        let users = Arc::new(
            UserStore::with_db(db.clone())
                .map_err(|e| GatewayError::Server(format!("Failed to open user store: {e}")))?,
        );
        let games = Arc::new(
            GameStore::with_db(db)
                .map_err(|e| GatewayError::Server(format!("Failed to open game store: {e}")))?,
        );

        let store: Arc<dyn CredentialStore> = users.clone();
        let auth = Arc::new(
            AuthService::initialize(auth, data_dir, store)
                .map_err(|e| GatewayError::Config(format!("Auth init failed: {e}")))?,
        );

        Ok(Self { auth, users, games })
    }
}

impl std::fmt::Debug for GatewayState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewayState")
            .field("auth", &self.auth)
            .field("user_count", &self.users.count())
            .field("game_count", &self.games.count())
            .finish()
    }
}

impl FromRef<GatewayState> for Arc<AuthService> {
    fn from_ref(state: &GatewayState) -> Self {
        Arc::clone(&state.auth)
    }
}

impl FromRef<GatewayState> for Arc<UserStore> {
    fn from_ref(state: &GatewayState) -> Self {
        Arc::clone(&state.users)
    }
}

impl FromRef<GatewayState> for Arc<GameStore> {
    fn from_ref(state: &GatewayState) -> Self {
        Arc::clone(&state.games)
    }
}

/// Build the HTTP router.
pub fn router(state: GatewayState, config: &GatewayConfig) -> Router {
    let app = Router::new()
        .route("/health", get(health_handler))
        .nest("/api/v1", api_router().nest("/auth", auth_router()))
        .with_state(state)
        .layer(TimeoutLayer::new(config.timeout))
        .layer(TraceLayer::new_for_http());

    if config.cors {
        app.layer(CorsLayer::permissive())
    } else {
        app
    }
}

/// Gateway server.
pub struct Gateway {
    config: GatewayConfig,
    state: GatewayState,
}

impl Gateway {
    /// Create a new gateway.
    ///
    /// # Errors
    ///
    /// Returns error if storage or auth cannot be initialized.
    pub fn new(config: GatewayConfig) -> Result<Self, GatewayError> {
        let auth_config = config.auth.clone().with_env_overrides();
        let state = GatewayState::open(&config.data_dir, &auth_config)?;

        Ok(Self { config, state })
    }

    /// Shared state, for embedding or administration.
    #[must_use]
    pub const fn state(&self) -> &GatewayState {
        &self.state
    }

    /// Run the gateway server until interrupted.
    ///
    /// # Errors
    ///
    /// Returns error if the address is invalid or the listener fails.
    pub async fn run(&self) -> Result<(), GatewayError> {
        if let Err(e) = auto_setup_from_env(&self.state.auth, &self.state.users).await {
            tracing::warn!("Auto-setup from env failed: {}", e);
        }
        if self.state.users.is_empty() {
            tracing::warn!("No users configured. Create an admin with `playdock admin create`");
        }

        let app = router(self.state.clone(), &self.config);

        let addr: SocketAddr = format!("{}:{}", self.config.bind_address, self.config.port)
            .parse()
            .map_err(|e| GatewayError::Config(format!("Invalid address: {e}")))?;

        let listener = tokio::net::TcpListener::bind(addr).await?;
        tracing::info!("Gateway API listening on http://{}", addr);

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await
            .map_err(|e| GatewayError::Server(e.to_string()))?;

        tracing::info!("Gateway stopped");
        Ok(())
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
}

async fn health_handler() -> &'static str {
    "OK"
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::Role;
    use axum::{
        body::Body,
        http::{HeaderMap, Method, Request, StatusCode, header},
    };
    use playdock_core::HashingConfig;
    use pretty_assertions::assert_eq;
    use serde_json::{Value, json};
    use tempfile::TempDir;
    use tower::ServiceExt;

    struct TestApp {
        _dir: TempDir,
        state: GatewayState,
        app: Router,
    }

    fn test_app() -> TestApp {
        let dir = TempDir::new().unwrap();
        let auth = AuthConfig::builder()
            .hashing(HashingConfig::minimal())
            .build();
        let config = GatewayConfig {
            data_dir: dir.path().to_path_buf(),
            auth: auth.clone(),
            ..GatewayConfig::default()
        };
        let state = GatewayState::open(dir.path(), &auth).unwrap();
        let app = router(state.clone(), &config);
        TestApp {
            _dir: dir,
            state,
            app,
        }
    }

    impl TestApp {
        async fn send(
            &self,
            method: Method,
            uri: &str,
            token: Option<&str>,
            body: Option<Value>,
        ) -> (StatusCode, HeaderMap, Value) {
            let mut request = Request::builder().method(method).uri(uri);
            if let Some(token) = token {
                request = request.header(header::COOKIE, format!("token={token}"));
            }
            let body = match body {
                Some(value) => {
                    request = request.header(header::CONTENT_TYPE, "application/json");
                    Body::from(value.to_string())
                }
                None => Body::empty(),
            };

            let response = self
                .app
                .clone()
                .oneshot(request.body(body).unwrap())
                .await
                .unwrap();
            let status = response.status();
            let headers = response.headers().clone();
            let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
                .await
                .unwrap();
            let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
            (status, headers, value)
        }

        async fn register(&self, username: &str, password: &str) -> String {
            let (status, _, body) = self
                .send(
                    Method::POST,
                    "/api/v1/auth/register",
                    None,
                    Some(json!({ "username": username, "password": password })),
                )
                .await;
            assert_eq!(status, StatusCode::CREATED);
            body["token"].as_str().unwrap().to_string()
        }

        async fn admin_token(&self) -> String {
            self.state
                .auth
                .create_identity("root", "secret", Role::Admin)
                .await
                .unwrap();
            let (status, _, body) = self
                .send(
                    Method::POST,
                    "/api/v1/auth/admin/login",
                    None,
                    Some(json!({ "username": "root", "password": "secret" })),
                )
                .await;
            assert_eq!(status, StatusCode::CREATED);
            body["token"].as_str().unwrap().to_string()
        }
    }

    fn set_cookie(headers: &HeaderMap) -> String {
        headers
            .get(header::SET_COOKIE)
            .unwrap()
            .to_str()
            .unwrap()
            .to_string()
    }

    #[tokio::test]
    async fn test_health() {
        let app = test_app();
        let response = app
            .app
            .clone()
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(&bytes[..], b"OK");
    }

    #[tokio::test]
    async fn test_register_sets_cookie_and_rejects_duplicate() {
        let app = test_app();
        let credentials = json!({ "username": "alice", "password": "pw1" });

        let (status, headers, body) = app
            .send(
                Method::POST,
                "/api/v1/auth/register",
                None,
                Some(credentials.clone()),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["user"]["username"], "alice");
        assert!(body["user"].get("role").is_none());
        assert!(body["user"].get("password_hash").is_none());

        let token = body["token"].as_str().unwrap();
        let cookie = set_cookie(&headers);
        assert!(cookie.starts_with(&format!("token={token}")));
        assert!(cookie.contains("HttpOnly"));

        let (status, _, body) = app
            .send(
                Method::POST,
                "/api/v1/auth/register",
                None,
                Some(json!({ "username": "alice", "password": "anything" })),
            )
            .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["code"], "user_exists");
    }

    #[tokio::test]
    async fn test_register_validates_input() {
        let app = test_app();
        let (status, _, _) = app
            .send(
                Method::POST,
                "/api/v1/auth/register",
                None,
                Some(json!({ "username": "", "password": "pw1" })),
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_login() {
        let app = test_app();
        app.register("alice", "pw1").await;

        let (status, headers, body) = app
            .send(
                Method::POST,
                "/api/v1/auth/login",
                None,
                Some(json!({ "username": "alice", "password": "pw1" })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
        assert!(body["token"].is_string());
        assert!(set_cookie(&headers).starts_with("token="));

        for (username, password) in [("alice", "wrong"), ("nobody", "pw1")] {
            let (status, headers, body) = app
                .send(
                    Method::POST,
                    "/api/v1/auth/login",
                    None,
                    Some(json!({ "username": username, "password": password })),
                )
                .await;
            assert_eq!(status, StatusCode::UNAUTHORIZED);
            assert_eq!(body, json!({ "msg": "password or username is wrong!" }));
            assert!(headers.get(header::SET_COOKIE).is_none());
        }
    }

    #[tokio::test]
    async fn test_admin_login_hides_cause() {
        let app = test_app();
        app.register("alice", "pw1").await;

        for (username, password) in [("alice", "pw1"), ("alice", "wrong"), ("ghost", "pw1")] {
            let (status, _, body) = app
                .send(
                    Method::POST,
                    "/api/v1/auth/admin/login",
                    None,
                    Some(json!({ "username": username, "password": password })),
                )
                .await;
            assert_eq!(status, StatusCode::NOT_FOUND);
            assert_eq!(body, json!({ "msg": "password or username is wrong!" }));
        }

        let token = app.admin_token().await;
        assert!(!token.is_empty());
    }

    #[tokio::test]
    async fn test_logout_clears_cookie_without_session() {
        let app = test_app();
        let (status, headers, body) = app
            .send(Method::POST, "/api/v1/auth/logout", None, None)
            .await;

        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body, json!({ "msg": "Log out successfully!" }));
        let cookie = set_cookie(&headers);
        assert!(cookie.starts_with("token=;"));
        assert!(cookie.contains("Max-Age=0"));
    }

    #[tokio::test]
    async fn test_token_still_valid_after_logout() {
        let app = test_app();
        let token = app.register("alice", "pw1").await;

        let (status, _, _) = app
            .send(Method::POST, "/api/v1/auth/logout", Some(&token), None)
            .await;
        assert_eq!(status, StatusCode::CREATED);

        let (status, _, body) = app.send(Method::GET, "/api/v1/me", Some(&token), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["user"]["username"], "alice");
        assert_eq!(body["user"]["role"], "standard");
    }

    #[tokio::test]
    async fn test_protected_routes_need_token() {
        let app = test_app();
        for uri in ["/api/v1/me", "/api/v1/games", "/api/v1/users"] {
            let (status, _, _) = app.send(Method::GET, uri, None, None).await;
            assert_eq!(status, StatusCode::UNAUTHORIZED, "{uri}");
        }

        let (status, _, _) = app
            .send(Method::GET, "/api/v1/games", Some("garbage"), None)
            .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_game_library_is_per_user() {
        let app = test_app();
        let alice = app.register("alice", "pw1").await;
        let bob = app.register("bob", "pw2").await;

        let (status, _, body) = app
            .send(
                Method::POST,
                "/api/v1/games",
                Some(&alice),
                Some(json!({ "name": "Celeste", "platform": "switch", "releaseYear": 2018 })),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "record_inserted": 1 }));

        let (_, _, body) = app.send(Method::GET, "/api/v1/games", Some(&alice), None).await;
        let games = body["games"].as_array().unwrap();
        assert_eq!(games.len(), 1);
        assert_eq!(games[0]["releaseYear"], 2018);
        let id = games[0]["id"].as_u64().unwrap();
        let uri = format!("/api/v1/games/{id}");

        let (status, _, _) = app.send(Method::GET, &uri, Some(&bob), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (_, _, body) = app
            .send(Method::PATCH, &uri, Some(&bob), Some(json!({ "name": "Mine" })))
            .await;
        assert_eq!(body, json!({ "record_updated": 0 }));

        let (_, _, body) = app.send(Method::DELETE, &uri, Some(&bob), None).await;
        assert_eq!(body, json!({ "record_deleted": 0 }));

        let (_, _, body) = app
            .send(Method::PATCH, &uri, Some(&alice), Some(json!({ "genre": "platformer" })))
            .await;
        assert_eq!(body, json!({ "record_updated": 1 }));

        let (_, _, body) = app.send(Method::GET, &uri, Some(&alice), None).await;
        assert_eq!(body["game"]["genre"], "platformer");
        assert_eq!(body["game"]["name"], "Celeste");

        let (_, _, body) = app.send(Method::DELETE, &uri, Some(&alice), None).await;
        assert_eq!(body, json!({ "record_deleted": 1 }));
    }

    #[tokio::test]
    async fn test_invalid_game_rejected() {
        let app = test_app();
        let alice = app.register("alice", "pw1").await;

        let (status, _, _) = app
            .send(
                Method::POST,
                "/api/v1/games",
                Some(&alice),
                Some(json!({ "name": "Pong", "releaseYear": 1900 })),
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_admin_user_management() {
        let app = test_app();
        let alice = app.register("alice", "pw1").await;
        let admin = app.admin_token().await;

        let (status, _, _) = app.send(Method::GET, "/api/v1/users", Some(&alice), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, _, body) = app
            .send(
                Method::POST,
                "/api/v1/users",
                Some(&admin),
                Some(json!({ "username": "carol", "password": "pw3" })),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "record_inserted": 1 }));

        let (_, _, body) = app.send(Method::GET, "/api/v1/users", Some(&admin), None).await;
        let users = body["users"].as_array().unwrap();
        let names: Vec<_> = users.iter().map(|u| u["username"].as_str().unwrap()).collect();
        assert_eq!(names, ["alice", "root", "carol"]);
        assert!(users.iter().all(|u| u.get("passwordHash").is_none()));
        let carol = users[2]["id"].as_u64().unwrap();

        let (_, _, body) = app
            .send(
                Method::PATCH,
                &format!("/api/v1/users/{carol}/name"),
                Some(&admin),
                Some(json!({ "name": "caroline" })),
            )
            .await;
        assert_eq!(body, json!({ "record_updated": 1 }));

        let (_, _, body) = app
            .send(
                Method::GET,
                &format!("/api/v1/users/{carol}"),
                Some(&admin),
                None,
            )
            .await;
        assert_eq!(body["user"]["username"], "caroline");

        let (status, _, _) = app
            .send(Method::GET, "/api/v1/users/9999", Some(&admin), None)
            .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_delete_user_removes_games() {
        let app = test_app();
        let alice = app.register("alice", "pw1").await;
        let admin = app.admin_token().await;

        app.send(
            Method::POST,
            "/api/v1/games",
            Some(&alice),
            Some(json!({ "name": "Hades" })),
        )
        .await;
        let alice_id = app.state.users.get_by_username("alice").unwrap().unwrap().id;

        let (_, _, body) = app
            .send(
                Method::GET,
                &format!("/api/v1/admin/games?id={alice_id}"),
                Some(&admin),
                None,
            )
            .await;
        assert_eq!(body["games"].as_array().unwrap().len(), 1);

        let (_, _, body) = app
            .send(
                Method::DELETE,
                &format!("/api/v1/users/{alice_id}"),
                Some(&admin),
                None,
            )
            .await;
        assert_eq!(body, json!({ "record_deleted": 1 }));
        assert_eq!(app.state.games.count(), 0);
    }

    #[tokio::test]
    async fn test_last_admin_cannot_be_deleted() {
        let app = test_app();
        let admin = app.admin_token().await;
        let root = app.state.users.get_by_username("root").unwrap().unwrap().id;

        let (status, _, _) = app
            .send(
                Method::DELETE,
                &format!("/api/v1/users/{root}"),
                Some(&admin),
                None,
            )
            .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(app.state.users.count(), 1);
    }

    #[tokio::test]
    async fn test_last_admin_cannot_be_demoted() {
        let app = test_app();
        let admin = app.admin_token().await;
        let root = app.state.users.get_by_username("root").unwrap().unwrap().id;

        let (status, _, body) = app
            .send(
                Method::PATCH,
                &format!("/api/v1/users/{root}"),
                Some(&admin),
                Some(json!({ "username": "renamed", "role": "standard" })),
            )
            .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["code"], "permission_denied");

        let stored = app.state.users.get(root).unwrap().unwrap();
        assert_eq!(stored.username, "root");
        assert_eq!(stored.role, Role::Admin);
        assert!(app.state.users.get_by_username("renamed").unwrap().is_none());
    }

    #[tokio::test]
    async fn test_change_own_password() {
        let app = test_app();
        let alice = app.register("alice", "pw1").await;

        let (_, _, body) = app
            .send(
                Method::PATCH,
                "/api/v1/me/password",
                Some(&alice),
                Some(json!({ "password": "pw-new" })),
            )
            .await;
        assert_eq!(body, json!({ "record_updated": 1 }));

        let (status, _, _) = app
            .send(
                Method::POST,
                "/api/v1/auth/login",
                None,
                Some(json!({ "username": "alice", "password": "pw1" })),
            )
            .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, _, _) = app
            .send(
                Method::POST,
                "/api/v1/auth/login",
                None,
                Some(json!({ "username": "alice", "password": "pw-new" })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
    }
}

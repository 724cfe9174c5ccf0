//! # Playdock Gateway
//!
//! HTTP gateway with cookie-based authentication and per-user game
//! libraries.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

/// User management and game library endpoints.
pub mod api;
/// Authentication and authorization.
pub mod auth;
mod server;

pub use auth::{AuthError, AuthService, Role, UserStore};
pub use server::{Gateway, GatewayConfig, GatewayState, router};

/// Start the gateway server.
///
/// # Errors
///
/// Returns error if server fails to start.
pub async fn start(config: GatewayConfig) -> Result<(), GatewayError> {
    let gateway = Gateway::new(config)?;
    gateway.run().await
}

/// Gateway errors.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// Server error.
    #[error("Server error: {0}")]
    Server(String),

    /// Configuration error.
    #[error("Config error: {0}")]
    Config(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

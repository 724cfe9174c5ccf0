//! Authentication and authorization for the gateway.
//!
//! This module provides:
//! - Identity records and the credential store seam
//! - Salted password hashing behind a capability trait
//! - Signed, time-bounded token issuance and validation
//! - Cookie transport for the session token
//! - The login / register / logout flows and route guards

mod handlers;
mod identity;
mod middleware;
mod password;
mod service;
mod session;
/// Admin bootstrap helpers.
pub mod setup;
mod store;
mod token;

pub use handlers::{AdminLoginRejection, Credentials, auth_router};
pub use identity::{Identity, Principal, PublicUser, Role, UserSummary};
pub use middleware::{RequireAdmin, RequireAuth};
pub use password::{Argon2Verifier, PasswordVerifier};
pub use service::{AuthService, LOGOUT_MESSAGE, LogoutAck, SessionGrant};
pub use session::SessionTransport;
pub use store::{CredentialStore, UserStore};
pub use token::{Claims, IssuedToken, TokenCodec};

use thiserror::Error;

/// Message returned for every credential or role failure.
pub const GENERIC_LOGIN_FAILURE: &str = "password or username is wrong!";

/// Authentication errors.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Username already taken.
    #[error("User already exists: {0}")]
    DuplicateUser(String),

    /// Unknown username or wrong password. Deliberately indistinguishable.
    #[error("Invalid credentials")]
    InvalidCredentials,

    /// Credentials were fine but the account is not an administrator.
    #[error("Admin role required")]
    InvalidRole,

    /// Token could not be accepted.
    #[error("Token error: {0}")]
    Token(#[from] TokenError),

    /// Authenticated, but not allowed to perform the operation.
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// Request input rejected.
    #[error("Validation error: {0}")]
    Validation(String),

    /// Credential store could not be reached or returned garbage.
    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    /// Password hashing failed.
    #[error("Hashing error: {0}")]
    Hashing(String),

    /// Configuration error.
    #[error("Config error: {0}")]
    Config(String),
}

/// Reasons a token is rejected, in the order they are checked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TokenError {
    /// Not a structurally valid token.
    #[error("malformed token")]
    Malformed,

    /// Well-formed, but not signed with the current secret.
    #[error("invalid signature")]
    InvalidSignature,

    /// Genuine, but past its expiry.
    #[error("token expired")]
    Expired,

    /// No token was presented.
    #[error("missing token")]
    Missing,
}

impl From<validator::ValidationErrors> for AuthError {
    fn from(errors: validator::ValidationErrors) -> Self {
        Self::Validation(errors.to_string())
    }
}

impl From<sled::Error> for AuthError {
    fn from(e: sled::Error) -> Self {
        Self::StoreUnavailable(e.to_string())
    }
}

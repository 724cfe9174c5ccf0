//! Identity records and the principal attached to authenticated requests.

use chrono::{DateTime, Utc};
use playdock_core::UserId;
use serde::{Deserialize, Serialize};

use super::AuthError;

/// User role for access control.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Regular account; manages its own game library.
    #[default]
    Standard,
    /// Full administrative access.
    Admin,
}

impl Role {
    /// Check if this role has admin privileges.
    #[must_use]
    pub const fn is_admin(self) -> bool {
        match self {
            Self::Admin => true,
            Self::Standard => false,
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Standard => write!(f, "standard"),
            Self::Admin => write!(f, "admin"),
        }
    }
}

impl std::str::FromStr for Role {
    type Err = AuthError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "standard" | "user" => Ok(Self::Standard),
            "admin" => Ok(Self::Admin),
            _ => Err(AuthError::Validation(format!("Unknown role: {s}"))),
        }
    }
}

/// Persisted identity record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    /// Unique user ID.
    pub id: UserId,
    /// Username for login.
    pub username: String,
    /// Argon2 PHC string. Never leaves the server.
    pub password_hash: String,
    /// Account role.
    pub role: Role,
    /// When the account was created.
    pub created_at: DateTime<Utc>,
}

impl Identity {
    /// Safe projection for login and registration responses.
    #[must_use]
    pub fn to_public(&self) -> PublicUser {
        PublicUser {
            id: self.id,
            username: self.username.clone(),
        }
    }

    /// Projection for the admin user listing.
    #[must_use]
    pub fn to_summary(&self) -> UserSummary {
        UserSummary {
            id: self.id,
            username: self.username.clone(),
            role: self.role,
            created_at: self.created_at,
        }
    }
}

/// Public user representation: id and username only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicUser {
    /// Unique user ID.
    pub id: UserId,
    /// Username.
    pub username: String,
}

/// User representation for administrators.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSummary {
    /// Unique user ID.
    pub id: UserId,
    /// Username.
    pub username: String,
    /// Role.
    pub role: Role,
    /// When created.
    pub created_at: DateTime<Utc>,
}

/// Who is making an authenticated request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Principal {
    /// User ID.
    pub user_id: UserId,
    /// Username.
    pub username: String,
    /// Role at the time the token was issued.
    pub role: Role,
}

impl From<&Identity> for Principal {
    fn from(identity: &Identity) -> Self {
        Self {
            user_id: identity.id,
            username: identity.username.clone(),
            role: identity.role,
        }
    }
}

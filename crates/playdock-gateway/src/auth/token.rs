//! Signed session tokens.
//!
//! Tokens are HS256 JWTs. Validation runs in a fixed order: structure,
//! then signature, then expiry. A forged token is therefore always
//! reported as [`TokenError::InvalidSignature`], never as expired.

use std::collections::HashSet;
use std::time::Duration;

use chrono::{DateTime, Utc};
use jsonwebtoken::{
    Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, errors::ErrorKind, encode,
};
use playdock_core::UserId;
use rand::RngCore;
use serde::{Deserialize, Serialize};

use super::identity::{Principal, Role};
use super::{AuthError, TokenError};

/// Claims embedded in every token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// User ID.
    #[serde(rename = "userId")]
    pub user_id: UserId,
    /// Username.
    pub username: String,
    /// User role.
    pub role: Role,
    /// Issued at (Unix timestamp).
    #[serde(rename = "iat")]
    pub issued_at: i64,
    /// Expiration (Unix timestamp).
    #[serde(rename = "exp")]
    pub expires_at: i64,
}

impl Claims {
    /// The identity part of the claims.
    #[must_use]
    pub fn principal(&self) -> Principal {
        Principal {
            user_id: self.user_id,
            username: self.username.clone(),
            role: self.role,
        }
    }

    /// Expiry as a timestamp.
    #[must_use]
    pub fn expires_at_utc(&self) -> DateTime<Utc> {
        DateTime::from_timestamp(self.expires_at, 0).unwrap_or(DateTime::<Utc>::MAX_UTC)
    }
}

/// A freshly signed token and the claims it carries.
#[derive(Debug, Clone)]
pub struct IssuedToken {
    /// Compact token string.
    pub token: String,
    /// Claims that were signed.
    pub claims: Claims,
}

/// Issues and validates tokens with a process-wide secret.
pub struct TokenCodec {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    /// Parses claims without checking the signature.
    structure: Validation,
    /// Checks the signature; expiry is checked separately.
    signature: Validation,
}

impl TokenCodec {
    /// Create a codec with a secret key.
    ///
    /// The secret should be at least 32 bytes.
    #[must_use]
    pub fn new(secret: &[u8]) -> Self {
        let mut structure = Validation::new(Algorithm::HS256);
        structure.insecure_disable_signature_validation();
        structure.validate_exp = false;
        structure.required_spec_claims = HashSet::new();

        let mut signature = Validation::new(Algorithm::HS256);
        signature.validate_exp = false;
        signature.required_spec_claims = HashSet::new();

        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            structure,
            signature,
        }
    }

    /// Create a codec from a hex-encoded secret.
    ///
    /// # Errors
    ///
    /// Returns error if hex decoding fails or the secret is empty.
    pub fn from_hex_secret(hex_secret: &str) -> Result<Self, AuthError> {
        let secret = hex::decode(hex_secret.trim())
            .map_err(|e| AuthError::Config(format!("Invalid hex secret: {e}")))?;
        if secret.is_empty() {
            return Err(AuthError::Config("Signing secret is empty".to_string()));
        }
        Ok(Self::new(&secret))
    }

    /// Generate a random 256-bit secret key.
    #[must_use]
    pub fn generate_secret() -> [u8; 32] {
        let mut bytes = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut bytes);
        bytes
    }

    /// Generate a random secret as hex string.
    #[must_use]
    pub fn generate_hex_secret() -> String {
        hex::encode(Self::generate_secret())
    }

    /// Sign a token for `principal`, valid for `ttl` from now.
    ///
    /// # Errors
    ///
    /// Returns error if token encoding fails.
    pub fn issue(&self, principal: &Principal, ttl: Duration) -> Result<IssuedToken, AuthError> {
        let now = Utc::now().timestamp();
        let ttl = i64::try_from(ttl.as_secs()).unwrap_or(i64::MAX);

        let claims = Claims {
            user_id: principal.user_id,
            username: principal.username.clone(),
            role: principal.role,
            issued_at: now,
            expires_at: now.saturating_add(ttl),
        };

        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| AuthError::Config(format!("Token encoding failed: {e}")))?;

        Ok(IssuedToken { token, claims })
    }

    /// Validate a token and return its claims.
    ///
    /// A token is valid only if it verifies against the current secret and
    /// the current time is strictly before `exp`.
    ///
    /// # Errors
    ///
    /// Returns the first failed check: malformed, bad signature, or expired.
    pub fn validate(&self, token: &str) -> Result<Claims, TokenError> {
        self.validate_at(token, Utc::now().timestamp())
    }

    fn validate_at(&self, token: &str, now: i64) -> Result<Claims, TokenError> {
        decode::<Claims>(token, &self.decoding_key, &self.structure)
            .map_err(|_| TokenError::Malformed)?;

        let claims = decode::<Claims>(token, &self.decoding_key, &self.signature)
            .map_err(|e| match e.kind() {
                ErrorKind::InvalidSignature | ErrorKind::InvalidAlgorithm => {
                    TokenError::InvalidSignature
                }
                _ => TokenError::Malformed,
            })?
            .claims;

        if now >= claims.expires_at {
            return Err(TokenError::Expired);
        }

        Ok(claims)
    }

    /// Extract token from Authorization header.
    ///
    /// Expects format: "Bearer <token>"
    #[must_use]
    pub fn extract_from_header(header: &str) -> Option<&str> {
        header
            .strip_prefix("Bearer ")
            .or_else(|| header.strip_prefix("bearer "))
            .map(str::trim)
            .filter(|t| !t.is_empty())
    }
}

impl std::fmt::Debug for TokenCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenCodec").finish_non_exhaustive()
    }
}

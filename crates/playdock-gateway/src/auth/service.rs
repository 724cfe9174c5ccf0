//! Register, login and logout flows.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use axum_extra::extract::cookie::CookieJar;
use playdock_core::AuthConfig;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::AuthError;
use super::identity::{Identity, Principal, PublicUser, Role};
use super::password::{Argon2Verifier, PasswordVerifier};
use super::session::SessionTransport;
use super::store::CredentialStore;
use super::token::TokenCodec;

/// File holding the generated signing secret, relative to the data directory.
pub const SECRET_FILE: &str = "jwt.secret";

/// Confirmation returned by logout.
pub const LOGOUT_MESSAGE: &str = "Log out successfully!";

/// Result of a successful register or login.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionGrant {
    /// The authenticated account, without role or hash.
    pub user: PublicUser,
    /// Session token, also set as a cookie.
    pub token: String,
}

/// Result of logout.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogoutAck {
    /// Confirmation message.
    pub msg: String,
}

/// Orchestrates credential checks, token issuance and the session cookie.
///
/// Holds no per-request state. Password work runs on the blocking pool.
pub struct AuthService {
    store: Arc<dyn CredentialStore>,
    verifier: Arc<dyn PasswordVerifier>,
    tokens: TokenCodec,
    session: SessionTransport,
    token_ttl: Duration,
    /// Compared against when the username is unknown.
    decoy_hash: String,
}

impl AuthService {
    /// Assemble a service from its collaborators.
    ///
    /// # Errors
    ///
    /// Returns error if the verifier cannot produce the decoy hash.
    pub fn new(
        store: Arc<dyn CredentialStore>,
        verifier: Arc<dyn PasswordVerifier>,
        tokens: TokenCodec,
        session: SessionTransport,
        token_ttl: Duration,
    ) -> Result<Self, AuthError> {
        let decoy_hash = verifier.hash("playdock-decoy-password")?;
        Ok(Self {
            store,
            verifier,
            tokens,
            session,
            token_ttl,
            decoy_hash,
        })
    }

    /// Build a service from configuration.
    ///
    /// Uses the configured signing secret, or loads (creating on first run)
    /// `jwt.secret` inside `data_dir`.
    ///
    /// # Errors
    ///
    /// Returns error if the secret or hashing parameters are invalid, or the
    /// secret file cannot be read or written.
    pub fn initialize(
        config: &AuthConfig,
        data_dir: &Path,
        store: Arc<dyn CredentialStore>,
    ) -> Result<Self, AuthError> {
        let secret = match &config.jwt_secret {
            Some(secret) => secret.clone(),
            None => load_or_create_secret(data_dir)?,
        };

        let tokens = TokenCodec::from_hex_secret(&secret)?;
        let verifier = Arc::new(Argon2Verifier::new(&config.hashing)?);
        let session = SessionTransport::new(
            config.cookie_name.clone(),
            config.secure_cookie,
            config.token_expiry(),
        );

        Self::new(store, verifier, tokens, session, config.token_expiry())
    }

    /// Token codec in use.
    #[must_use]
    pub const fn tokens(&self) -> &TokenCodec {
        &self.tokens
    }

    /// Cookie transport in use.
    #[must_use]
    pub const fn session(&self) -> &SessionTransport {
        &self.session
    }

    /// Credential store in use.
    #[must_use]
    pub fn store(&self) -> &Arc<dyn CredentialStore> {
        &self.store
    }

    /// Create a standard account and start a session for it.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::DuplicateUser`] if the username is taken.
    pub async fn register(
        &self,
        jar: CookieJar,
        username: &str,
        password: &str,
    ) -> Result<(CookieJar, SessionGrant), AuthError> {
        if self.store.find_by_username(username).await?.is_some() {
            return Err(AuthError::DuplicateUser(username.to_string()));
        }

        // Insert still rejects a concurrent duplicate.
        let identity = self
            .create_identity(username, password, Role::Standard)
            .await?;
        info!(user_id = %identity.id, username = %identity.username, "User registered");

        self.grant(jar, &identity)
    }

    /// Check credentials and start a session.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::InvalidCredentials`] for an unknown username or
    /// a wrong password alike.
    pub async fn login(
        &self,
        jar: CookieJar,
        username: &str,
        password: &str,
    ) -> Result<(CookieJar, SessionGrant), AuthError> {
        let identity = self.verify(username, password).await?;
        info!(user_id = %identity.id, username = %identity.username, "User logged in");

        self.grant(jar, &identity)
    }

    /// Check credentials, require the admin role, and start a session.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::InvalidCredentials`] or [`AuthError::InvalidRole`].
    pub async fn login_admin(
        &self,
        jar: CookieJar,
        username: &str,
        password: &str,
    ) -> Result<(CookieJar, SessionGrant), AuthError> {
        let identity = self.verify(username, password).await?;
        if !identity.role.is_admin() {
            warn!(username = %username, role = %identity.role, "Admin login rejected: not an admin");
            return Err(AuthError::InvalidRole);
        }
        info!(user_id = %identity.id, username = %identity.username, "Admin logged in");

        self.grant(jar, &identity)
    }

    /// Clear the session cookie.
    ///
    /// The token itself is not revoked and stays valid until it expires.
    #[must_use]
    pub fn logout(&self, jar: CookieJar) -> (CookieJar, LogoutAck) {
        let had_session = self.session.read(&jar).is_some();
        info!(had_session, "User logged out");

        (
            self.session.clear(jar),
            LogoutAck {
                msg: LOGOUT_MESSAGE.to_string(),
            },
        )
    }

    /// Validate a presented token.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Token`] with the reason the token was rejected.
    pub fn authenticate(&self, token: &str) -> Result<Principal, AuthError> {
        match self.tokens.validate(token) {
            Ok(claims) => Ok(claims.principal()),
            Err(e) => {
                debug!(reason = %e, "Token rejected");
                Err(e.into())
            }
        }
    }

    /// Hash a password and insert a new identity.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::DuplicateUser`] if the username is taken.
    pub async fn create_identity(
        &self,
        username: &str,
        password: &str,
        role: Role,
    ) -> Result<Identity, AuthError> {
        let hash = self.hash_password(password).await?;
        self.store.insert(username, &hash, role).await
    }

    /// Hash a password on the blocking pool.
    ///
    /// # Errors
    ///
    /// Returns error if hashing fails.
    pub async fn hash_password(&self, password: &str) -> Result<String, AuthError> {
        let verifier = Arc::clone(&self.verifier);
        let password = password.to_string();

        tokio::task::spawn_blocking(move || verifier.hash(&password))
            .await
            .map_err(|e| AuthError::Hashing(format!("Hashing task failed: {e}")))?
    }

    async fn compare(&self, password: &str, hash: &str) -> Result<bool, AuthError> {
        let verifier = Arc::clone(&self.verifier);
        let password = password.to_string();
        let hash = hash.to_string();

        tokio::task::spawn_blocking(move || verifier.compare(&password, &hash))
            .await
            .map_err(|e| AuthError::Hashing(format!("Hashing task failed: {e}")))?
    }

    async fn verify(&self, username: &str, password: &str) -> Result<Identity, AuthError> {
        let Some(identity) = self.store.find_by_username(username).await? else {
            // Spend the same effort as a real check.
            self.compare(password, &self.decoy_hash).await?;
            warn!(username = %username, "Login rejected: unknown user");
            return Err(AuthError::InvalidCredentials);
        };

        if !self.compare(password, &identity.password_hash).await? {
            warn!(username = %username, "Login rejected: wrong password");
            return Err(AuthError::InvalidCredentials);
        }

        Ok(identity)
    }

    fn grant(
        &self,
        jar: CookieJar,
        identity: &Identity,
    ) -> Result<(CookieJar, SessionGrant), AuthError> {
        let issued = self
            .tokens
            .issue(&Principal::from(identity), self.token_ttl)?;
        let jar = self.session.attach(jar, &issued.token);

        Ok((
            jar,
            SessionGrant {
                user: identity.to_public(),
                token: issued.token,
            },
        ))
    }
}

impl std::fmt::Debug for AuthService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthService")
            .field("session", &self.session)
            .field("token_ttl", &self.token_ttl)
            .finish_non_exhaustive()
    }
}

fn load_or_create_secret(data_dir: &Path) -> Result<String, AuthError> {
    use std::io::{ErrorKind, Write};

    let path = data_dir.join(SECRET_FILE);
    std::fs::create_dir_all(data_dir)
        .map_err(|e| AuthError::Config(format!("Failed to create {}: {e}", data_dir.display())))?;

    let mut options = std::fs::OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }

    let mut file = match options.open(&path) {
        Ok(file) => file,
        Err(e) if e.kind() == ErrorKind::AlreadyExists => return read_secret(&path),
        Err(e) => {
            return Err(AuthError::Config(format!(
                "Failed to create {}: {e}",
                path.display()
            )));
        }
    };

    let secret = TokenCodec::generate_hex_secret();
    file.write_all(secret.as_bytes())
        .and_then(|()| file.sync_all())
        .map_err(|e| AuthError::Config(format!("Failed to write {}: {e}", path.display())))?;

    info!(path = %path.display(), "Generated new signing secret");
    Ok(secret)
}

fn read_secret(path: &Path) -> Result<String, AuthError> {
    let secret = std::fs::read_to_string(path)
        .map_err(|e| AuthError::Config(format!("Failed to read {}: {e}", path.display())))?;
    let secret = secret.trim();
    if secret.is_empty() {
        return Err(AuthError::Config(format!("{} is empty", path.display())));
    }
    Ok(secret.to_string())
}

//! First-run admin bootstrap.

use rand::Rng;

use super::AuthError;
use super::identity::{Identity, Role};
use super::service::AuthService;
use super::store::UserStore;

/// Environment variable naming the bootstrap admin.
pub const ADMIN_USERNAME_ENV: &str = "PLAYDOCK_ADMIN_USERNAME";
/// Environment variable holding the bootstrap admin's password.
pub const ADMIN_PASSWORD_ENV: &str = "PLAYDOCK_ADMIN_PASSWORD";

/// Auto-setup from environment variables.
///
/// Checks for `PLAYDOCK_ADMIN_USERNAME` and `PLAYDOCK_ADMIN_PASSWORD` and
/// creates an admin if both are set and no users exist.
///
/// # Errors
///
/// Returns error if user creation fails.
pub async fn auto_setup_from_env(
    auth: &AuthService,
    users: &UserStore,
) -> Result<Option<Identity>, AuthError> {
    bootstrap_admin(
        auth,
        users,
        std::env::var(ADMIN_USERNAME_ENV).ok(),
        std::env::var(ADMIN_PASSWORD_ENV).ok(),
    )
    .await
}

/// Create the first admin from the given credentials.
///
/// Does nothing if users already exist or either value is missing or empty.
///
/// # Errors
///
/// Returns error if user creation fails.
pub async fn bootstrap_admin(
    auth: &AuthService,
    users: &UserStore,
    username: Option<String>,
    password: Option<String>,
) -> Result<Option<Identity>, AuthError> {
    if !users.is_empty() {
        return Ok(None);
    }

    let (Some(username), Some(password)) = (
        username.filter(|u| !u.is_empty()),
        password.filter(|p| !p.is_empty()),
    ) else {
        return Ok(None);
    };

    let admin = auth.create_identity(&username, &password, Role::Admin).await?;

    tracing::info!(
        username = %admin.username,
        "Admin user created from environment variables"
    );

    Ok(Some(admin))
}

/// Generate a secure random password.
#[must_use]
pub fn generate_password(length: usize) -> String {
    const CHARSET: &[u8] =
        b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789!@#$%^&*";
    let mut rng = rand::thread_rng();

    (0..length)
        .map(|_| char::from(CHARSET[rng.gen_range(0..CHARSET.len())]))
        .collect()
}

//! Admin user management commands.

use std::path::PathBuf;

use anyhow::{Context, anyhow};
use playdock_gateway::auth::{Role, UserStore, setup::generate_password};
use playdock_gateway::GatewayState;

use crate::ui;

const GENERATED_PASSWORD_LENGTH: usize = 16;

/// Arguments for admin commands.
pub struct AdminArgs {
    /// The admin action to perform.
    pub action: AdminAction,
    /// Data directory override.
    pub data_dir: Option<PathBuf>,
}

/// Admin actions.
pub enum AdminAction {
    /// Create a new user.
    Create {
        username: String,
        password: Option<String>,
        role: String,
        generate_password: bool,
    },
    /// List all users.
    List,
    /// Reset a user's password.
    ResetPassword { username: String },
    /// Delete a user and their games.
    Delete { username: String },
}

/// Run the admin command.
///
/// # Errors
///
/// Returns error if the operation fails.
pub async fn run_admin(args: AdminArgs) -> anyhow::Result<()> {
    let config = super::load_config()?;
    let data_dir = args.data_dir.unwrap_or_else(|| config.data_dir());

    let state = GatewayState::open(&data_dir, &config.auth)
        .with_context(|| format!("Failed to open data in {}", data_dir.display()))?;

    match args.action {
        AdminAction::Create {
            username,
            password,
            role,
            generate_password: gen_pwd,
        } => create_user(&state, &username, password, &role, gen_pwd).await,
        AdminAction::List => list_users(&state.users),
        AdminAction::ResetPassword { username } => reset_password(&state, &username).await,
        AdminAction::Delete { username } => delete_user(&state, &username),
    }
}

async fn create_user(
    state: &GatewayState,
    username: &str,
    password: Option<String>,
    role_str: &str,
    gen_pwd: bool,
) -> anyhow::Result<()> {
    let role: Role = role_str
        .parse()
        .map_err(|_| anyhow!("Invalid role: {role_str}. Use: admin or standard"))?;

    let password = if gen_pwd {
        let pwd = generate_password(GENERATED_PASSWORD_LENGTH);
        ui::success(&format!("Generated password: {pwd}"));
        pwd
    } else {
        password
            .filter(|p| !p.is_empty())
            .ok_or_else(|| anyhow!("Password required. Use --password or --generate-password"))?
    };

    state
        .auth
        .create_identity(username, &password, role)
        .await
        .context("Failed to create user")?;

    ui::success(&format!("Created user '{username}' with role '{role}'"));
    Ok(())
}

fn list_users(store: &UserStore) -> anyhow::Result<()> {
    let users = store.list().context("Failed to list users")?;

    if users.is_empty() {
        ui::info("No users configured.");
        ui::info(
            "Run 'playdock admin create --username admin --generate-password' to create an admin user.",
        );
        return Ok(());
    }

    ui::info(&format!("Users ({}):", users.len()));
    println!();
    println!("{:<8} {:<24} {:<10} {:<20}", "ID", "USERNAME", "ROLE", "CREATED");
    println!("{}", "-".repeat(64));

    for user in users {
        let created = user.created_at.format("%Y-%m-%d %H:%M:%S");
        println!(
            "{:<8} {:<24} {:<10} {:<20}",
            user.id, user.username, user.role, created
        );
    }

    Ok(())
}

async fn reset_password(state: &GatewayState, username: &str) -> anyhow::Result<()> {
    let user = state
        .users
        .get_by_username(username)
        .context("Failed to find user")?
        .ok_or_else(|| anyhow!("User not found: {username}"))?;

    let new_password = generate_password(GENERATED_PASSWORD_LENGTH);
    let hash = state.auth.hash_password(&new_password).await?;
    state
        .users
        .update_password(user.id, &hash)
        .context("Failed to update user")?;

    ui::success(&format!("Password reset for user '{username}'"));
    ui::success(&format!("New password: {new_password}"));
    ui::warning("Existing sessions stay valid until their tokens expire");

    Ok(())
}

fn delete_user(state: &GatewayState, username: &str) -> anyhow::Result<()> {
    let user = state
        .users
        .get_by_username(username)
        .context("Failed to find user")?
        .ok_or_else(|| anyhow!("User not found: {username}"))?;

    state.users.delete(user.id).context("Failed to delete user")?;
    let games = state
        .games
        .delete_by_owner(user.id)
        .context("Failed to delete games")?;

    ui::success(&format!("Deleted user '{username}' and {games} game(s)"));
    Ok(())
}

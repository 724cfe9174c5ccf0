//! Playdock CLI - run the gateway and manage accounts.

mod commands;
mod ui;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Parser)]
#[command(name = "playdock")]
#[command(about = "Playdock - game library server")]
#[command(version)]
#[command(propagate_version = true)]
struct Cli {
    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the gateway server
    Serve {
        /// Port to listen on
        #[arg(short, long, env = "PLAYDOCK_PORT")]
        port: Option<u16>,

        /// Bind address (local, public, or IP)
        #[arg(long)]
        bind: Option<String>,

        /// Data directory override
        #[arg(long)]
        data_dir: Option<PathBuf>,
    },

    /// User management (admin commands)
    Admin {
        #[command(subcommand)]
        action: AdminCommands,

        /// Data directory override
        #[arg(long, global = true)]
        data_dir: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
enum AdminCommands {
    /// Create a new user
    Create {
        /// Username for the new user
        #[arg(long)]
        username: String,

        /// Password (or use --generate-password)
        #[arg(long, conflicts_with = "generate_password")]
        password: Option<String>,

        /// User role: admin or standard
        #[arg(long, default_value = "admin")]
        role: String,

        /// Generate a random password
        #[arg(long)]
        generate_password: bool,
    },

    /// List all users
    List,

    /// Reset a user's password
    ResetPassword {
        /// Username of the user
        #[arg(long)]
        username: String,
    },

    /// Delete a user
    Delete {
        /// Username of the user to delete
        #[arg(long)]
        username: String,
    },
}

fn init_logging(verbose: bool, json: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let registry = tracing_subscriber::registry().with(filter);

    if json {
        registry.with(fmt::layer().json()).init();
    } else {
        registry.with(fmt::layer().with_target(false)).init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.json_logs);

    let result = match cli.command {
        Commands::Serve {
            port,
            bind,
            data_dir,
        } => {
            commands::run_serve(commands::serve::ServeArgs {
                port,
                bind,
                data_dir,
            })
            .await
        }

        Commands::Admin { action, data_dir } => {
            let action = match action {
                AdminCommands::Create {
                    username,
                    password,
                    role,
                    generate_password,
                } => commands::admin::AdminAction::Create {
                    username,
                    password,
                    role,
                    generate_password,
                },
                AdminCommands::List => commands::admin::AdminAction::List,
                AdminCommands::ResetPassword { username } => {
                    commands::admin::AdminAction::ResetPassword { username }
                }
                AdminCommands::Delete { username } => {
                    commands::admin::AdminAction::Delete { username }
                }
            };
            commands::run_admin(commands::admin::AdminArgs { action, data_dir }).await
        }
    };

    if let Err(e) = result {
        ui::error(&format!("{e:#}"));
        std::process::exit(1);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_admin_create() {
        let cli = Cli::try_parse_from([
            "playdock",
            "admin",
            "create",
            "--username",
            "root",
            "--generate-password",
            "--role",
            "standard",
        ])
        .unwrap();

        match cli.command {
            Commands::Admin {
                action:
                    AdminCommands::Create {
                        username,
                        role,
                        generate_password,
                        password,
                    },
                ..
            } => {
                assert_eq!(username, "root");
                assert_eq!(role, "standard");
                assert!(generate_password);
                assert!(password.is_none());
            }
            _ => panic!("expected admin create"),
        }
    }

    #[test]
    fn test_password_conflicts_with_generate() {
        let result = Cli::try_parse_from([
            "playdock",
            "admin",
            "create",
            "--username",
            "root",
            "--password",
            "pw",
            "--generate-password",
        ]);
        assert!(result.is_err());
    }
}

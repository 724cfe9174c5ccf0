//! CLI command implementations.

pub mod admin;
pub mod serve;

pub use admin::run_admin;
pub use serve::run_serve;

use anyhow::Context;
use playdock_core::Config;

use crate::ui;

/// Load the configuration file, falling back to defaults if it is absent.
///
/// # Errors
///
/// Returns error if the file exists but cannot be parsed or is invalid.
pub fn load_config() -> anyhow::Result<Config> {
    let path = Config::default_path();
    if !path.exists() {
        ui::warning("No configuration found, using defaults");
        ui::kv("Expected at", &path.display().to_string());
    }

    let config = Config::load_default()
        .with_context(|| format!("Failed to load {}", path.display()))?
        .with_env_overrides();
    config.validate().context("Invalid configuration")?;
    Ok(config)
}

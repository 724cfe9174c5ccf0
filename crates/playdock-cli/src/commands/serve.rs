//! Serve command - run the gateway in the foreground.

use std::path::PathBuf;

use anyhow::Result;
use playdock_core::config::BindMode;
use playdock_gateway::GatewayConfig;

use crate::ui;

/// Serve command arguments.
#[derive(Debug, Clone, Default)]
pub struct ServeArgs {
    /// Port to listen on.
    pub port: Option<u16>,
    /// Bind address: `local`, `public`, or an IP.
    pub bind: Option<String>,
    /// Data directory override.
    pub data_dir: Option<PathBuf>,
}

/// Start the gateway and block until it stops.
///
/// # Errors
///
/// Returns error if configuration is invalid or the server fails.
pub async fn run_serve(args: ServeArgs) -> Result<()> {
    let mut config = super::load_config()?;

    if let Some(port) = args.port {
        config.gateway.port = port;
    }
    if let Some(bind) = args.bind {
        config.gateway.mode = parse_bind(&bind);
    }
    if let Some(dir) = args.data_dir {
        config.gateway.data_dir = Some(dir);
    }
    config.validate()?;

    let gateway_config = GatewayConfig::from_config(&config);

    ui::header("Starting Playdock Gateway");
    ui::kv(
        "Address",
        &format!("{}:{}", gateway_config.bind_address, gateway_config.port),
    );
    ui::kv("Data", &gateway_config.data_dir.display().to_string());
    ui::kv("Cookie", &gateway_config.auth.cookie_name);
    if !gateway_config.auth.secure_cookie {
        ui::warning("Secure cookies disabled; use only for local development");
    }
    println!();

    playdock_gateway::start(gateway_config).await?;
    Ok(())
}

fn parse_bind(bind: &str) -> BindMode {
    match bind {
        "local" | "loopback" => BindMode::Local,
        "public" | "lan" => BindMode::Public,
        addr => BindMode::Custom(addr.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_bind() {
        assert_eq!(parse_bind("local"), BindMode::Local);
        assert_eq!(parse_bind("public"), BindMode::Public);
        assert_eq!(
            parse_bind("10.0.0.5"),
            BindMode::Custom("10.0.0.5".to_string())
        );
    }
}

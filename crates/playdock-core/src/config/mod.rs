//! Configuration loading and validation.
//!
//! Config location: `~/.playdock/playdock.json` (JSON5).

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Default access token expiry in hours.
const DEFAULT_TOKEN_EXPIRY_HOURS: u64 = 24;
/// Longest accepted token expiry: one year.
pub const MAX_TOKEN_EXPIRY_HOURS: u64 = 24 * 365;
/// Name of the cookie carrying the session token.
pub const DEFAULT_COOKIE_NAME: &str = "token";

/// Configuration errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// IO error reading config file.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON5 parsing error.
    #[error("Parse error: {0}")]
    Parse(#[from] json5::Error),

    /// Config validation error.
    #[error("Validation error: {0}")]
    Validation(String),
}

/// Main configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// HTTP server configuration.
    #[serde(default)]
    pub gateway: GatewayConfig,

    /// Authentication configuration.
    #[serde(default)]
    pub auth: AuthConfig,
}

impl Config {
    /// Load configuration from the default location.
    ///
    /// # Errors
    ///
    /// Returns error if config cannot be loaded or parsed.
    pub fn load_default() -> Result<Self, ConfigError> {
        let path = Self::default_path();
        if path.exists() {
            Self::load(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load configuration from a specific path.
    ///
    /// # Errors
    ///
    /// Returns error if file cannot be read, parsed, or fails validation.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// Parse configuration from JSON5 text.
    ///
    /// # Errors
    ///
    /// Returns error if the text is not valid JSON5 or fails validation.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let config: Self = json5::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a path.
    ///
    /// # Errors
    ///
    /// Returns error if serialization or file write fails.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(self)
            .map_err(|e| ConfigError::Validation(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Get the default config file path.
    #[must_use]
    pub fn default_path() -> PathBuf {
        Self::state_dir().join("playdock.json")
    }

    /// Get the Playdock state directory.
    ///
    /// Uses `PLAYDOCK_STATE_DIR` env var if set, otherwise `~/.playdock`.
    #[must_use]
    pub fn state_dir() -> PathBuf {
        if let Ok(dir) = std::env::var("PLAYDOCK_STATE_DIR") {
            PathBuf::from(dir)
        } else if let Some(home) = dirs::home_dir() {
            home.join(".playdock")
        } else {
            PathBuf::from(".playdock")
        }
    }

    /// Directory holding the database and the persisted signing secret.
    #[must_use]
    pub fn data_dir(&self) -> PathBuf {
        self.gateway
            .data_dir
            .clone()
            .unwrap_or_else(|| Self::state_dir().join("data"))
    }

    /// Apply environment variable overrides.
    #[must_use]
    pub fn with_env_overrides(mut self) -> Self {
        self.auth = self.auth.with_env_overrides();
        self
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns the first invalid setting found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.gateway.port == 0 {
            return Err(ConfigError::Validation(
                "Gateway port cannot be 0".to_string(),
            ));
        }

        self.auth.validate()
    }
}

/// HTTP server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GatewayConfig {
    /// Port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Bind address mode.
    #[serde(default)]
    pub mode: BindMode,

    /// Enable CORS.
    #[serde(default = "default_true")]
    pub cors: bool,

    /// Request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    /// Data directory override.
    #[serde(default)]
    pub data_dir: Option<PathBuf>,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            mode: BindMode::default(),
            cors: true,
            timeout_secs: default_timeout(),
            data_dir: None,
        }
    }
}

impl GatewayConfig {
    /// Resolve the bind mode to an address.
    #[must_use]
    pub fn bind_address(&self) -> String {
        match &self.mode {
            BindMode::Local => "127.0.0.1".to_string(),
            BindMode::Public => "0.0.0.0".to_string(),
            BindMode::Custom(addr) => addr.clone(),
        }
    }

    /// Request timeout as Duration.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

const fn default_port() -> u16 {
    3000
}

const fn default_timeout() -> u64 {
    30
}

const fn default_true() -> bool {
    true
}

/// Gateway bind mode.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BindMode {
    /// Bind to localhost only.
    #[default]
    Local,
    /// Bind to all interfaces.
    Public,
    /// Custom bind address.
    Custom(String),
}

/// Authentication configuration.
#[derive(Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthConfig {
    /// Token signing secret (hex-encoded). Generated and persisted if not set.
    #[serde(default)]
    pub jwt_secret: Option<String>,

    /// Access token expiry in hours.
    #[serde(default = "default_token_expiry")]
    pub token_expiry_hours: u64,

    /// Name of the session cookie.
    #[serde(default = "default_cookie_name")]
    pub cookie_name: String,

    /// Restrict the session cookie to HTTPS.
    #[serde(default = "default_true")]
    pub secure_cookie: bool,

    /// Password hashing cost.
    #[serde(default)]
    pub hashing: HashingConfig,
}

fn default_token_expiry() -> u64 {
    DEFAULT_TOKEN_EXPIRY_HOURS
}

fn default_cookie_name() -> String {
    DEFAULT_COOKIE_NAME.to_string()
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: None,
            token_expiry_hours: default_token_expiry(),
            cookie_name: default_cookie_name(),
            secure_cookie: true,
            hashing: HashingConfig::default(),
        }
    }
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("jwt_secret", &self.jwt_secret.as_ref().map(|_| "<redacted>"))
            .field("token_expiry_hours", &self.token_expiry_hours)
            .field("cookie_name", &self.cookie_name)
            .field("secure_cookie", &self.secure_cookie)
            .field("hashing", &self.hashing)
            .finish()
    }
}

impl AuthConfig {
    /// Create a new auth config builder.
    #[must_use]
    pub fn builder() -> AuthConfigBuilder {
        AuthConfigBuilder::default()
    }

    /// Get token expiry as Duration.
    #[must_use]
    pub const fn token_expiry(&self) -> Duration {
        Duration::from_secs(self.token_expiry_hours.saturating_mul(3600))
    }

    /// Load config from environment variables (overrides).
    #[must_use]
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(secret) = std::env::var("PLAYDOCK_JWT_SECRET") {
            if !secret.is_empty() {
                self.jwt_secret = Some(secret);
            }
        }

        if std::env::var("PLAYDOCK_INSECURE_COOKIES")
            .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
            .unwrap_or(false)
        {
            self.secure_cookie = false;
        }

        self
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.token_expiry_hours == 0 {
            return Err(ConfigError::Validation(
                "Token expiry must be at least one hour".to_string(),
            ));
        }
        if self.token_expiry_hours > MAX_TOKEN_EXPIRY_HOURS {
            return Err(ConfigError::Validation(format!(
                "Token expiry cannot exceed {MAX_TOKEN_EXPIRY_HOURS} hours"
            )));
        }

        if self.cookie_name.trim().is_empty() {
            return Err(ConfigError::Validation(
                "Cookie name cannot be empty".to_string(),
            ));
        }

        self.hashing.validate()
    }
}

/// Argon2id cost parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HashingConfig {
    /// Memory cost in KiB.
    #[serde(default = "default_memory_kib")]
    pub memory_kib: u32,
    /// Number of passes.
    #[serde(default = "default_iterations")]
    pub iterations: u32,
    /// Degree of parallelism.
    #[serde(default = "default_parallelism")]
    pub parallelism: u32,
}

const fn default_memory_kib() -> u32 {
    19 * 1024
}

const fn default_iterations() -> u32 {
    2
}

const fn default_parallelism() -> u32 {
    1
}

impl Default for HashingConfig {
    fn default() -> Self {
        Self {
            memory_kib: default_memory_kib(),
            iterations: default_iterations(),
            parallelism: default_parallelism(),
        }
    }
}

impl HashingConfig {
    /// Cheapest parameters Argon2 accepts. Only suitable for tests.
    #[must_use]
    pub const fn minimal() -> Self {
        Self {
            memory_kib: 8,
            iterations: 1,
            parallelism: 1,
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.parallelism == 0 || self.iterations == 0 {
            return Err(ConfigError::Validation(
                "Hashing iterations and parallelism must be positive".to_string(),
            ));
        }
        let min_memory = self.parallelism.checked_mul(8).ok_or_else(|| {
            ConfigError::Validation(format!(
                "Hashing parallelism {} is too large",
                self.parallelism
            ))
        })?;
        if self.memory_kib < min_memory {
            return Err(ConfigError::Validation(format!(
                "Hashing memory must be at least {min_memory} KiB for parallelism {}",
                self.parallelism
            )));
        }
        Ok(())
    }
}

/// Builder for `AuthConfig`.
#[derive(Debug, Default)]
pub struct AuthConfigBuilder {
    config: AuthConfig,
}

impl AuthConfigBuilder {
    /// Set the signing secret (hex).
    #[must_use]
    pub fn jwt_secret(mut self, secret: impl Into<String>) -> Self {
        self.config.jwt_secret = Some(secret.into());
        self
    }

    /// Set token expiry in hours.
    #[must_use]
    pub const fn token_expiry_hours(mut self, hours: u64) -> Self {
        self.config.token_expiry_hours = hours;
        self
    }

    /// Set the session cookie name.
    #[must_use]
    pub fn cookie_name(mut self, name: impl Into<String>) -> Self {
        self.config.cookie_name = name.into();
        self
    }

    /// Set whether the session cookie is HTTPS-only.
    #[must_use]
    pub const fn secure_cookie(mut self, secure: bool) -> Self {
        self.config.secure_cookie = secure;
        self
    }

    /// Set password hashing cost.
    #[must_use]
    pub const fn hashing(mut self, hashing: HashingConfig) -> Self {
        self.config.hashing = hashing;
        self
    }

    /// Build the config.
    #[must_use]
    pub fn build(self) -> AuthConfig {
        self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.gateway.port, 3000);
        assert_eq!(config.gateway.bind_address(), "127.0.0.1");
        assert!(config.auth.jwt_secret.is_none());
        assert_eq!(config.auth.cookie_name, "token");
        assert!(config.auth.secure_cookie);
        assert_eq!(config.auth.token_expiry(), Duration::from_secs(24 * 3600));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_json5() {
        let config = Config::parse(
            r#"{
                // local development
                gateway: { port: 8080, mode: "public", timeoutSecs: 5 },
                auth: { tokenExpiryHours: 2, secureCookie: false, hashing: { memoryKib: 4096 } },
            }"#,
        )
        .unwrap();

        assert_eq!(config.gateway.port, 8080);
        assert_eq!(config.gateway.mode, BindMode::Public);
        assert_eq!(config.gateway.bind_address(), "0.0.0.0");
        assert_eq!(config.gateway.timeout(), Duration::from_secs(5));
        assert_eq!(config.auth.token_expiry_hours, 2);
        assert!(!config.auth.secure_cookie);
        assert_eq!(config.auth.hashing.memory_kib, 4096);
        assert_eq!(config.auth.hashing.iterations, 2);
    }

    #[test]
    fn test_custom_bind_mode() {
        let config = Config::parse(r#"{ gateway: { mode: { custom: "10.0.0.5" } } }"#).unwrap();
        assert_eq!(config.gateway.bind_address(), "10.0.0.5");
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        assert!(matches!(
            Config::parse("{ gateway: { port: 0 } }"),
            Err(ConfigError::Validation(_))
        ));
        assert!(matches!(
            Config::parse("{ auth: { tokenExpiryHours: 0 } }"),
            Err(ConfigError::Validation(_))
        ));
        assert!(matches!(
            Config::parse(r#"{ auth: { cookieName: " " } }"#),
            Err(ConfigError::Validation(_))
        ));
        assert!(matches!(
            Config::parse("{ auth: { hashing: { memoryKib: 4, parallelism: 1 } } }"),
            Err(ConfigError::Validation(_))
        ));
    }

    #[test]
    fn test_validation_rejects_oversized_values() {
        assert!(matches!(
            Config::parse("{ auth: { tokenExpiryHours: 9007199254740993 } }"),
            Err(ConfigError::Validation(_))
        ));
        assert!(matches!(
            Config::parse("{ auth: { tokenExpiryHours: 8761 } }"),
            Err(ConfigError::Validation(_))
        ));
        assert!(matches!(
            Config::parse("{ auth: { hashing: { parallelism: 4294967295 } } }"),
            Err(ConfigError::Validation(_))
        ));

        let config = Config::parse("{ auth: { tokenExpiryHours: 8760 } }").unwrap();
        assert_eq!(config.auth.token_expiry(), Duration::from_secs(8760 * 3600));

        let unchecked = AuthConfig::builder().token_expiry_hours(u64::MAX).build();
        assert_eq!(unchecked.token_expiry(), Duration::from_secs(u64::MAX));
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("playdock.json");

        let mut config = Config::default();
        config.gateway.port = 4100;
        config.auth = AuthConfig::builder()
            .jwt_secret("ab".repeat(32))
            .token_expiry_hours(6)
            .build();
        config.save(&path).unwrap();

        let loaded = Config::load(&path).unwrap();
        assert_eq!(loaded.gateway.port, 4100);
        assert_eq!(loaded.auth.token_expiry_hours, 6);
        assert_eq!(loaded.auth.jwt_secret, Some("ab".repeat(32)));
    }

    #[test]
    fn test_debug_redacts_secret() {
        let config = AuthConfig::builder().jwt_secret("deadbeef").build();
        let rendered = format!("{config:?}");
        assert!(!rendered.contains("deadbeef"));
        assert!(rendered.contains("<redacted>"));
    }

    #[test]
    fn test_minimal_hashing_is_valid() {
        let config = AuthConfig::builder()
            .hashing(HashingConfig::minimal())
            .build();
        assert!(config.validate().is_ok());
    }
}

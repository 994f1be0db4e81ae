//! Configuration system for the `HandUp` server.
//!
//! Supports layered configuration with the following priority (highest first):
//! 1. CLI arguments
//! 2. Environment variables (via clap `env` attribute)
//! 3. TOML config file (`~/.config/handup-server/config.toml`)
//! 4. Compiled defaults

use std::path::PathBuf;

use crate::auth::DEFAULT_TOKEN_TTL_DAYS;
use crate::broadcast::DEFAULT_EVENT_BUFFER;

/// Secret used when none is configured; only acceptable for development.
pub const DEV_JWT_SECRET: &str = "handup-dev-secret";

/// Errors that can occur when loading server configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file.
    #[error("failed to read config file {path}: {source}")]
    ReadFile {
        /// Path that was attempted.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// Failed to parse the TOML configuration.
    #[error("failed to parse config file: {0}")]
    ParseToml(#[from] toml::de::Error),
}

// ---------------------------------------------------------------------------
// TOML file structs (all fields Option for partial overrides)
// ---------------------------------------------------------------------------

/// Top-level TOML config file structure.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct ServerConfigFile {
    server: ServerFileSection,
    auth: AuthFileSection,
}

/// `[server]` section of the config file.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct ServerFileSection {
    bind_addr: Option<String>,
    event_buffer: Option<usize>,
}

/// `[auth]` section of the config file.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct AuthFileSection {
    jwt_secret: Option<String>,
    token_ttl_days: Option<i64>,
}

// ---------------------------------------------------------------------------
// CLI arguments
// ---------------------------------------------------------------------------

/// CLI arguments for the server.
#[derive(clap::Parser, Debug, Default)]
#[command(version, about = "HandUp task board server")]
pub struct ServerCliArgs {
    /// Address to bind the server to.
    #[arg(short, long, env = "HANDUP_ADDR")]
    pub bind: Option<String>,

    /// Path to config file (default: `~/.config/handup-server/config.toml`).
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Secret used to sign bearer tokens.
    #[arg(long, env = "HANDUP_JWT_SECRET", hide_env_values = true)]
    pub jwt_secret: Option<String>,

    /// Bearer token validity in days.
    #[arg(long)]
    pub token_ttl_days: Option<i64>,

    /// Broadcast channel capacity per observer.
    #[arg(long)]
    pub event_buffer: Option<usize>,

    /// Log level filter (trace, debug, info, warn, error).
    #[arg(long, default_value = "info", env = "HANDUP_LOG")]
    pub log_level: String,
}

// ---------------------------------------------------------------------------
// Resolved configuration
// ---------------------------------------------------------------------------

/// Fully resolved server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind the server to (e.g., `0.0.0.0:5000`).
    pub bind_addr: String,
    /// Secret used to sign bearer tokens.
    pub jwt_secret: String,
    /// Bearer token validity in days.
    pub token_ttl_days: i64,
    /// Broadcast channel capacity per observer.
    pub event_buffer: usize,
    /// Log level filter string.
    pub log_level: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:5000".to_string(),
            jwt_secret: DEV_JWT_SECRET.to_string(),
            token_ttl_days: DEFAULT_TOKEN_TTL_DAYS,
            event_buffer: DEFAULT_EVENT_BUFFER,
            log_level: "info".to_string(),
        }
    }
}

impl ServerConfig {
    /// Load configuration by merging CLI args, env vars, and a TOML file.
    ///
    /// If `--config` is given and the file does not exist, returns an error.
    /// If no `--config` is given, the default path is tried and a missing
    /// file is treated as empty config.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the explicit config file cannot be read
    /// or parsed.
    pub fn load(cli: &ServerCliArgs) -> Result<Self, ConfigError> {
        let file = load_config_file(cli.config.as_deref())?;
        Ok(Self::resolve(cli, &file))
    }

    /// `true` if the resolved secret is still the compiled-in dev default.
    #[must_use]
    pub fn uses_dev_secret(&self) -> bool {
        self.jwt_secret == DEV_JWT_SECRET
    }

    /// Resolve a `ServerConfig` from CLI args and a parsed config file.
    ///
    /// Priority: CLI > file > default.
    #[must_use]
    fn resolve(cli: &ServerCliArgs, file: &ServerConfigFile) -> Self {
        let defaults = Self::default();

        Self {
            bind_addr: cli
                .bind
                .clone()
                .or_else(|| file.server.bind_addr.clone())
                .unwrap_or(defaults.bind_addr),
            jwt_secret: cli
                .jwt_secret
                .clone()
                .or_else(|| file.auth.jwt_secret.clone())
                .unwrap_or(defaults.jwt_secret),
            token_ttl_days: cli
                .token_ttl_days
                .or(file.auth.token_ttl_days)
                .unwrap_or(defaults.token_ttl_days),
            event_buffer: cli
                .event_buffer
                .or(file.server.event_buffer)
                .unwrap_or(defaults.event_buffer),
            log_level: cli.log_level.clone(),
        }
    }
}

// ---------------------------------------------------------------------------
// Internal helpers
// ---------------------------------------------------------------------------

/// Load and parse a TOML config file.
fn load_config_file(
    explicit_path: Option<&std::path::Path>,
) -> Result<ServerConfigFile, ConfigError> {
    let path = if let Some(p) = explicit_path {
        let contents = std::fs::read_to_string(p).map_err(|e| ConfigError::ReadFile {
            path: p.to_path_buf(),
            source: e,
        })?;
        return Ok(toml::from_str(&contents)?);
    } else {
        let Some(config_dir) = dirs::config_dir() else {
            return Ok(ServerConfigFile::default());
        };
        config_dir.join("handup-server").join("config.toml")
    };

    match std::fs::read_to_string(&path) {
        Ok(contents) => Ok(toml::from_str(&contents)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(ServerConfigFile::default()),
        Err(e) => Err(ConfigError::ReadFile { path, source: e }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_development_safe() {
        let config = ServerConfig::default();
        assert_eq!(config.bind_addr, "0.0.0.0:5000");
        assert_eq!(config.token_ttl_days, 30);
        assert_eq!(config.event_buffer, 256);
        assert!(config.uses_dev_secret());
    }

    #[test]
    fn toml_parsing_full() {
        let toml_str = r#"
[server]
bind_addr = "127.0.0.1:8080"
event_buffer = 512

[auth]
jwt_secret = "prod-secret"
token_ttl_days = 7
"#;
        let file: ServerConfigFile = toml::from_str(toml_str).unwrap();
        let cli = ServerCliArgs::default();
        let config = ServerConfig::resolve(&cli, &file);

        assert_eq!(config.bind_addr, "127.0.0.1:8080");
        assert_eq!(config.event_buffer, 512);
        assert_eq!(config.jwt_secret, "prod-secret");
        assert_eq!(config.token_ttl_days, 7);
        assert!(!config.uses_dev_secret());
    }

    #[test]
    fn toml_parsing_partial() {
        let toml_str = r#"
[auth]
token_ttl_days = 14
"#;
        let file: ServerConfigFile = toml::from_str(toml_str).unwrap();
        let cli = ServerCliArgs::default();
        let config = ServerConfig::resolve(&cli, &file);

        assert_eq!(config.bind_addr, "0.0.0.0:5000"); // default
        assert_eq!(config.token_ttl_days, 14); // from file
        assert!(config.uses_dev_secret()); // default
    }

    #[test]
    fn cli_overrides_file() {
        let toml_str = r#"
[server]
bind_addr = "127.0.0.1:8080"

[auth]
jwt_secret = "file-secret"
"#;
        let file: ServerConfigFile = toml::from_str(toml_str).unwrap();
        let cli = ServerCliArgs {
            bind: Some("0.0.0.0:3000".to_string()),
            jwt_secret: None, // not set on CLI — should fall through to file
            ..Default::default()
        };
        let config = ServerConfig::resolve(&cli, &file);

        assert_eq!(config.bind_addr, "0.0.0.0:3000"); // from CLI
        assert_eq!(config.jwt_secret, "file-secret"); // from file
    }

    #[test]
    fn missing_config_file_returns_defaults() {
        let result = load_config_file(None);
        assert!(result.is_ok());
    }

    #[test]
    fn explicit_missing_config_file_returns_error() {
        let result = load_config_file(Some(std::path::Path::new("/nonexistent/config.toml")));
        assert!(matches!(result, Err(ConfigError::ReadFile { .. })));
    }
}

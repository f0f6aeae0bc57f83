#![deny(unsafe_code)]

//! Configuration loading and validation for lightning-rest.
//!
//! Loads TOML configuration files and validates them. [`AppConfig`] is the
//! central configuration structure; every section and field has a default so
//! an empty file (or no file at all) is a valid configuration.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Default location of the daemon's JSON-RPC socket.
pub const DEFAULT_SOCKET_PATH: &str = "~/.lightning/lightning-rpc";

/// Errors that can occur during configuration loading and validation.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("validation error: {0}")]
    Validation(String),
}

/// Top-level application configuration.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppConfig {
    /// HTTP listener configuration.
    #[serde(default)]
    pub server: ServerConfig,

    /// Daemon RPC connection configuration.
    #[serde(default)]
    pub rpc: RpcConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,

    /// How daemon error codes map onto HTTP statuses.
    #[serde(default)]
    pub errors: ErrorsConfig,
}

/// Configuration for the HTTP listener.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Address to bind. The default listens on all interfaces.
    #[serde(default = "default_bind")]
    pub bind: String,

    /// Port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Largest request body accepted, in bytes.
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            port: default_port(),
            max_body_bytes: default_max_body_bytes(),
        }
    }
}

fn default_bind() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8000
}

fn default_max_body_bytes() -> usize {
    1024 * 1024 // 1 MiB
}

/// Configuration for the connection to the daemon.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RpcConfig {
    /// Path to the daemon's Unix socket. A leading `~/` expands to `$HOME`.
    #[serde(default = "default_socket_path")]
    pub socket_path: String,

    /// Per-call timeout in seconds (0 = no timeout).
    #[serde(default)]
    pub timeout_secs: u64,
}

impl Default for RpcConfig {
    fn default() -> Self {
        Self {
            socket_path: default_socket_path(),
            timeout_secs: 0,
        }
    }
}

fn default_socket_path() -> String {
    DEFAULT_SOCKET_PATH.to_string()
}

impl RpcConfig {
    /// The socket path with `~` expanded against the current `$HOME`.
    pub fn resolved_socket_path(&self) -> PathBuf {
        let home = std::env::var_os("HOME").map(PathBuf::from);
        expand_home(&self.socket_path, home.as_deref())
    }

    /// The per-call timeout, if one is configured.
    pub fn timeout(&self) -> Option<std::time::Duration> {
        (self.timeout_secs > 0).then(|| std::time::Duration::from_secs(self.timeout_secs))
    }
}

/// Expand a leading `~` in `path` to `home`.
///
/// Paths without a leading `~`, and all paths when `home` is unknown, are
/// returned unchanged.
pub fn expand_home(path: &str, home: Option<&Path>) -> PathBuf {
    match (path, home) {
        ("~", Some(home)) => home.to_path_buf(),
        (p, Some(home)) if p.starts_with("~/") => home.join(&p[2..]),
        (p, _) => PathBuf::from(p),
    }
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter (e.g. "info", "debug", "trace").
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Classification of daemon JSON-RPC error codes.
///
/// Codes in neither list are reported as an upstream error (HTTP 502).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorsConfig {
    /// Daemon codes reported as HTTP 404.
    #[serde(default = "default_not_found_codes")]
    pub not_found_codes: Vec<i64>,

    /// Daemon codes reported as HTTP 400.
    #[serde(default = "default_bad_request_codes")]
    pub bad_request_codes: Vec<i64>,
}

impl Default for ErrorsConfig {
    fn default() -> Self {
        Self {
            not_found_codes: default_not_found_codes(),
            bad_request_codes: default_bad_request_codes(),
        }
    }
}

fn default_not_found_codes() -> Vec<i64> {
    // 205: route not found, 905: invoice not found
    vec![205, 905]
}

fn default_bad_request_codes() -> Vec<i64> {
    // JSON-RPC invalid request / invalid params
    vec![-32600, -32602]
}

impl AppConfig {
    /// Load configuration from a TOML file at the given path using async I/O.
    pub async fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = tokio::fs::read_to_string(path).await?;
        Self::parse(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn parse(s: &str) -> Result<Self, ConfigError> {
        let config: AppConfig = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.port == 0 {
            return Err(ConfigError::Validation(
                "server.port must be non-zero".to_string(),
            ));
        }
        if self.server.bind.is_empty() {
            return Err(ConfigError::Validation(
                "server.bind must not be empty".to_string(),
            ));
        }
        if self.server.max_body_bytes == 0 {
            return Err(ConfigError::Validation(
                "server.max_body_bytes must be non-zero".to_string(),
            ));
        }
        if self.rpc.socket_path.is_empty() {
            return Err(ConfigError::Validation(
                "rpc.socket_path must not be empty".to_string(),
            ));
        }
        if let Some(code) = self
            .errors
            .not_found_codes
            .iter()
            .find(|c| self.errors.bad_request_codes.contains(c))
        {
            return Err(ConfigError::Validation(format!(
                "errors: code {code} is listed as both not-found and bad-request"
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.server.bind, "0.0.0.0");
        assert_eq!(config.server.port, 8000);
        assert_eq!(config.rpc.socket_path, "~/.lightning/lightning-rpc");
        assert_eq!(config.rpc.timeout(), None);
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.errors.not_found_codes, vec![205, 905]);
    }

    #[test]
    fn test_parse_minimal_toml() {
        let config = AppConfig::parse("").unwrap();
        assert_eq!(config.server.port, 8000);
        assert_eq!(config.server.max_body_bytes, 1024 * 1024);
    }

    #[test]
    fn test_parse_full_toml() {
        let toml = r#"
            [server]
            bind = "127.0.0.1"
            port = 8080
            max_body_bytes = 4096

            [rpc]
            socket_path = "/var/lib/lightningd/lightning-rpc"
            timeout_secs = 30

            [logging]
            level = "debug"

            [errors]
            not_found_codes = [905]
            bad_request_codes = [-32602, 900]
        "#;

        let config = AppConfig::parse(toml).unwrap();
        assert_eq!(config.server.bind, "127.0.0.1");
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.max_body_bytes, 4096);
        assert_eq!(
            config.rpc.resolved_socket_path(),
            PathBuf::from("/var/lib/lightningd/lightning-rpc")
        );
        assert_eq!(
            config.rpc.timeout(),
            Some(std::time::Duration::from_secs(30))
        );
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.errors.bad_request_codes, vec![-32602, 900]);
    }

    #[test]
    fn test_validation_rejects_zero_port() {
        let toml = r#"
            [server]
            port = 0
        "#;
        assert!(AppConfig::parse(toml).is_err());
    }

    #[test]
    fn test_validation_rejects_empty_bind() {
        let toml = r#"
            [server]
            bind = ""
        "#;
        assert!(AppConfig::parse(toml).is_err());
    }

    #[test]
    fn test_validation_rejects_empty_socket_path() {
        let toml = r#"
            [rpc]
            socket_path = ""
        "#;
        assert!(AppConfig::parse(toml).is_err());
    }

    #[test]
    fn test_validation_rejects_overlapping_codes() {
        let toml = r#"
            [errors]
            not_found_codes = [905]
            bad_request_codes = [905]
        "#;
        let err = AppConfig::parse(toml).unwrap_err();
        assert!(err.to_string().contains("905"));
    }

    #[test]
    fn test_parse_rejects_wrong_type() {
        let toml = r#"
            [server]
            port = "eight thousand"
        "#;
        assert!(matches!(AppConfig::parse(toml), Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_expand_home() {
        let home = Path::new("/home/alice");
        assert_eq!(
            expand_home("~/.lightning/lightning-rpc", Some(home)),
            PathBuf::from("/home/alice/.lightning/lightning-rpc")
        );
        assert_eq!(expand_home("~", Some(home)), PathBuf::from("/home/alice"));
        assert_eq!(
            expand_home("/tmp/lightning-rpc", Some(home)),
            PathBuf::from("/tmp/lightning-rpc")
        );
        assert_eq!(
            expand_home("~/lightning-rpc", None),
            PathBuf::from("~/lightning-rpc")
        );
        // `~user` forms are left alone.
        assert_eq!(expand_home("~bob/rpc", Some(home)), PathBuf::from("~bob/rpc"));
    }

    #[test]
    fn test_serialize_roundtrip() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed = AppConfig::parse(&toml_str).unwrap();
        assert_eq!(parsed.server.port, config.server.port);
        assert_eq!(parsed.rpc.socket_path, config.rpc.socket_path);
    }

    #[tokio::test]
    async fn test_load_from_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("lightning-rest.toml");
        tokio::fs::write(&path, "[server]\nport = 9000\n")
            .await
            .unwrap();

        let config = AppConfig::load(&path).await.unwrap();
        assert_eq!(config.server.port, 9000);
    }

    #[tokio::test]
    async fn test_load_missing_file() {
        let dir = TempDir::new().unwrap();
        let result = AppConfig::load(&dir.path().join("absent.toml")).await;
        assert!(matches!(result, Err(ConfigError::Io(_))));
    }
}

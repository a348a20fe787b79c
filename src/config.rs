//! Configuration loading and constants.
//!
//! Settings come from an optional TOML file; command-line values override the
//! file. Every key has a default, so an empty file (or no file at all) is a
//! valid configuration apart from the hostnames, which must be given somewhere.
//! `AppConfig` is the root configuration struct containing all settings.

use serde::Deserialize;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

pub use crate::http::server::{DEFAULT_HTTPS_ADDR, DEFAULT_HTTP_ADDR};

// =============================================================================
// Server Defaults
// =============================================================================

/// Directory served over HTTPS
pub const DEFAULT_ROOT: &str = ".";

/// Read, write and idle timeout for both listeners, in seconds
pub const DEFAULT_TIMEOUT_SECS: u64 = 10;

// =============================================================================
// ACME Defaults
// =============================================================================

/// On-disk certificate cache, keyed by hostname
pub const DEFAULT_CERT_DIR: &str = "../certs";

// =============================================================================
// Logging Defaults
// =============================================================================

/// Name attached to server-level error diagnostics
pub const ERROR_LOG_NAME: &str = "aws";

/// Default log filter when neither the CLI nor RUST_LOG sets one
pub const DEFAULT_LOG_FILTER: &str = "aws=info";

/// Default log format (text or json)
pub const DEFAULT_LOG_FORMAT: &str = "text";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    /// Listener settings
    #[serde(default)]
    pub server: ServerSettings,
    /// Certificate management
    #[serde(default)]
    pub acme: AcmeSettings,
    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Listener settings shared by the plaintext and TLS servers
#[derive(Debug, Clone, Deserialize)]
pub struct ServerSettings {
    /// Directory served at `/`
    #[serde(default = "ServerSettings::default_root")]
    pub root: PathBuf,
    #[serde(default = "ServerSettings::default_http_addr")]
    pub http_addr: SocketAddr,
    #[serde(default = "ServerSettings::default_https_addr")]
    pub https_addr: SocketAddr,
    /// Read, write and idle timeout in seconds (0 disables)
    #[serde(default = "ServerSettings::default_timeout")]
    pub timeout_seconds: u64,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            root: Self::default_root(),
            http_addr: Self::default_http_addr(),
            https_addr: Self::default_https_addr(),
            timeout_seconds: Self::default_timeout(),
        }
    }
}

impl ServerSettings {
    fn default_root() -> PathBuf {
        PathBuf::from(DEFAULT_ROOT)
    }

    fn default_http_addr() -> SocketAddr {
        DEFAULT_HTTP_ADDR
    }

    fn default_https_addr() -> SocketAddr {
        DEFAULT_HTTPS_ADDR
    }

    fn default_timeout() -> u64 {
        DEFAULT_TIMEOUT_SECS
    }
}

/// ACME certificate settings
#[derive(Debug, Clone, Deserialize)]
pub struct AcmeSettings {
    /// Hostnames certificates are issued for; requests for other names fail
    /// the handshake
    #[serde(default)]
    pub domains: Vec<String>,
    #[serde(default = "AcmeSettings::default_cache_dir")]
    pub cache_dir: PathBuf,
    /// Contact e-mail registered with the ACME account
    pub contact: Option<String>,
    /// Use the Let's Encrypt production directory (staging when false)
    #[serde(default = "AcmeSettings::default_production")]
    pub production: bool,
}

impl Default for AcmeSettings {
    fn default() -> Self {
        Self {
            domains: Vec::new(),
            cache_dir: Self::default_cache_dir(),
            contact: None,
            production: Self::default_production(),
        }
    }
}

impl AcmeSettings {
    fn default_cache_dir() -> PathBuf {
        PathBuf::from(DEFAULT_CERT_DIR)
    }

    fn default_production() -> bool {
        true
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log format: "text" (human-readable, default) or "json" (structured)
    #[serde(default = "LoggingConfig::default_format")]
    pub format: String,
    /// Filter directive, e.g. "aws=debug,tower_http=info"
    pub filter: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            format: DEFAULT_LOG_FORMAT.to_string(),
            filter: None,
        }
    }
}

impl LoggingConfig {
    fn default_format() -> String {
        DEFAULT_LOG_FORMAT.to_string()
    }

    pub fn is_json(&self) -> bool {
        self.format.eq_ignore_ascii_case("json")
    }
}

impl AppConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    pub fn parse(contents: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(contents)?)
    }

    /// Check the configuration is complete enough to start.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.acme.domains.is_empty() {
            return Err(ConfigError::MissingHost);
        }
        if self.acme.domains.iter().any(|d| d.trim().is_empty()) {
            return Err(ConfigError::Validation("empty hostname".to_string()));
        }
        match self.logging.format.to_ascii_lowercase().as_str() {
            "text" | "json" => Ok(()),
            other => Err(ConfigError::Validation(format!(
                "unknown log format '{other}' (expected text or json)"
            ))),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("missing host operand")]
    MissingHost,
    #[error("Configuration error: {0}")]
    Validation(String),
}

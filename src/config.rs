//! Configuration types for the depot service.
//!
//! Settings are read from `depot.toml` (see [`crate::paths::config_path`]):
//!
//! - [`ServerConfig`] - HTTP bind address and upload limit
//! - [`StorageConfig`] - data directory and metadata backend
//! - [`RetentionConfig`] - scheduled clean interval and purge default
//! - [`DirectoriesConfig`] - policy for directories created without one
//! - [`LoggingConfig`] - log format and level
//!
//! Every section and field is optional; missing values take the defaults
//! below, so an empty file is a valid configuration.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use crate::model::{DEFAULT_QUOTA_BYTES, DEFAULT_TTL_DAYS};
use crate::paths;

/// Default HTTP bind address.
pub const DEFAULT_BIND: &str = "127.0.0.1:9920";

/// Default scheduled clean interval: once a day.
pub const DEFAULT_CLEAN_INTERVAL_SECS: u64 = 86_400;

/// Result of configuration validation.
#[derive(Debug, Default)]
pub struct ValidationResult {
    /// Non-fatal warnings that should be logged but don't prevent operation.
    pub warnings: Vec<String>,
}

impl ValidationResult {
    /// Returns true if there are any warnings.
    #[must_use]
    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }
}

/// `depot.toml` configuration structure.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub retention: RetentionConfig,
    pub directories: DirectoriesConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
    /// Request bodies above this size are rejected before reaching the depot
    pub max_upload_bytes: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: DEFAULT_BIND.to_string(),
            max_upload_bytes: DEFAULT_QUOTA_BYTES,
        }
    }
}

/// Metadata store implementation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    #[default]
    Redb,
    Memory,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Defaults to `<depot home>/data`
    pub data_dir: Option<PathBuf>,
    pub backend: BackendKind,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RetentionConfig {
    /// 0 disables the scheduled clean in `serve`
    pub clean_interval_secs: u64,
    pub purge_default_ttl_days: i64,
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            clean_interval_secs: DEFAULT_CLEAN_INTERVAL_SECS,
            purge_default_ttl_days: DEFAULT_TTL_DAYS,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DirectoriesConfig {
    pub default_ttl_days: i64,
    pub default_quota_bytes: u64,
}

impl Default for DirectoriesConfig {
    fn default() -> Self {
        Self {
            default_ttl_days: DEFAULT_TTL_DAYS,
            default_quota_bytes: DEFAULT_QUOTA_BYTES,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub format: LogFormat,
    /// Filter directive used when `RUST_LOG` is unset
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            format: LogFormat::Text,
            level: "info".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from the specified path.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The file cannot be read (IO error)
    /// - The file contains invalid TOML syntax
    /// - Fields have invalid types or unknown names
    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Loads `path` if given, else `depot.toml` in the depot home if it
    /// exists, else the defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if an explicit or existing file cannot be loaded.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        if let Some(path) = path {
            return Self::load_from(path);
        }
        let default_path = paths::config_path()?;
        if default_path.exists() {
            Self::load_from(&default_path)
        } else {
            Ok(Self::default())
        }
    }

    /// Effective data directory.
    ///
    /// # Errors
    ///
    /// Returns an error if no home directory can be determined.
    pub fn data_dir(&self) -> Result<PathBuf> {
        match &self.storage.data_dir {
            Some(dir) => Ok(dir.clone()),
            None => paths::data_dir(),
        }
    }

    /// Parsed bind address.
    ///
    /// # Errors
    ///
    /// Returns an error if `server.bind` is not a socket address.
    pub fn bind_addr(&self) -> Result<SocketAddr> {
        self.server
            .bind
            .parse()
            .with_context(|| format!("Invalid server.bind address: {}", self.server.bind))
    }

    /// Validate configuration.
    ///
    /// Returns a `ValidationResult` containing any non-fatal warnings.
    ///
    /// # Errors
    ///
    /// Returns an error listing every hard problem found:
    /// - Unparseable bind address
    /// - Zero default quota or zero upload limit
    pub fn validate(&self) -> Result<ValidationResult> {
        let mut errors = Vec::new();
        let mut warnings = Vec::new();

        if self.server.bind.parse::<SocketAddr>().is_err() {
            errors.push(format!(
                "server.bind '{}' is not a valid socket address (e.g. {DEFAULT_BIND})",
                self.server.bind
            ));
        }

        if self.server.max_upload_bytes == 0 {
            errors.push("server.max_upload_bytes cannot be 0".to_string());
        }

        if self.directories.default_quota_bytes == 0 {
            errors.push("directories.default_quota_bytes must be at least 1".to_string());
        }

        if self.directories.default_ttl_days < 0 {
            warnings.push(format!(
                "directories.default_ttl_days is {}; negative TTLs are treated as 0 (never expire)",
                self.directories.default_ttl_days
            ));
        }

        if self.retention.clean_interval_secs == 0 {
            warnings.push(
                "retention.clean_interval_secs is 0: scheduled clean is disabled\n  \
                 Run `depot clean` periodically instead"
                    .to_string(),
            );
        }

        if self.retention.purge_default_ttl_days < 0 {
            warnings.push(format!(
                "retention.purge_default_ttl_days is {}; it will be clamped to 0",
                self.retention.purge_default_ttl_days
            ));
        }

        if self.storage.backend == BackendKind::Memory {
            warnings.push("storage.backend is 'memory': nothing survives a restart".to_string());
        }

        if !errors.is_empty() {
            anyhow::bail!(
                "Configuration validation failed:\n  - {}",
                errors.join("\n  - ")
            );
        }

        Ok(ValidationResult { warnings })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.server.bind, DEFAULT_BIND);
        assert_eq!(config.storage.backend, BackendKind::Redb);
        assert_eq!(config.retention.clean_interval_secs, 86_400);
        assert_eq!(config.directories.default_ttl_days, 90);
        assert_eq!(config.directories.default_quota_bytes, 1024 * 1024 * 1024);
        assert_eq!(config.logging.format, LogFormat::Text);
        let result = config.validate().unwrap();
        assert!(!result.has_warnings());
    }

    #[test]
    fn test_parse_full_config() {
        let toml_str = r#"
[server]
bind = "0.0.0.0:8080"
max_upload_bytes = 1048576

[storage]
data_dir = "/var/lib/depot"
backend = "memory"

[retention]
clean_interval_secs = 3600
purge_default_ttl_days = 30

[directories]
default_ttl_days = 7
default_quota_bytes = 4096

[logging]
format = "json"
level = "depot=debug"
"#;
        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.bind_addr().unwrap().port(), 8080);
        assert_eq!(config.data_dir().unwrap(), PathBuf::from("/var/lib/depot"));
        assert_eq!(config.storage.backend, BackendKind::Memory);
        assert_eq!(config.retention.purge_default_ttl_days, 30);
        assert_eq!(config.directories.default_quota_bytes, 4096);
        assert_eq!(config.logging.format, LogFormat::Json);
        assert_eq!(config.logging.level, "depot=debug");

        let result = config.validate().unwrap();
        assert_eq!(result.warnings.len(), 1);
    }

    #[test]
    fn test_unknown_section_rejected() {
        assert!(toml::from_str::<Config>("[package]\nname = \"x\"\n").is_err());
    }

    #[test]
    fn test_validate_errors() {
        let mut config = Config::default();
        config.server.bind = "not-an-address".to_string();
        config.directories.default_quota_bytes = 0;
        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("server.bind"));
        assert!(err.contains("default_quota_bytes"));
    }

    #[test]
    fn test_validate_warnings() {
        let mut config = Config::default();
        config.retention.clean_interval_secs = 0;
        config.directories.default_ttl_days = -1;
        let result = config.validate().unwrap();
        assert_eq!(result.warnings.len(), 2);
    }

    #[test]
    fn test_load_from_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("depot.toml");
        fs::write(&path, "[server]\nbind = \"127.0.0.1:1234\"\n").unwrap();

        let config = Config::load(Some(&path)).unwrap();
        assert_eq!(config.bind_addr().unwrap().port(), 1234);

        assert!(Config::load_from(tmp.path().join("missing.toml")).is_err());
    }
}

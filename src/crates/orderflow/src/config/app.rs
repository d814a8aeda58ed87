//! Application configuration for orderflow
//!
//! Loads `orderflow.toml` (or a YAML equivalent) with database, logging and
//! notification settings. Every section has defaults, so an empty file or
//! no file at all yields a working configuration.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use super::loader::{load_config_file, parse_config, ConfigError, ConfigFormat};

/// Database configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// SQLite database file path, or `:memory:`
    #[serde(default = "default_database_path")]
    pub path: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_database_path(),
            max_connections: default_max_connections(),
        }
    }
}

fn default_database_path() -> String {
    "orderflow.db".to_string()
}

fn default_max_connections() -> u32 {
    5
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// `tracing_subscriber::EnvFilter` directives, used when RUST_LOG is unset
    #[serde(default = "default_log_filter")]
    pub filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: default_log_filter(),
        }
    }
}

fn default_log_filter() -> String {
    "info".to_string()
}

/// Requester notification configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Prefix for entity links in notifications
    #[serde(default)]
    pub link_base: String,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            link_base: String::new(),
        }
    }
}

fn default_true() -> bool {
    true
}

/// Complete application configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub notifications: NotificationConfig,
}

impl AppConfig {
    /// Load configuration from a TOML or YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let config: Self = load_config_file(path)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = parse_config(content, ConfigFormat::Toml)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from the default location or environment
    ///
    /// Searches for config in:
    /// 1. ORDERFLOW_CONFIG environment variable
    /// 2. ./config/orderflow.toml
    /// 3. ./orderflow.toml
    /// 4. ./config/orderflow.yaml
    ///
    /// Falls back to defaults when no file exists.
    pub fn load() -> Result<Self, ConfigError> {
        if let Ok(config_path) = std::env::var("ORDERFLOW_CONFIG") {
            return Self::from_file(config_path);
        }

        let paths = [
            PathBuf::from("config/orderflow.toml"),
            PathBuf::from("./orderflow.toml"),
            PathBuf::from("config/orderflow.yaml"),
        ];

        for path in &paths {
            if path.exists() {
                tracing::debug!("Using configuration file {}", path.display());
                return Self::from_file(path);
            }
        }

        tracing::debug!("No configuration file found, using defaults");
        Ok(Self::default())
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.database.path.trim().is_empty() {
            return Err(ConfigError::Invalid("database.path must not be empty".to_string()));
        }
        if self.database.max_connections == 0 {
            return Err(ConfigError::Invalid(
                "database.max_connections must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Get database URL from configuration
    pub fn database_url(&self) -> String {
        if self.database.path == ":memory:" {
            "sqlite::memory:".to_string()
        } else {
            format!("sqlite://{}", self.database.path)
        }
    }
}

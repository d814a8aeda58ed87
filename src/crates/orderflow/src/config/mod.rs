//! Configuration module for orderflow
//!
//! Provides TOML/YAML configuration loading with:
//! - Environment variable expansion (`${VAR:default}`)
//! - Database, logging and notification settings

pub mod app;
pub mod loader;

pub use app::{AppConfig, DatabaseConfig, LoggingConfig, NotificationConfig};
pub use loader::{expand_env_in_string, load_config_file, parse_config, ConfigError, ConfigFormat};

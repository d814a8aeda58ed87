//! Configuration file loader with environment variable expansion
//!
//! Files are read as text, `${ENV_VAR}` and `${ENV_VAR:default}` placeholders
//! are expanded from the environment, and the result is parsed as TOML or
//! YAML depending on the file extension.

use regex::{Captures, Regex};
use serde::de::DeserializeOwned;
use std::env;
use std::fs;
use std::path::Path;
use std::sync::OnceLock;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse TOML: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Failed to parse YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("Unsupported config format: {0}")]
    UnsupportedFormat(String),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Supported file formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Toml,
    Yaml,
}

impl ConfigFormat {
    /// Pick the format from a file extension
    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        match path.extension().and_then(|e| e.to_str()) {
            Some("toml") => Ok(ConfigFormat::Toml),
            Some("yaml") | Some("yml") => Ok(ConfigFormat::Yaml),
            other => Err(ConfigError::UnsupportedFormat(
                other.unwrap_or("<none>").to_string(),
            )),
        }
    }
}

/// Load and deserialize a configuration file
pub fn load_config_file<T: DeserializeOwned, P: AsRef<Path>>(path: P) -> Result<T, ConfigError> {
    let path = path.as_ref();
    let format = ConfigFormat::from_path(path)?;
    let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.display().to_string(),
        source,
    })?;

    parse_config(&content, format)
}

/// Expand placeholders and deserialize configuration text
pub fn parse_config<T: DeserializeOwned>(
    content: &str,
    format: ConfigFormat,
) -> Result<T, ConfigError> {
    let expanded = expand_env_in_string(content).unwrap_or_else(|| content.to_string());

    match format {
        ConfigFormat::Toml => Ok(toml::from_str(&expanded)?),
        ConfigFormat::Yaml => Ok(serde_yaml::from_str(&expanded)?),
    }
}

/// Substitute `${VAR}` and `${VAR:default}` placeholders from the environment
///
/// An unset variable without a default becomes empty. Returns `None` when the
/// text holds no placeholder.
pub fn expand_env_in_string(s: &str) -> Option<String> {
    let pattern = placeholder_pattern()?;
    if !pattern.is_match(s) {
        return None;
    }

    let expanded = pattern.replace_all(s, |caps: &Captures<'_>| {
        env::var(&caps[1]).unwrap_or_else(|_| {
            caps.get(2)
                .map(|default| default.as_str().to_string())
                .unwrap_or_default()
        })
    });
    Some(expanded.into_owned())
}

fn placeholder_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"\$\{([^:}]+)(?::([^}]*))?\}").ok())
        .as_ref()
}

//! Client configuration.
//!
//! Configuration can be loaded from:
//! - Environment variables (PRESENCE_*)
//! - TOML configuration file

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The file could not be parsed.
    #[error("Failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    /// A value is out of range.
    #[error("Invalid configuration: {0}")]
    Invalid(&'static str),
}

/// Presence client configuration.
///
/// Fields missing from a file take their defaults, and the defaults honor
/// `PRESENCE_DEFAULT_TTL` and `PRESENCE_BATCH_LIMIT`. An override that does
/// not parse or is out of range is ignored with a warning, so
/// `PRESENCE_BATCH_LIMIT=0` leaves the limit at 50.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Subscription TTL in seconds when the caller gives none.
    #[serde(default = "default_ttl")]
    pub default_ttl: u32,

    /// Maximum subjects per batched subscribe request.
    #[serde(default = "default_batch_limit")]
    pub batch_limit: usize,

    /// Feature flag scope.
    #[serde(default = "default_feature_scope")]
    pub feature_scope: String,

    /// Feature flag toggled by enable/disable.
    #[serde(default = "default_feature_name")]
    pub feature_name: String,

    /// Value of the usersub device capabilities header.
    #[serde(default = "default_device_caps")]
    pub device_caps: String,

    /// Logical API for subscribe/unsubscribe.
    #[serde(default = "default_usersub_api")]
    pub usersub_api: String,

    /// Logical API for status overrides.
    #[serde(default = "default_status_api")]
    pub status_api: String,
}

// Default value functions
fn default_ttl() -> u32 {
    let name = "PRESENCE_DEFAULT_TTL";
    env_override(name, std::env::var(name).ok(), 0).unwrap_or(600)
}

fn default_batch_limit() -> usize {
    let name = "PRESENCE_BATCH_LIMIT";
    env_override(name, std::env::var(name).ok(), 1).unwrap_or(50)
}

/// Parse an environment override, ignoring values that do not parse or
/// fall below `min`.
fn env_override<T>(name: &str, raw: Option<String>, min: T) -> Option<T>
where
    T: std::str::FromStr + PartialOrd + std::fmt::Display,
{
    let raw = raw?;
    match raw.trim().parse::<T>() {
        Ok(value) if value >= min => Some(value),
        Ok(_) => {
            tracing::warn!(
                %name,
                value = %raw,
                %min,
                "Environment override below minimum, using default"
            );
            None
        }
        Err(_) => {
            tracing::warn!(
                %name,
                value = %raw,
                "Environment override does not parse, using default"
            );
            None
        }
    }
}

fn default_feature_scope() -> String {
    "user".to_string()
}

fn default_feature_name() -> String {
    "user-presence-enabled".to_string()
}

fn default_device_caps() -> String {
    "subs:2".to_string()
}

fn default_usersub_api() -> String {
    "usersub".to_string()
}

fn default_status_api() -> String {
    "apheleiaV2".to_string()
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            default_ttl: default_ttl(),
            batch_limit: default_batch_limit(),
            feature_scope: default_feature_scope(),
            feature_name: default_feature_name(),
            device_caps: default_device_caps(),
            usersub_api: default_usersub_api(),
            status_api: default_status_api(),
        }
    }
}

impl ClientConfig {
    /// Load configuration from the first default path that exists, or defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if a config file exists but cannot be parsed.
    pub fn load() -> Result<Self, ConfigError> {
        let config_paths = ["presence.toml", "~/.config/presence/presence.toml"];

        for path in &config_paths {
            let expanded = shellexpand::tilde(path);
            if Path::new(expanded.as_ref()).exists() {
                return Self::from_file(expanded.as_ref());
            }
        }

        // Fall back to defaults with environment overrides
        let config = Self::default();
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed, or validated.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        let config = Self::from_toml(&contents).map_err(|e| match e {
            ConfigError::Parse { source, .. } => ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            },
            other => other,
        })?;

        Ok(config)
    }

    /// Parse and validate configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns an error if the string cannot be parsed or validated.
    pub fn from_toml(contents: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(contents).map_err(|source| ConfigError::Parse {
            path: PathBuf::new(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Check value ranges.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] for a zero batch limit.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.batch_limit == 0 {
            return Err(ConfigError::Invalid("batch_limit must be at least 1"));
        }
        Ok(())
    }
}

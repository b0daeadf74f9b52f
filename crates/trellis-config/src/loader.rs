//! Loading configuration from TOML, YAML or JSON
//!
//! Any string value of the exact form `{env:VAR}` is replaced by the value
//! of the environment variable `VAR` before the config is deserialized:
//!
//! ```toml
//! [lookup]
//! default_page_size = "{env:TRELLIS_PAGE_SIZE}"
//!
//! [logging]
//! level = "{env:TRELLIS_LOG}"
//! ```
//!
//! Values that read as a number or a boolean are substituted as such, so
//! numeric settings can come from the environment too. The variable must be
//! set or loading fails.

use std::path::{Path, PathBuf};

use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::TrellisConfig;

/// Pattern for env references: {env:VAR}
const ENV_REF_PREFIX: &str = "{env:";
const ENV_REF_SUFFIX: &str = "}";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse {format} config: {message}")]
    Parse {
        format: ConfigFormat,
        message: String,
    },

    #[error("Unsupported config format: {0}")]
    UnsupportedFormat(String),

    #[error("Environment variable not found: {var_name} (referenced as {{env:{var_name}}})")]
    EnvVarNotFound { var_name: String },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Supported configuration file formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Toml,
    Yaml,
    Json,
}

impl ConfigFormat {
    /// Picks the format from a file extension.
    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let ext = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();
        match ext.as_str() {
            "toml" => Ok(Self::Toml),
            "yaml" | "yml" => Ok(Self::Yaml),
            "json" => Ok(Self::Json),
            "" => Err(ConfigError::UnsupportedFormat(format!(
                "{} has no extension",
                path.display()
            ))),
            other => Err(ConfigError::UnsupportedFormat(other.to_string())),
        }
    }
}

impl std::fmt::Display for ConfigFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigFormat::Toml => write!(f, "TOML"),
            ConfigFormat::Yaml => write!(f, "YAML"),
            ConfigFormat::Json => write!(f, "JSON"),
        }
    }
}

/// Reads, expands and validates [`TrellisConfig`]s.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load a config file, choosing the format by extension.
    pub async fn load_from_file(path: impl AsRef<Path>) -> Result<TrellisConfig, ConfigError> {
        let path = path.as_ref();
        let format = ConfigFormat::from_path(path)?;
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| ConfigError::Io {
                path: path.to_path_buf(),
                source,
            })?;
        debug!("Loading {} config from {}", format, path.display());
        Self::load_from_str(&content, format)
    }

    /// Load a config file if one is given and exists, otherwise the defaults.
    pub async fn load_or_default(path: Option<&Path>) -> Result<TrellisConfig, ConfigError> {
        match path {
            Some(path) if tokio::fs::try_exists(path).await.unwrap_or(false) => {
                Self::load_from_file(path).await
            }
            Some(path) => {
                info!("No config at {}, using defaults", path.display());
                Ok(TrellisConfig::default())
            }
            None => Ok(TrellisConfig::default()),
        }
    }

    pub fn load_from_str(content: &str, format: ConfigFormat) -> Result<TrellisConfig, ConfigError> {
        if content.trim().is_empty() {
            return Ok(TrellisConfig::default());
        }
        let mut value = parse_value(content, format)?;
        process_env_refs(&mut value)?;

        // A YAML document holding only comments parses to null.
        if value.is_null() {
            value = Value::Object(serde_json::Map::new());
        }

        let config: TrellisConfig =
            serde_json::from_value(value).map_err(|e| ConfigError::Parse {
                format,
                message: e.to_string(),
            })?;
        config.validate()?;
        Ok(config)
    }
}

fn parse_value(content: &str, format: ConfigFormat) -> Result<Value, ConfigError> {
    let parse_error = |message: String| ConfigError::Parse { format, message };
    match format {
        ConfigFormat::Json => serde_json::from_str(content).map_err(|e| parse_error(e.to_string())),
        #[cfg(feature = "toml")]
        ConfigFormat::Toml => toml::from_str(content).map_err(|e| parse_error(e.to_string())),
        #[cfg(not(feature = "toml"))]
        ConfigFormat::Toml => Err(ConfigError::UnsupportedFormat(
            "TOML support is not enabled".to_string(),
        )),
        #[cfg(feature = "yaml")]
        ConfigFormat::Yaml => serde_yaml::from_str(content).map_err(|e| parse_error(e.to_string())),
        #[cfg(not(feature = "yaml"))]
        ConfigFormat::Yaml => Err(ConfigError::UnsupportedFormat(
            "YAML support is not enabled".to_string(),
        )),
    }
}

/// Check if a string is an env reference: {env:VAR}
fn is_env_reference(s: &str) -> bool {
    s.starts_with(ENV_REF_PREFIX) && s.ends_with(ENV_REF_SUFFIX) && s.len() > ENV_REF_PREFIX.len()
}

/// Extract the variable name from an env reference
fn extract_env_var(s: &str) -> Option<&str> {
    if is_env_reference(s) {
        Some(&s[ENV_REF_PREFIX.len()..s.len() - ENV_REF_SUFFIX.len()])
    } else {
        None
    }
}

/// Numbers and booleans keep their type; everything else stays a string.
fn env_value(raw: String) -> Value {
    match serde_json::from_str::<Value>(raw.trim()) {
        Ok(parsed @ (Value::Number(_) | Value::Bool(_))) => parsed,
        _ => Value::String(raw),
    }
}

/// Replace every `{env:VAR}` string in the tree, reporting the first
/// missing variable.
fn process_env_refs(value: &mut Value) -> Result<(), ConfigError> {
    let mut missing = Vec::new();
    process_env_refs_recursive(value, &mut missing);
    match missing.into_iter().next() {
        Some(var_name) => Err(ConfigError::EnvVarNotFound { var_name }),
        None => Ok(()),
    }
}

fn process_env_refs_recursive(value: &mut Value, missing: &mut Vec<String>) {
    match value {
        Value::String(s) => {
            if let Some(var_name) = extract_env_var(s) {
                debug!("Processing env reference: {}", var_name);
                match std::env::var(var_name) {
                    Ok(env) => *value = env_value(env),
                    Err(_) => {
                        warn!("Environment variable not found: {}", var_name);
                        missing.push(var_name.to_string());
                    }
                }
            }
        }
        Value::Array(items) => {
            for item in items.iter_mut() {
                process_env_refs_recursive(item, missing);
            }
        }
        Value::Object(map) => {
            for (_key, val) in map.iter_mut() {
                process_env_refs_recursive(val, missing);
            }
        }
        _ => {}
    }
}

//! Configuration types

use serde::{Deserialize, Serialize};
use trellis_lookup::EvalLimits;
use trellis_references::ExtractionLimits;

use crate::loader::ConfigError;

/// Smallest accepted `debug_string_limit`; shorter limits leave nothing
/// readable once the head and tail are kept.
pub const MIN_DEBUG_STRING_LIMIT: usize = 10;

/// Top-level configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrellisConfig {
    /// Lookup evaluation settings
    pub lookup: LookupConfig,
    /// Reference extraction settings
    pub references: ReferenceConfig,
    /// Logging settings
    pub logging: LoggingConfig,
}

/// Lookup evaluation settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LookupConfig {
    /// Page size used when a lazy result is made concrete
    pub default_page_size: u64,
    /// Maximum number of hops for ancestor and descendant traversal
    pub max_traversal_depth: u32,
    /// Maximum depth of nested entry scopes
    pub max_nesting_depth: u32,
    /// Length at which expressions are shortened in error messages
    pub debug_string_limit: usize,
}

impl Default for LookupConfig {
    fn default() -> Self {
        let limits = EvalLimits::default();
        Self {
            default_page_size: trellis_lookup::DEFAULT_PAGE_SIZE,
            max_traversal_depth: limits.max_traversal_depth,
            max_nesting_depth: limits.max_nesting_depth,
            debug_string_limit: limits.debug_string_limit,
        }
    }
}

impl LookupConfig {
    pub fn eval_limits(&self) -> EvalLimits {
        EvalLimits {
            max_traversal_depth: self.max_traversal_depth,
            max_nesting_depth: self.max_nesting_depth,
            debug_string_limit: self.debug_string_limit,
        }
    }
}

/// Reference extraction settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReferenceConfig {
    /// Page size for embedded lookup results
    pub lookup_page_size: u64,
    /// Maximum number of extraction rounds
    pub max_rounds: u32,
}

impl Default for ReferenceConfig {
    fn default() -> Self {
        let limits = ExtractionLimits::default();
        Self {
            lookup_page_size: limits.lookup_page_size,
            max_rounds: limits.max_rounds,
        }
    }
}

impl ReferenceConfig {
    pub fn extraction_limits(&self) -> ExtractionLimits {
        ExtractionLimits {
            lookup_page_size: self.lookup_page_size,
            max_rounds: self.max_rounds,
        }
    }
}

/// Logging settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default log level (`error`, `warn`, `info`, `debug`, `trace`)
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
        }
    }
}

const LOG_LEVELS: &[&str] = &["off", "error", "warn", "info", "debug", "trace"];

impl TrellisConfig {
    /// Checks value ranges the types alone cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.lookup.default_page_size == 0 {
            return Err(ConfigError::Invalid(
                "lookup.default_page_size must be greater than 0".to_string(),
            ));
        }
        if self.lookup.max_traversal_depth == 0 {
            return Err(ConfigError::Invalid(
                "lookup.max_traversal_depth must be at least 1".to_string(),
            ));
        }
        if self.lookup.debug_string_limit < MIN_DEBUG_STRING_LIMIT {
            return Err(ConfigError::Invalid(format!(
                "lookup.debug_string_limit must be at least {MIN_DEBUG_STRING_LIMIT}"
            )));
        }
        if self.references.lookup_page_size == 0 {
            return Err(ConfigError::Invalid(
                "references.lookup_page_size must be greater than 0".to_string(),
            ));
        }
        let level = self.logging.level.to_ascii_lowercase();
        if !LOG_LEVELS.contains(&level.as_str()) {
            return Err(ConfigError::Invalid(format!(
                "logging.level must be one of {}; got \"{}\"",
                LOG_LEVELS.join(", "),
                self.logging.level
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_engine_defaults() {
        let config = TrellisConfig::default();
        assert_eq!(config.lookup.eval_limits(), EvalLimits::default());
        assert_eq!(
            config.references.extraction_limits(),
            ExtractionLimits::default()
        );
        assert_eq!(config.lookup.default_page_size, 10);
        assert_eq!(config.logging.level, "warn");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn zero_page_size_is_rejected() {
        let mut config = TrellisConfig::default();
        config.lookup.default_page_size = 0;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn tiny_debug_string_limit_is_rejected() {
        let mut config = TrellisConfig::default();
        config.lookup.debug_string_limit = 4;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("debug_string_limit"));
    }

    #[test]
    fn unknown_log_levels_are_rejected() {
        let mut config = TrellisConfig::default();
        config.logging.level = "loud".to_string();
        assert!(config.validate().is_err());
        config.logging.level = "DEBUG".to_string();
        assert!(config.validate().is_ok());
    }
}

//! Configuration for Trellis
//!
//! Settings for lookup evaluation and reference extraction, loaded from
//! TOML, YAML or JSON with `{env:VAR}` substitution.
//!
//! ```toml
//! [lookup]
//! default_page_size = 10
//! max_traversal_depth = 50
//!
//! [references]
//! max_rounds = 32
//!
//! [logging]
//! level = "warn"
//! ```

pub mod config;
pub mod loader;

pub use config::{LoggingConfig, LookupConfig, ReferenceConfig, TrellisConfig};
pub use loader::{ConfigError, ConfigFormat, ConfigLoader};

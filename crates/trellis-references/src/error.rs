use thiserror::Error;
use trellis_lookup::LookupError;

/// Error raised while extracting references
#[derive(Error, Debug)]
pub enum ReferenceError {
    /// A value kind the walk does not know how to scan. Reported instead of
    /// skipping, so new kinds cannot leak unindexed references.
    #[error("Reference extraction does not yet support {kind} values")]
    UnsupportedValue { kind: String },

    #[error("Could not decode value JSON: {0}")]
    Decode(#[from] serde_json::Error),

    #[error(transparent)]
    Lookup(#[from] LookupError),
}

/// Result type for reference extraction
pub type ReferenceResult<T> = Result<T, ReferenceError>;

impl ReferenceError {
    pub fn unsupported(kind: impl Into<String>) -> Self {
        Self::UnsupportedValue { kind: kind.into() }
    }
}

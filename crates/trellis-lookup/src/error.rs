//! Lookup evaluation errors
//!
//! Everything that can go wrong while evaluating an expression against a
//! graph. Parse failures live in [`crate::syntax::ParseError`] so that callers
//! can tell "bad query" apart from "bad data".

use thiserror::Error;

use crate::backend::BackendError;
use crate::value::ValueKind;

/// Error raised while evaluating a lookup expression
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LookupError {
    /// A value of the wrong kind reached an operation that cannot cast it.
    #[error("{0}")]
    Type(String),

    /// A context-dependent construct was used outside its scope.
    #[error("{0}")]
    Scope(String),

    #[error("{0}")]
    NotIterable(String),

    #[error("{0}")]
    NotCountable(String),

    /// The expression is well-typed but the data makes it fail (unknown
    /// property, invalid date, unbound placeholder, ...).
    #[error("{0}")]
    Evaluation(String),

    /// Propagated unmodified from the graph backend.
    #[error(transparent)]
    Backend(#[from] BackendError),

    /// An internal invariant was violated. Never a user error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type for lookup evaluation
pub type LookupResult<T> = Result<T, LookupError>;

impl LookupError {
    pub fn type_error(message: impl Into<String>) -> Self {
        Self::Type(message.into())
    }

    pub fn scope(message: impl Into<String>) -> Self {
        Self::Scope(message.into())
    }

    pub fn evaluation(message: impl Into<String>) -> Self {
        Self::Evaluation(message.into())
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// `debug` could not be converted to `expected`.
    pub fn not_convertible(debug: &str, expected: ValueKind, actual: ValueKind) -> Self {
        Self::Type(format!(
            "The expression \"{debug}\" cannot be converted to {expected}; it is {actual}."
        ))
    }

    /// `debug` evaluated to a kind the named function does not accept.
    pub fn unsupported_operation(debug: &str, function: &str) -> Self {
        Self::Type(format!(
            "The expression \"{debug}\" cannot be used with {function}()."
        ))
    }

    pub fn not_iterable(debug: &str, function: &str) -> Self {
        Self::NotIterable(format!(
            "The expression \"{debug}\" is not iterable, so it cannot be used with {function}()."
        ))
    }

    pub fn not_countable(debug: &str, function: &str) -> Self {
        Self::NotCountable(format!(
            "The expression \"{debug}\" cannot be counted, so it cannot be used with {function}()."
        ))
    }

    /// Stable class name, used in serialized `Error` values.
    pub fn class(&self) -> &'static str {
        match self {
            Self::Type(_) => "LookupTypeError",
            Self::Scope(_) => "LookupScopeError",
            Self::NotIterable(_) => "LookupNotIterableError",
            Self::NotCountable(_) => "LookupNotCountableError",
            Self::Evaluation(_) => "LookupEvaluationError",
            Self::Backend(_) => "BackendError",
            Self::Internal(_) => "InternalError",
        }
    }

    /// True for errors caused by the expression or the data, as opposed to
    /// internal invariant violations.
    pub fn is_evaluation_error(&self) -> bool {
        !matches!(self, Self::Internal(_))
    }
}

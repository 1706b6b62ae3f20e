//! Error types for resolution, expression compilation and mapping

use thiserror::Error;

/// Result type for data operations
pub type DataResult<T> = Result<T, DataError>;

/// Errors raised while building or evaluating expressions and mappers
#[derive(Debug, Error)]
pub enum DataError {
    /// No resolver is able to handle the path
    #[error("unresolvable path '{path}': {reason}")]
    UnresolvablePath { path: String, reason: String },

    /// The path resolved to nothing in the supplied scope
    #[error("no value found for '{0}'")]
    NotFound(String),

    /// The path is syntactically invalid
    #[error("invalid path '{path}': {reason}")]
    InvalidPath { path: String, reason: String },

    /// A mapping template has an unsupported shape
    #[error("invalid mapping template: {0}")]
    InvalidTemplate(String),

    /// An expression failed to compile
    #[error("invalid expression '{expr}': {reason}")]
    InvalidExpression { expr: String, reason: String },

    /// A template expression failed during evaluation
    #[error("template evaluation failed: {0}")]
    Template(String),

    /// A value could not be converted to its declared type
    #[error("cannot coerce {value} to {data_type}")]
    Coercion { value: String, data_type: String },
}

impl DataError {
    pub(crate) fn invalid_path(path: &str, reason: impl Into<String>) -> Self {
        DataError::InvalidPath {
            path: path.to_string(),
            reason: reason.into(),
        }
    }

    pub(crate) fn unresolvable(path: &str, reason: impl Into<String>) -> Self {
        DataError::UnresolvablePath {
            path: path.to_string(),
            reason: reason.into(),
        }
    }
}

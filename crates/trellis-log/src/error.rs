//! Error types for logger construction

use thiserror::Error;

/// Result type for logging operations
pub type LogResult<T> = Result<T, LogError>;

/// Errors that can occur while configuring logging
#[derive(Debug, Error)]
pub enum LogError {
    /// Logger name is empty or contains characters not allowed in a name
    #[error("invalid logger name '{0}'")]
    InvalidName(String),

    /// Unknown log level name
    #[error("invalid log level '{0}'")]
    InvalidLevel(String),

    /// Global subscriber could not be installed
    #[error("failed to install log subscriber: {0}")]
    Init(String),
}

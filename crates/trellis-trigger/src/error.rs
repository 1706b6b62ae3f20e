//! Error types for handler construction and dispatch

use thiserror::Error;
use trellis_action::ActionError;
use trellis_core::ContextError;
use trellis_data::DataError;

/// Result type for trigger operations
pub type TriggerResult<T> = Result<T, TriggerError>;

/// Errors that stop a handler from being built or a dispatch from finishing
#[derive(Debug, Error)]
pub enum TriggerError {
    #[error("no actions specified")]
    NoActions,

    #[error("invalid handler configuration: {0}")]
    InvalidConfig(String),

    #[error("invalid mapping for {context}: {source}")]
    Mapping {
        context: String,
        #[source]
        source: DataError,
    },

    #[error("dispatch cancelled")]
    Cancelled,

    #[error("dispatch deadline exceeded")]
    DeadlineExceeded,
}

impl TriggerError {
    pub(crate) fn mapping(context: impl Into<String>, source: DataError) -> Self {
        TriggerError::Mapping {
            context: context.into(),
            source,
        }
    }
}

impl From<ContextError> for TriggerError {
    fn from(err: ContextError) -> Self {
        match err {
            ContextError::Cancelled => TriggerError::Cancelled,
            ContextError::DeadlineExceeded => TriggerError::DeadlineExceeded,
        }
    }
}

/// Failure of a single action within a dispatch
#[derive(Debug, Error)]
pub enum HandlerError {
    #[error("condition failed: {0}")]
    Condition(String),

    #[error("input mapping failed: {0}")]
    InputMapping(#[source] DataError),

    #[error("action {action} failed: {source}")]
    Action { action: String, source: ActionError },

    #[error("output mapping failed: {0}")]
    OutputMapping(#[source] DataError),
}

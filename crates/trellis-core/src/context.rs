//! Execution context for tracking causality, cancellation and deadlines

use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use ulid::Ulid;

/// Reason an execution context stopped accepting work
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ContextError {
    #[error("context cancelled")]
    Cancelled,

    #[error("context deadline exceeded")]
    DeadlineExceeded,
}

/// Context for tracking the origin of a unit of work
///
/// Every dispatch carries an `ExecutionContext` that identifies it and
/// links it to the context that caused it. Child contexts share the
/// cancellation of their parent and never outlive the parent's deadline.
#[derive(Debug, Clone)]
pub struct ExecutionContext {
    /// Unique identifier for this context (ULID)
    pub id: String,

    /// Parent context ID for tracking causality chains
    pub parent_id: Option<String>,

    /// When this context was created
    pub created_at: DateTime<Utc>,

    deadline: Option<Instant>,
    cancel: CancellationToken,
}

impl ExecutionContext {
    /// Create a new root context with a fresh ULID
    pub fn new() -> Self {
        Self::with_id(Ulid::new().to_string())
    }

    /// Create a new root context with a specific ID
    pub fn with_id(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            parent_id: None,
            created_at: Utc::now(),
            deadline: None,
            cancel: CancellationToken::new(),
        }
    }

    /// Set an absolute deadline
    ///
    /// A deadline later than the current one is ignored.
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(match self.deadline {
            Some(current) => current.min(deadline),
            None => deadline,
        });
        self
    }

    /// Set a deadline relative to now
    pub fn with_timeout(self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    /// Create a child context with this context as parent
    pub fn child(&self) -> Self {
        Self {
            id: Ulid::new().to_string(),
            parent_id: Some(self.id.clone()),
            created_at: Utc::now(),
            deadline: self.deadline,
            cancel: self.cancel.child_token(),
        }
    }

    /// Cancel this context and every child derived from it
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Time left before the deadline, `None` when there is no deadline
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|d| d.saturating_duration_since(Instant::now()))
    }

    /// Check whether work may continue under this context
    pub fn check(&self) -> Result<(), ContextError> {
        if self.cancel.is_cancelled() {
            return Err(ContextError::Cancelled);
        }
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => Err(ContextError::DeadlineExceeded),
            _ => Ok(()),
        }
    }

    /// Token that resolves when this context is cancelled
    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancel
    }
}

impl Default for ExecutionContext {
    fn default() -> Self {
        Self::new()
    }
}

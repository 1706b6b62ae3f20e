use std::sync::Arc;

use trellis_core::ExecutionContext;

use crate::config::HandlerConfig;

/// Per-dispatch context of a handler
///
/// Created for every inbound event. Holds a shared reference to the handler
/// configuration and a child of the caller's execution context, so
/// cancelling the caller cancels the dispatch.
#[derive(Debug, Clone)]
pub struct HandlerContext {
    execution: ExecutionContext,
    config: Arc<HandlerConfig>,
    qualified_name: String,
}

impl HandlerContext {
    pub fn new(parent: &ExecutionContext, config: Arc<HandlerConfig>) -> Self {
        let qualified_name = config.qualified_name();
        Self {
            execution: parent.child(),
            config,
            qualified_name,
        }
    }

    pub fn execution(&self) -> &ExecutionContext {
        &self.execution
    }

    pub fn config(&self) -> &Arc<HandlerConfig> {
        &self.config
    }

    /// `<trigger id>.<handler name>`, for diagnostics only
    pub fn qualified_name(&self) -> &str {
        &self.qualified_name
    }

    /// Cancel the remaining actions of this dispatch
    pub fn cancel(&self) {
        self.execution.cancel();
    }
}

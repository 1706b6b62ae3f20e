//! The contract every action implements

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use trellis_core::ExecutionContext;
use trellis_data::IOMetadata;

/// Error returned by an action run
///
/// Opaque to the engine: handlers surface it to the caller unchanged.
pub type ActionError = Box<dyn std::error::Error + Send + Sync>;

/// Result of an action run
pub type ActionResult = Result<Map<String, Value>, ActionError>;

/// Descriptive metadata of an action
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ActionMetadata {
    /// Reference the action is registered under
    #[serde(rename = "ref")]
    pub reference: String,

    /// Static settings of the action
    #[serde(default)]
    pub settings: Map<String, Value>,
}

impl ActionMetadata {
    pub fn new(reference: impl Into<String>) -> Self {
        Self {
            reference: reference.into(),
            ..Default::default()
        }
    }

    pub fn with_settings(mut self, settings: Map<String, Value>) -> Self {
        self.settings = settings;
        self
    }
}

/// A unit of work invoked with mapped inputs
#[async_trait]
pub trait Action: Send + Sync {
    /// Metadata describing this action
    fn metadata(&self) -> &ActionMetadata;

    /// Declared inputs and outputs, if any
    fn io_metadata(&self) -> Option<&IOMetadata> {
        None
    }

    /// Run the action
    async fn run(&self, ctx: &ExecutionContext, inputs: Map<String, Value>) -> ActionResult;
}

//! Actions shipped with the engine

use async_trait::async_trait;
use serde_json::{Map, Value};
use tracing::trace;
use trellis_core::ExecutionContext;
use trellis_data::{Attribute, DataType, IOMetadata};
use trellis_log::{logger_from_ref, Field, Level, Logger};

use crate::action::{Action, ActionMetadata, ActionResult};

/// Reference of [`EchoAction`]
pub const ECHO_REF: &str = "#echo";

/// Reference of [`LogAction`]
pub const LOG_REF: &str = "#log";

/// Returns its inputs as outputs
#[derive(Debug, Clone)]
pub struct EchoAction {
    metadata: ActionMetadata,
}

impl EchoAction {
    pub fn new() -> Self {
        Self {
            metadata: ActionMetadata::new(ECHO_REF),
        }
    }
}

impl Default for EchoAction {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Action for EchoAction {
    fn metadata(&self) -> &ActionMetadata {
        &self.metadata
    }

    async fn run(&self, ctx: &ExecutionContext, inputs: Map<String, Value>) -> ActionResult {
        trace!(context_id = %ctx.id, fields = inputs.len(), "Echoing inputs");
        Ok(inputs)
    }
}

/// Writes a message to its logger
///
/// Inputs: `message` (string), `level` (optional, default `INFO`) and
/// `fields` (optional object of extra structured fields). Outputs the
/// message that was logged.
#[derive(Debug, Clone)]
pub struct LogAction {
    metadata: ActionMetadata,
    io: IOMetadata,
    logger: Logger,
}

impl LogAction {
    pub fn new(parent: &Logger) -> Self {
        Self {
            metadata: ActionMetadata::new(LOG_REF),
            io: IOMetadata {
                input: vec![
                    Attribute::new("message", DataType::String),
                    Attribute::new("level", DataType::String),
                    Attribute::new("fields", DataType::Object),
                ],
                output: vec![Attribute::new("message", DataType::String)],
            },
            logger: logger_from_ref(parent, "action", LOG_REF),
        }
    }

    pub fn logger(&self) -> &Logger {
        &self.logger
    }
}

#[async_trait]
impl Action for LogAction {
    fn metadata(&self) -> &ActionMetadata {
        &self.metadata
    }

    fn io_metadata(&self) -> Option<&IOMetadata> {
        Some(&self.io)
    }

    async fn run(&self, ctx: &ExecutionContext, inputs: Map<String, Value>) -> ActionResult {
        let message = match inputs.get("message") {
            Some(Value::String(s)) => s.clone(),
            Some(Value::Null) | None => String::new(),
            Some(other) => other.to_string(),
        };
        let level = inputs
            .get("level")
            .and_then(Value::as_str)
            .map(Level::parse_or_default)
            .unwrap_or_default();

        let mut fields = vec![Field::string("context_id", ctx.id.clone())];
        if let Some(Value::Object(extra)) = inputs.get("fields") {
            fields.extend(extra.iter().map(|(k, v)| Field::new(k.clone(), v.clone())));
        }

        let structured = self.logger.structured();
        match level {
            Level::Trace | Level::Debug => structured.debug(&message, &fields),
            Level::Info => structured.info(&message, &fields),
            Level::Warn => structured.warn(&message, &fields),
            Level::Error => structured.error(&message, &fields),
        }

        let mut outputs = Map::new();
        outputs.insert("message".to_string(), Value::String(message));
        Ok(outputs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_echo_returns_inputs() {
        let action = EchoAction::new();
        let mut inputs = Map::new();
        inputs.insert("anInput".into(), json!("input"));

        let out = action.run(&ExecutionContext::new(), inputs.clone()).await.unwrap();
        assert_eq!(out, inputs);
        assert_eq!(action.metadata().reference, ECHO_REF);
        assert!(action.io_metadata().is_none());
    }

    #[tokio::test]
    async fn test_log_action() {
        let root = Logger::root("trellis", Level::Info);
        let action = LogAction::new(&root);
        assert_eq!(action.logger().name(), "trellis.action.#log");

        let mut inputs = Map::new();
        inputs.insert("message".into(), json!("order received"));
        inputs.insert("level".into(), json!("warn"));
        inputs.insert("fields".into(), json!({"order": 7}));

        let out = action.run(&ExecutionContext::new(), inputs).await.unwrap();
        assert_eq!(out.get("message"), Some(&json!("order received")));
    }

    #[tokio::test]
    async fn test_log_action_non_string_message() {
        let action = LogAction::new(&Logger::root("trellis", Level::Error));
        let mut inputs = Map::new();
        inputs.insert("message".into(), json!({"a": 1}));

        let out = action.run(&ExecutionContext::new(), inputs).await.unwrap();
        assert_eq!(out.get("message"), Some(&json!(r#"{"a":1}"#)));
    }
}

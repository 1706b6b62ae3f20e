//! An application with every handler built and ready to dispatch

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tracing::{debug, info};
use trellis_action::ActionRegistry;
use trellis_config::AppConfig;
use trellis_core::ExecutionContext;
use trellis_data::{
    CompositeResolver, ExpressionFactory, MapperFactory, PropertyResolver, Resolver, PROPERTY_TOKEN,
};
use trellis_log::{child_logger, Logger};
use trellis_trigger::{
    ActionOutcome, Handler, HandlerContext, TriggerConfig, TriggerError, TriggerResult,
};

/// The running application
pub struct Engine {
    name: String,
    triggers: Vec<Arc<TriggerConfig>>,
    /// Handlers keyed by qualified name (`<trigger>.<handler>`)
    handlers: HashMap<String, Arc<Handler>>,
    logger: Logger,
}

impl Engine {
    /// Build every handler of `app` against the actions in `registry`
    pub fn new(app: &AppConfig, registry: &ActionRegistry, logger: &Logger) -> TriggerResult<Self> {
        let logger = child_logger(logger, "engine");
        let resolver: Arc<dyn Resolver> = Arc::new(
            CompositeResolver::standard()
                .with(PROPERTY_TOKEN, PropertyResolver::new(app.properties.clone())),
        );
        let exprs = ExpressionFactory::new(resolver);
        let mappers = MapperFactory::from_expression_factory(exprs.clone());

        let triggers = app.trigger_configs();
        let mut handlers = HashMap::new();
        for trigger in &triggers {
            for config in &trigger.handlers {
                let name = config.qualified_name();
                if handlers.contains_key(&name) {
                    return Err(TriggerError::InvalidConfig(format!(
                        "duplicate handler '{}'",
                        name
                    )));
                }
                let handler =
                    Handler::from_registry(config.clone(), registry, &mappers, &exprs, None, &logger)?;
                debug!(handler = %name, "Built handler");
                handlers.insert(name, Arc::new(handler));
            }
        }

        info!(app = %app.name, handlers = handlers.len(), "Engine ready");
        Ok(Self {
            name: app.name.clone(),
            triggers,
            handlers,
            logger,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn triggers(&self) -> &[Arc<TriggerConfig>] {
        &self.triggers
    }

    /// Qualified names of all handlers, sorted
    pub fn handler_names(&self) -> Vec<&str> {
        let mut names: Vec<_> = self.handlers.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn handler(&self, qualified_name: &str) -> Option<&Arc<Handler>> {
        self.handlers.get(qualified_name)
    }

    /// Dispatch `event` to one handler
    pub async fn dispatch(
        &self,
        handler: &Handler,
        event: Value,
        timeout: Option<Duration>,
    ) -> TriggerResult<Vec<ActionOutcome>> {
        let mut root = ExecutionContext::new();
        if let Some(timeout) = timeout {
            root = root.with_timeout(timeout);
        }
        let ctx = HandlerContext::new(&root, handler.config().clone());
        self.logger.debug_fmt(format_args!(
            "Dispatching to {} (context {})",
            ctx.qualified_name(),
            ctx.execution().id
        ));
        handler.handle(&ctx, event).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use trellis_log::Level;

    const APP: &str = r##"
name: demo
properties:
  greeting: hello
triggers:
  - id: webhook
    handlers:
      - name: greet
        actions:
          - ref: "#echo"
            input:
              text: "=$property[greeting]"
              who: "=$.name"
"##;

    fn app() -> AppConfig {
        app_from(APP)
    }

    fn app_from(yaml: &str) -> AppConfig {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("app.yaml");
        std::fs::write(&path, yaml).unwrap();
        AppConfig::load(&path).unwrap()
    }

    fn logger() -> Logger {
        Logger::root("trellis", Level::Info)
    }

    #[tokio::test]
    async fn test_engine_dispatch() {
        let logger = logger();
        let registry = ActionRegistry::with_builtins(&logger);
        let engine = Engine::new(&app(), &registry, &logger).unwrap();

        assert_eq!(engine.name(), "demo");
        assert_eq!(engine.handler_names(), ["webhook.greet"]);

        let handler = engine.handler("webhook.greet").unwrap();
        let outcomes = engine
            .dispatch(handler, json!({"name": "ada"}), None)
            .await
            .unwrap();

        let output = outcomes[0].output().unwrap();
        assert_eq!(output.get("text"), Some(&json!("hello")));
        assert_eq!(output.get("who"), Some(&json!("ada")));
    }

    #[test]
    fn test_unknown_action_ref() {
        let logger = logger();
        let registry = ActionRegistry::new();
        assert!(Engine::new(&app(), &registry, &logger).is_err());
    }

    #[test]
    fn test_duplicate_handler_name() {
        let yaml = r##"
name: dup
triggers:
  - id: webhook
    handlers:
      - name: greet
        actions:
          - ref: "#log"
  - id: webhook
    handlers:
      - name: greet
        actions:
          - ref: "#log"
"##;
        let logger = logger();
        let registry = ActionRegistry::with_builtins(&logger);
        match Engine::new(&app_from(yaml), &registry, &logger) {
            Err(TriggerError::InvalidConfig(msg)) => assert!(msg.contains("webhook.greet")),
            Err(e) => panic!("unexpected error: {}", e),
            Ok(_) => panic!("duplicate handler accepted"),
        }
    }
}

//! Handler construction and dispatch

use std::fmt;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Map, Value};
use trellis_action::{Action, ActionMetadata, ActionRegistry, ActionResult, EchoAction};
use trellis_core::ExecutionContext;
use trellis_data::{
    Attribute, CompositeResolver, DataType, ExpressionFactory, IOMetadata, MapperFactory,
    Resolver, ScopeResolver, SCOPE_TOKEN,
};
use trellis_log::{Level, Logger};
use trellis_trigger::{
    ActionConfig, ActionOutcome, Handler, HandlerConfig, HandlerContext, HandlerError,
    HandlerHooks, TriggerConfig, TriggerDef, TriggerError,
};

// ============================================================================
// Fixtures
// ============================================================================

fn factories() -> (MapperFactory, ExpressionFactory) {
    let resolver: Arc<dyn Resolver> =
        Arc::new(CompositeResolver::builder().with(SCOPE_TOKEN, ScopeResolver));
    (
        MapperFactory::new(resolver.clone()),
        ExpressionFactory::new(resolver),
    )
}

fn logger() -> Logger {
    Logger::root("trellis", Level::Debug)
}

fn map(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => unreachable!(),
    }
}

fn sample_config() -> HandlerConfig {
    HandlerConfig::new("sampleConfig")
        .with_settings(map(json!({"aSetting": "aSetting"})))
        .with_action(ActionConfig {
            input: map(json!({"anInput": "input"})),
            output: map(json!({"anOutput": "output"})),
            ..Default::default()
        })
}

/// Echoes its inputs
struct MockAction {
    metadata: ActionMetadata,
}

impl MockAction {
    fn new() -> Arc<dyn Action> {
        Arc::new(Self {
            metadata: ActionMetadata::new("mock"),
        })
    }
}

#[async_trait]
impl Action for MockAction {
    fn metadata(&self) -> &ActionMetadata {
        &self.metadata
    }

    async fn run(&self, _ctx: &ExecutionContext, inputs: Map<String, Value>) -> ActionResult {
        Ok(inputs)
    }
}

#[derive(Debug)]
struct Rejected(&'static str);

impl fmt::Display for Rejected {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "rejected: {}", self.0)
    }
}

impl std::error::Error for Rejected {}

/// Always fails with [`Rejected`]
struct FailingAction {
    metadata: ActionMetadata,
}

#[async_trait]
impl Action for FailingAction {
    fn metadata(&self) -> &ActionMetadata {
        &self.metadata
    }

    async fn run(&self, _ctx: &ExecutionContext, _inputs: Map<String, Value>) -> ActionResult {
        Err(Box::new(Rejected("quota")))
    }
}

/// Cancels the context it runs under
struct CancellingAction {
    metadata: ActionMetadata,
}

#[async_trait]
impl Action for CancellingAction {
    fn metadata(&self) -> &ActionMetadata {
        &self.metadata
    }

    async fn run(&self, ctx: &ExecutionContext, inputs: Map<String, Value>) -> ActionResult {
        ctx.cancel();
        Ok(inputs)
    }
}

/// Declares typed inputs and outputs
struct TypedAction {
    metadata: ActionMetadata,
    io: IOMetadata,
}

#[async_trait]
impl Action for TypedAction {
    fn metadata(&self) -> &ActionMetadata {
        &self.metadata
    }

    fn io_metadata(&self) -> Option<&IOMetadata> {
        Some(&self.io)
    }

    async fn run(&self, _ctx: &ExecutionContext, inputs: Map<String, Value>) -> ActionResult {
        let count = inputs.get("count").and_then(Value::as_i64).unwrap_or(0);
        Ok(map(json!({"doubled": (count * 2).to_string(), "seen": inputs.len()})))
    }
}

#[derive(Default)]
struct RecordingHooks {
    events: Mutex<Vec<String>>,
}

impl HandlerHooks for RecordingHooks {
    fn on_dispatch(&self, ctx: &HandlerContext, _event: &Value) {
        self.events
            .lock()
            .unwrap()
            .push(format!("dispatch {}", ctx.qualified_name()));
    }

    fn before_action(&self, _ctx: &HandlerContext, index: usize, _inputs: &Map<String, Value>) {
        self.events.lock().unwrap().push(format!("before {}", index));
    }

    fn after_action(&self, _ctx: &HandlerContext, index: usize, outcome: &ActionOutcome) {
        let label = if outcome.is_skipped() { "skipped" } else { "done" };
        self.events
            .lock()
            .unwrap()
            .push(format!("after {} {}", index, label));
    }
}

// ============================================================================
// Construction
// ============================================================================

#[test]
fn test_new_handler_without_actions() {
    let (mf, ef) = factories();
    let config = Arc::new(sample_config());

    let result = Handler::new(config, Vec::new(), &mf, &ef, None, &logger());
    assert!(matches!(result, Err(TriggerError::NoActions)));
    assert_eq!(TriggerError::NoActions.to_string(), "no actions specified");
}

#[test]
fn test_new_handler_settings_unchanged() {
    let (mf, ef) = factories();
    let config = Arc::new(sample_config());

    let handler = Handler::new(config, vec![MockAction::new()], &mf, &ef, None, &logger()).unwrap();
    assert_eq!(handler.name(), "sampleConfig");
    assert_eq!(handler.settings(), &map(json!({"aSetting": "aSetting"})));
}

#[test]
fn test_unresolvable_prefix_fails_construction() {
    let (mf, ef) = factories();
    let config = Arc::new(HandlerConfig::new("h").with_action(ActionConfig {
        input: map(json!({"home": "=$env[HOME]"})),
        ..Default::default()
    }));

    let result = Handler::new(config, vec![MockAction::new()], &mf, &ef, None, &logger());
    assert!(matches!(result, Err(TriggerError::Mapping { .. })));
}

#[test]
fn test_handler_context() {
    let trigger = TriggerConfig::new("sampleTrig");
    let config = Arc::new(sample_config().with_parent(&trigger));

    let ctx = HandlerContext::new(&ExecutionContext::new(), config);
    assert_eq!(ctx.qualified_name(), "sampleTrig.sampleConfig");
    assert_eq!(ctx.config().name, "sampleConfig");
}

// ============================================================================
// Dispatch
// ============================================================================

#[tokio::test]
async fn test_sample_config_dispatch() {
    let (mf, ef) = factories();
    let config = Arc::new(sample_config());
    let handler =
        Handler::new(config.clone(), vec![MockAction::new()], &mf, &ef, None, &logger()).unwrap();

    let ctx = HandlerContext::new(&ExecutionContext::new(), config);
    let outcomes = handler.handle(&ctx, json!({"anInput": "input"})).await.unwrap();

    assert_eq!(outcomes.len(), 1);
    let output = outcomes[0].output().unwrap();
    assert_eq!(output.get("anOutput"), Some(&json!("output")));
}

#[tokio::test]
async fn test_actions_run_in_order_and_isolated() {
    let (mf, ef) = factories();
    let trigger = TriggerConfig::from_def(TriggerDef {
        id: "orders".into(),
        handlers: vec![HandlerConfig::new("created")
            .with_action(ActionConfig {
                input: map(json!({"step": 1, "id": "=$.id"})),
                output: map(json!({"first": "=$.id"})),
                ..Default::default()
            })
            .with_action(ActionConfig {
                input: map(json!({"step": 2, "total": "=$.total"})),
                ..Default::default()
            })],
        ..Default::default()
    });
    let config = trigger.handlers[0].clone();
    let handler = Handler::new(
        config.clone(),
        vec![MockAction::new(), Arc::new(EchoAction::new())],
        &mf,
        &ef,
        None,
        &logger(),
    )
    .unwrap();

    let ctx = HandlerContext::new(&ExecutionContext::new(), config);
    let outcomes = handler.handle(&ctx, json!({"id": "o-1", "total": 42})).await.unwrap();

    assert_eq!(outcomes[0].output(), Some(&map(json!({"first": "o-1"}))));
    assert_eq!(outcomes[1].output(), Some(&map(json!({"step": 2, "total": 42}))));
}

#[tokio::test]
async fn test_condition_skips_action() {
    let (mf, ef) = factories();
    let config = Arc::new(
        HandlerConfig::new("h")
            .with_action(ActionConfig {
                condition: Some("=$.total > 100".into()),
                ..Default::default()
            })
            .with_action(ActionConfig {
                condition: Some("total <= 100".into()),
                ..Default::default()
            }),
    );
    let handler = Handler::new(
        config.clone(),
        vec![MockAction::new(), MockAction::new()],
        &mf,
        &ef,
        None,
        &logger(),
    )
    .unwrap();

    let ctx = HandlerContext::new(&ExecutionContext::new(), config);
    let outcomes = handler.handle(&ctx, json!({"total": 5})).await.unwrap();
    assert!(outcomes[0].is_skipped());
    assert_eq!(outcomes[1].output(), Some(&map(json!({"total": 5}))));

    let outcomes = handler.handle(&ctx, json!({"total": 500})).await.unwrap();
    assert_eq!(outcomes[0].output(), Some(&map(json!({"total": 500}))));
    assert!(outcomes[1].is_skipped());
}

#[tokio::test]
async fn test_documented_trigger_config() {
    let (mf, ef) = factories();
    let logger = logger();
    let registry = ActionRegistry::with_builtins(&logger);

    let def: TriggerDef = serde_json::from_value(json!({
        "id": "orders",
        "handlers": [{
            "name": "created",
            "settings": {"topic": "orders.created"},
            "actions": [
                {
                    "ref": "#log",
                    "if": "=$.total > 100",
                    "input": {"message": "Large order {{ id }}"}
                },
                {
                    "ref": "#echo",
                    "input": {"id": "=$.id"},
                    "output": {"accepted": "=$.id"}
                }
            ]
        }]
    }))
    .unwrap();
    let trigger = TriggerConfig::from_def(def);
    let config = trigger.handlers[0].clone();
    let handler = Handler::from_registry(config.clone(), &registry, &mf, &ef, None, &logger).unwrap();

    let ctx = HandlerContext::new(&ExecutionContext::new(), config);
    let outcomes = handler
        .handle(&ctx, json!({"id": "o-7", "total": 250}))
        .await
        .unwrap();
    assert_eq!(
        outcomes[0].output(),
        Some(&map(json!({"message": "Large order o-7"})))
    );
    assert_eq!(outcomes[1].output(), Some(&map(json!({"accepted": "o-7"}))));

    let outcomes = handler
        .handle(&ctx, json!({"id": "o-8", "total": 20}))
        .await
        .unwrap();
    assert!(outcomes[0].is_skipped());
    assert_eq!(outcomes[1].output(), Some(&map(json!({"accepted": "o-8"}))));
}

#[tokio::test]
async fn test_action_error_is_surfaced_unchanged() {
    let (mf, ef) = factories();
    let config = Arc::new(
        HandlerConfig::new("h")
            .with_action(ActionConfig::default())
            .with_action(ActionConfig::default()),
    );
    let failing: Arc<dyn Action> = Arc::new(FailingAction {
        metadata: ActionMetadata::new("failing"),
    });
    let handler = Handler::new(
        config.clone(),
        vec![failing, MockAction::new()],
        &mf,
        &ef,
        None,
        &logger(),
    )
    .unwrap();

    let ctx = HandlerContext::new(&ExecutionContext::new(), config);
    let outcomes = handler.handle(&ctx, json!({"a": 1})).await.unwrap();

    match outcomes[0].error() {
        Some(HandlerError::Action { action, source }) => {
            assert_eq!(action, "failing");
            let rejected = source.downcast_ref::<Rejected>().unwrap();
            assert_eq!(rejected.0, "quota");
        }
        other => panic!("Expected action error, got {:?}", other),
    }
    assert!(outcomes[1].is_completed());
}

#[tokio::test]
async fn test_input_mapping_failure_is_per_action() {
    let (mf, ef) = factories();
    let config = Arc::new(
        HandlerConfig::new("h")
            .with_action(ActionConfig {
                input: map(json!({"x": "=$.missing"})),
                ..Default::default()
            })
            .with_action(ActionConfig::default()),
    );
    let handler = Handler::new(
        config.clone(),
        vec![MockAction::new(), MockAction::new()],
        &mf,
        &ef,
        None,
        &logger(),
    )
    .unwrap();

    let ctx = HandlerContext::new(&ExecutionContext::new(), config);
    let outcomes = handler.handle(&ctx, json!({"a": 1})).await.unwrap();
    assert!(matches!(outcomes[0].error(), Some(HandlerError::InputMapping(_))));
    assert!(outcomes[1].is_completed());
}

#[tokio::test]
async fn test_cancellation_aborts_remaining_actions() {
    let (mf, ef) = factories();
    let config = Arc::new(
        HandlerConfig::new("h")
            .with_action(ActionConfig::default())
            .with_action(ActionConfig::default()),
    );
    let cancelling: Arc<dyn Action> = Arc::new(CancellingAction {
        metadata: ActionMetadata::new("cancel"),
    });
    let hooks = Arc::new(RecordingHooks::default());
    let handler = Handler::new(
        config.clone(),
        vec![cancelling, MockAction::new()],
        &mf,
        &ef,
        Some(hooks.clone()),
        &logger(),
    )
    .unwrap();

    let parent = ExecutionContext::new();
    let ctx = HandlerContext::new(&parent, config);
    let result = handler.handle(&ctx, json!({})).await;

    assert!(matches!(result, Err(TriggerError::Cancelled)));
    assert!(!parent.is_cancelled());
    assert_eq!(
        *hooks.events.lock().unwrap(),
        ["dispatch h", "before 0", "after 0 done"]
    );
}

#[tokio::test]
async fn test_expired_deadline() {
    let (mf, ef) = factories();
    let config = Arc::new(sample_config());
    let handler =
        Handler::new(config.clone(), vec![MockAction::new()], &mf, &ef, None, &logger()).unwrap();

    let parent = ExecutionContext::new().with_timeout(Duration::ZERO);
    let ctx = HandlerContext::new(&parent, config);

    let result = handler.handle(&ctx, json!({"anInput": "input"})).await;
    assert!(matches!(result, Err(TriggerError::DeadlineExceeded)));
}

#[tokio::test]
async fn test_hooks_see_every_action() {
    let (mf, ef) = factories();
    let trigger = TriggerConfig::new("rest");
    let config = Arc::new(
        HandlerConfig::new("h")
            .with_action(ActionConfig {
                condition: Some("false".into()),
                ..Default::default()
            })
            .with_action(ActionConfig::default())
            .with_parent(&trigger),
    );
    let hooks = Arc::new(RecordingHooks::default());
    let handler = Handler::new(
        config.clone(),
        vec![MockAction::new(), MockAction::new()],
        &mf,
        &ef,
        Some(hooks.clone()),
        &logger(),
    )
    .unwrap();

    let ctx = HandlerContext::new(&ExecutionContext::new(), config);
    handler.handle(&ctx, json!({})).await.unwrap();

    assert_eq!(
        *hooks.events.lock().unwrap(),
        ["dispatch rest.h", "after 0 skipped", "before 1", "after 1 done"]
    );
}

#[tokio::test]
async fn test_io_metadata_filters_and_coerces() {
    let (mf, ef) = factories();
    let typed: Arc<dyn Action> = Arc::new(TypedAction {
        metadata: ActionMetadata::new("typed"),
        io: IOMetadata {
            input: vec![Attribute::new("count", DataType::Integer)],
            output: vec![Attribute::new("doubled", DataType::Integer)],
        },
    });
    let config = Arc::new(HandlerConfig::new("h").with_action(ActionConfig::default()));
    let handler = Handler::new(config.clone(), vec![typed], &mf, &ef, None, &logger()).unwrap();

    let ctx = HandlerContext::new(&ExecutionContext::new(), config);
    let outcomes = handler
        .handle(&ctx, json!({"count": "21", "ignored": true}))
        .await
        .unwrap();

    assert_eq!(outcomes[0].output(), Some(&map(json!({"doubled": 42, "seen": 1}))));
}

#[tokio::test]
async fn test_concurrent_dispatches() {
    let (mf, ef) = factories();
    let config = Arc::new(HandlerConfig::new("h").with_action(ActionConfig {
        input: map(json!({"n": "=$.n"})),
        ..Default::default()
    }));
    let handler = Arc::new(
        Handler::new(config.clone(), vec![MockAction::new()], &mf, &ef, None, &logger()).unwrap(),
    );

    let tasks: Vec<_> = (0..8)
        .map(|n| {
            let handler = handler.clone();
            let config = config.clone();
            tokio::spawn(async move {
                let ctx = HandlerContext::new(&ExecutionContext::new(), config);
                handler.handle(&ctx, json!({"n": n})).await
            })
        })
        .collect();

    for (n, task) in tasks.into_iter().enumerate() {
        let outcomes = task.await.unwrap().unwrap();
        assert_eq!(outcomes[0].output(), Some(&map(json!({"n": n}))));
    }
}

//! Handler dispatch
//!
//! A [`Handler`] is built once from a [`HandlerConfig`] and the actions it
//! invokes. Every dispatch runs the actions sequentially in declared order:
//!
//! 1. check the context for cancellation and deadline
//! 2. evaluate the condition, if any; `false` skips the action
//! 3. map the event into the action's inputs
//! 4. run the action
//! 5. map the action's outputs, if an output template is configured

use std::sync::Arc;

use serde_json::{Map, Value};
use tracing::debug;
use trellis_action::{Action, ActionRegistry};
use trellis_data::{Expr, ExpressionFactory, Mapper, MapperFactory, Scope, SimpleScope};
use trellis_log::{child_with_fields, Field, Logger};

use crate::config::HandlerConfig;
use crate::context::HandlerContext;
use crate::error::{HandlerError, TriggerError, TriggerResult};
use crate::hooks::HandlerHooks;

/// Result of one action within a dispatch
#[derive(Debug)]
pub enum ActionOutcome {
    /// The action ran; holds the mapped (or raw) outputs
    Completed(Map<String, Value>),
    /// The condition evaluated to `false`
    Skipped,
    /// Condition, mapping or action failure
    Failed(HandlerError),
}

impl ActionOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, ActionOutcome::Completed(_))
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self, ActionOutcome::Skipped)
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, ActionOutcome::Failed(_))
    }

    pub fn output(&self) -> Option<&Map<String, Value>> {
        match self {
            ActionOutcome::Completed(output) => Some(output),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&HandlerError> {
        match self {
            ActionOutcome::Failed(err) => Some(err),
            _ => None,
        }
    }

    fn label(&self) -> &'static str {
        match self {
            ActionOutcome::Completed(_) => "completed",
            ActionOutcome::Skipped => "skipped",
            ActionOutcome::Failed(_) => "failed",
        }
    }
}

/// An action together with its compiled condition and mappers
struct BoundAction {
    action: Arc<dyn Action>,
    reference: String,
    condition: Option<Expr>,
    input: Option<Mapper>,
    output: Option<Mapper>,
}

/// Runtime binding of a handler configuration to its actions
pub struct Handler {
    config: Arc<HandlerConfig>,
    actions: Vec<BoundAction>,
    hooks: Option<Arc<dyn HandlerHooks>>,
    logger: Logger,
}

impl Handler {
    /// Build a handler
    ///
    /// `actions[i]` is bound to `config.actions[i]`. Conditions and mapping
    /// templates are compiled here; any error is fatal to construction.
    pub fn new(
        config: Arc<HandlerConfig>,
        actions: Vec<Arc<dyn Action>>,
        mappers: &MapperFactory,
        exprs: &ExpressionFactory,
        hooks: Option<Arc<dyn HandlerHooks>>,
        logger: &Logger,
    ) -> TriggerResult<Self> {
        if actions.is_empty() {
            return Err(TriggerError::NoActions);
        }
        if actions.len() != config.actions.len() {
            return Err(TriggerError::InvalidConfig(format!(
                "handler '{}' configures {} actions but {} were supplied",
                config.name,
                config.actions.len(),
                actions.len()
            )));
        }

        let bound = config
            .actions
            .iter()
            .zip(actions)
            .enumerate()
            .map(|(index, (cfg, action))| {
                let reference = cfg
                    .reference
                    .clone()
                    .unwrap_or_else(|| action.metadata().reference.clone());

                let condition = cfg
                    .condition
                    .as_deref()
                    .map(|c| exprs.new_expr(c))
                    .transpose()
                    .map_err(|e| TriggerError::mapping(format!("action {} condition", index), e))?;
                let input = mappers
                    .new_mapper(&cfg.input)
                    .map_err(|e| TriggerError::mapping(format!("action {} input", index), e))?;
                let output = mappers
                    .new_mapper(&cfg.output)
                    .map_err(|e| TriggerError::mapping(format!("action {} output", index), e))?;

                Ok(BoundAction {
                    action,
                    reference,
                    condition,
                    input,
                    output,
                })
            })
            .collect::<TriggerResult<Vec<_>>>()?;

        let logger = child_with_fields(
            logger,
            "handler",
            [Field::string("handler", config.qualified_name())],
        );
        logger.debug_fmt(format_args!("Created handler with {} actions", bound.len()));

        Ok(Self {
            config,
            actions: bound,
            hooks,
            logger,
        })
    }

    /// Build a handler resolving each action by its configured reference
    pub fn from_registry(
        config: Arc<HandlerConfig>,
        registry: &ActionRegistry,
        mappers: &MapperFactory,
        exprs: &ExpressionFactory,
        hooks: Option<Arc<dyn HandlerHooks>>,
        logger: &Logger,
    ) -> TriggerResult<Self> {
        let actions = config
            .actions
            .iter()
            .enumerate()
            .map(|(index, cfg)| {
                let reference = cfg.reference.as_deref().ok_or_else(|| {
                    TriggerError::InvalidConfig(format!("action {} has no ref", index))
                })?;
                registry
                    .get(reference)
                    .map_err(|e| TriggerError::InvalidConfig(e.to_string()))
            })
            .collect::<TriggerResult<Vec<_>>>()?;

        Self::new(config, actions, mappers, exprs, hooks, logger)
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    /// Configured settings, unchanged
    pub fn settings(&self) -> &Map<String, Value> {
        &self.config.settings
    }

    pub fn config(&self) -> &Arc<HandlerConfig> {
        &self.config
    }

    /// Dispatch an event to every action
    ///
    /// Returns one outcome per action in declared order. Failures of
    /// individual actions are reported in their outcome; only cancellation
    /// or an exceeded deadline aborts the dispatch.
    pub async fn handle(
        &self,
        ctx: &HandlerContext,
        event: Value,
    ) -> TriggerResult<Vec<ActionOutcome>> {
        if let Some(hooks) = &self.hooks {
            hooks.on_dispatch(ctx, &event);
        }
        debug!(
            handler = %ctx.qualified_name(),
            context_id = %ctx.execution().id,
            actions = self.actions.len(),
            "Dispatching event"
        );

        let mut outcomes = Vec::with_capacity(self.actions.len());
        for (index, bound) in self.actions.iter().enumerate() {
            if let Err(e) = ctx.execution().check() {
                self.logger.warn_fmt(format_args!(
                    "Aborting dispatch before action {} ({}): {}",
                    index, bound.reference, e
                ));
                return Err(e.into());
            }

            let outcome = self.run_action(ctx, index, bound, &event).await;

            match &outcome {
                ActionOutcome::Failed(err) => self.logger.structured().warn(
                    "Action failed",
                    &[
                        Field::string("action", bound.reference.clone()),
                        Field::string("error", err.to_string()),
                    ],
                ),
                other => self.logger.structured().debug(
                    "Action finished",
                    &[
                        Field::string("action", bound.reference.clone()),
                        Field::string("outcome", other.label()),
                    ],
                ),
            }

            if let Some(hooks) = &self.hooks {
                hooks.after_action(ctx, index, &outcome);
            }
            outcomes.push(outcome);
        }

        Ok(outcomes)
    }

    async fn run_action(
        &self,
        ctx: &HandlerContext,
        index: usize,
        bound: &BoundAction,
        event: &Value,
    ) -> ActionOutcome {
        let scope = SimpleScope::from_value(event.clone());

        if let Some(condition) = &bound.condition {
            match condition.eval(&scope) {
                Ok(Value::Bool(true)) => {}
                Ok(Value::Bool(false)) => return ActionOutcome::Skipped,
                Ok(other) => {
                    return ActionOutcome::Failed(HandlerError::Condition(format!(
                        "expected a boolean, got {}",
                        other
                    )))
                }
                Err(e) => return ActionOutcome::Failed(HandlerError::Condition(e.to_string())),
            }
        }

        let io = bound.action.io_metadata();
        let inputs = match (&bound.input, io) {
            (Some(mapper), Some(io)) => mapper.apply_with(&scope, io),
            (Some(mapper), None) => mapper.apply(&scope),
            (None, Some(io)) => io.filter_inputs(&scope.variables()),
            (None, None) => Ok(scope.variables()),
        };
        let inputs = match inputs {
            Ok(inputs) => inputs,
            Err(e) => return ActionOutcome::Failed(HandlerError::InputMapping(e)),
        };

        if let Some(hooks) = &self.hooks {
            hooks.before_action(ctx, index, &inputs);
        }
        if self.logger.trace_enabled() {
            self.logger
                .trace_fmt(format_args!("Running {} with {} inputs", bound.reference, inputs.len()));
        }

        let results = match bound.action.run(ctx.execution(), inputs).await {
            Ok(results) => results,
            Err(source) => {
                return ActionOutcome::Failed(HandlerError::Action {
                    action: bound.reference.clone(),
                    source,
                })
            }
        };

        let results = match io {
            Some(io) => match io.coerce_outputs(results) {
                Ok(results) => results,
                Err(e) => return ActionOutcome::Failed(HandlerError::OutputMapping(e)),
            },
            None => results,
        };

        match &bound.output {
            Some(mapper) => match mapper.apply(&SimpleScope::from_map(results)) {
                Ok(output) => ActionOutcome::Completed(output),
                Err(e) => ActionOutcome::Failed(HandlerError::OutputMapping(e)),
            },
            None => ActionOutcome::Completed(results),
        }
    }
}

impl std::fmt::Debug for Handler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Handler")
            .field("name", &self.config.name)
            .field("actions", &self.actions.len())
            .field("hooks", &self.hooks.is_some())
            .finish()
    }
}

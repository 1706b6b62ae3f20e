use serde_json::{Map, Value};

use crate::context::HandlerContext;
use crate::handler::ActionOutcome;

/// Observer of handler dispatches
///
/// Every method defaults to a no-op. Hooks run inline on the dispatching
/// task and cannot alter the pipeline.
pub trait HandlerHooks: Send + Sync {
    /// An event is about to be dispatched
    fn on_dispatch(&self, _ctx: &HandlerContext, _event: &Value) {}

    /// Inputs are mapped and the action at `index` is about to run
    fn before_action(&self, _ctx: &HandlerContext, _index: usize, _inputs: &Map<String, Value>) {}

    /// The action at `index` finished, was skipped or failed
    fn after_action(&self, _ctx: &HandlerContext, _index: usize, _outcome: &ActionOutcome) {}
}

//! Triggers and handlers for Trellis
//!
//! A trigger decodes external events and hands each one to its handlers.
//! This crate holds the configuration tree and the dispatch pipeline; the
//! transport delivering events is out of its hands.
//!
//! # Configuration
//!
//! ```yaml
//! id: orders
//! handlers:
//!   - name: created
//!     settings:
//!       topic: orders.created
//!     actions:
//!       - ref: "#log"
//!         if: "=$.total > 100"
//!         input:
//!           message: "Large order {{ id }}"
//!       - ref: "#echo"
//!         input:
//!           id: "=$.id"
//!         output:
//!           accepted: "=$.id"
//! ```
//!
//! # Example
//!
//! ```ignore
//! let trigger = TriggerConfig::from_def(def);
//! let handler = Handler::from_registry(
//!     trigger.handlers[0].clone(), &registry, &mappers, &exprs, None, &logger,
//! )?;
//!
//! let ctx = HandlerContext::new(&ExecutionContext::new(), handler.config().clone());
//! for outcome in handler.handle(&ctx, event).await? {
//!     // Completed / Skipped / Failed
//! }
//! ```

mod config;
mod context;
mod error;
mod handler;
mod hooks;

pub use config::{ActionConfig, HandlerConfig, TriggerConfig, TriggerDef};
pub use context::HandlerContext;
pub use error::{HandlerError, TriggerError, TriggerResult};
pub use handler::{ActionOutcome, Handler};
pub use hooks::HandlerHooks;

//! Actions for Trellis
//!
//! An [`Action`] is the unit of work a handler invokes with mapped inputs.
//! Handlers depend only on the trait; concrete actions are looked up by
//! reference in an [`ActionRegistry`].
//!
//! # Built-in actions
//!
//! - `#echo` - returns its inputs unchanged
//! - `#log` - writes `message` at `level` to the engine log

mod action;
mod builtin;
mod registry;

pub use action::{Action, ActionError, ActionMetadata, ActionResult};
pub use builtin::{EchoAction, LogAction, ECHO_REF, LOG_REF};
pub use registry::{ActionRegistry, RegistryError};

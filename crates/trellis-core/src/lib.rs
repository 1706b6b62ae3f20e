//! Core types for Trellis
//!
//! This crate provides the types shared by every layer of the engine:
//! the [`ExecutionContext`] that correlates a unit of work with its cause
//! and carries cancellation and deadline semantics.

mod context;

pub use context::{ContextError, ExecutionContext};

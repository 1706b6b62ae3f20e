//! Registry of actions keyed by reference

use std::sync::Arc;

use dashmap::DashMap;
use thiserror::Error;
use tracing::{debug, warn};
use trellis_log::Logger;

use crate::action::Action;
use crate::builtin::{EchoAction, LogAction};

/// Errors raised by the action registry
#[derive(Debug, Clone, Error)]
pub enum RegistryError {
    #[error("action not found: {0}")]
    NotFound(String),
}

/// The action registry maps references (e.g. `#echo`) to action instances
pub struct ActionRegistry {
    actions: DashMap<String, Arc<dyn Action>>,
}

impl ActionRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self {
            actions: DashMap::new(),
        }
    }

    /// Registry holding the built-in actions
    pub fn with_builtins(logger: &Logger) -> Self {
        let registry = Self::new();
        registry.register(Arc::new(EchoAction::new()));
        registry.register(Arc::new(LogAction::new(logger)));
        registry
    }

    /// Register an action under its metadata reference
    pub fn register(&self, action: Arc<dyn Action>) {
        let reference = action.metadata().reference.clone();
        self.register_as(reference, action);
    }

    /// Register an action under an explicit reference
    pub fn register_as(&self, reference: impl Into<String>, action: Arc<dyn Action>) {
        let reference = reference.into();
        debug!(action = %reference, "Registering action");
        if self.actions.insert(reference.clone(), action).is_some() {
            warn!(action = %reference, "Replaced previously registered action");
        }
    }

    /// Look up an action
    pub fn get(&self, reference: &str) -> Result<Arc<dyn Action>, RegistryError> {
        self.actions
            .get(reference)
            .map(|a| a.value().clone())
            .ok_or_else(|| RegistryError::NotFound(reference.to_string()))
    }

    pub fn contains(&self, reference: &str) -> bool {
        self.actions.contains_key(reference)
    }

    /// Remove an action, returning it if it was registered
    pub fn unregister(&self, reference: &str) -> Option<Arc<dyn Action>> {
        self.actions.remove(reference).map(|(_, a)| a)
    }

    /// All registered references
    pub fn references(&self) -> Vec<String> {
        self.actions.iter().map(|e| e.key().clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }
}

impl Default for ActionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builtin::{ECHO_REF, LOG_REF};
    use trellis_log::Level;

    #[test]
    fn test_builtins() {
        let registry = ActionRegistry::with_builtins(&Logger::root("trellis", Level::Info));

        assert_eq!(registry.len(), 2);
        assert!(registry.contains(ECHO_REF));
        assert!(registry.contains(LOG_REF));
        assert_eq!(registry.get(ECHO_REF).unwrap().metadata().reference, ECHO_REF);
    }

    #[test]
    fn test_missing_action() {
        let registry = ActionRegistry::new();
        assert!(registry.is_empty());
        assert!(matches!(registry.get("#nope"), Err(RegistryError::NotFound(r)) if r == "#nope"));
    }

    #[test]
    fn test_register_as_and_unregister() {
        let registry = ActionRegistry::new();
        registry.register_as("custom", Arc::new(EchoAction::new()));

        assert!(registry.get("custom").is_ok());
        assert_eq!(registry.references(), vec!["custom".to_string()]);
        assert!(registry.unregister("custom").is_some());
        assert!(!registry.contains("custom"));
    }
}

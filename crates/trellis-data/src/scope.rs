//! Scopes: named value namespaces queried during evaluation
//!
//! A scope is built per dispatch and never shared across concurrent
//! dispatches. Scopes use interior mutability so that resolvers, which only
//! see `&dyn Scope`, are still able to write.

use std::collections::HashSet;
use std::sync::Arc;

use dashmap::DashMap;
use serde_json::{Map, Value};

/// Name under which a non-object payload is exposed by [`SimpleScope::from_value`]
pub const PAYLOAD_NAME: &str = "data";

/// A resolvable key/value namespace
pub trait Scope: Send + Sync {
    /// Look up a value by name
    fn get_value(&self, name: &str) -> Option<Value>;

    /// Set a value, returning `false` if the scope refuses the name
    fn set_value(&self, name: &str, value: Value) -> bool;

    /// Flattened view of every visible name
    fn variables(&self) -> Map<String, Value>;
}

/// A scope accepting any name, optionally chained to a parent
///
/// Lookups are child-first: a name set on this scope shadows the same name
/// on the parent. Writes always land on this scope.
#[derive(Default)]
pub struct SimpleScope {
    values: DashMap<String, Value>,
    parent: Option<Arc<dyn Scope>>,
}

impl SimpleScope {
    /// Create an empty scope
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a scope holding the entries of `values`
    pub fn from_map(values: Map<String, Value>) -> Self {
        Self {
            values: values.into_iter().collect(),
            parent: None,
        }
    }

    /// Create a scope over an event payload
    ///
    /// Object fields become top-level names; any other payload is exposed
    /// under [`PAYLOAD_NAME`].
    pub fn from_value(payload: Value) -> Self {
        match payload {
            Value::Object(map) => Self::from_map(map),
            Value::Null => Self::new(),
            other => {
                let scope = Self::new();
                scope.values.insert(PAYLOAD_NAME.to_string(), other);
                scope
            }
        }
    }

    /// Chain this scope to a parent
    pub fn with_parent(mut self, parent: Arc<dyn Scope>) -> Self {
        self.parent = Some(parent);
        self
    }

    /// Add a value, builder style
    pub fn with_value(self, name: impl Into<String>, value: Value) -> Self {
        self.values.insert(name.into(), value);
        self
    }
}

impl Scope for SimpleScope {
    fn get_value(&self, name: &str) -> Option<Value> {
        match self.values.get(name) {
            Some(value) => Some(value.value().clone()),
            None => self.parent.as_ref().and_then(|p| p.get_value(name)),
        }
    }

    fn set_value(&self, name: &str, value: Value) -> bool {
        self.values.insert(name.to_string(), value);
        true
    }

    fn variables(&self) -> Map<String, Value> {
        let mut vars = self
            .parent
            .as_ref()
            .map(|p| p.variables())
            .unwrap_or_default();
        for entry in self.values.iter() {
            vars.insert(entry.key().clone(), entry.value().clone());
        }
        vars
    }
}

impl std::fmt::Debug for SimpleScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimpleScope")
            .field("values", &self.values.len())
            .field("parent", &self.parent.is_some())
            .finish()
    }
}

/// A scope whose set of names is fixed at construction
///
/// Only declared names can be written; `set_value` on any other name
/// returns `false` and leaves the scope unchanged.
#[derive(Debug, Default)]
pub struct FixedScope {
    names: HashSet<String>,
    values: DashMap<String, Value>,
}

impl FixedScope {
    /// Declare the writable names
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            names: names.into_iter().map(Into::into).collect(),
            values: DashMap::new(),
        }
    }

    /// Declared names with their initial values
    pub fn with_defaults<I, S>(defaults: I) -> Self
    where
        I: IntoIterator<Item = (S, Option<Value>)>,
        S: Into<String>,
    {
        let scope = Self::default();
        let mut names = HashSet::new();
        for (name, value) in defaults {
            let name = name.into();
            if let Some(value) = value {
                scope.values.insert(name.clone(), value);
            }
            names.insert(name);
        }
        Self { names, ..scope }
    }

    pub fn is_declared(&self, name: &str) -> bool {
        self.names.contains(name)
    }
}

impl Scope for FixedScope {
    fn get_value(&self, name: &str) -> Option<Value> {
        self.values.get(name).map(|v| v.value().clone())
    }

    fn set_value(&self, name: &str, value: Value) -> bool {
        if !self.names.contains(name) {
            return false;
        }
        self.values.insert(name.to_string(), value);
        true
    }

    fn variables(&self) -> Map<String, Value> {
        self.values
            .iter()
            .map(|e| (e.key().clone(), e.value().clone()))
            .collect()
    }
}

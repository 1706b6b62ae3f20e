//! Trigger, handler and action configuration
//!
//! A [`TriggerConfig`] owns its handlers; each [`HandlerConfig`] holds a
//! non-owning reference back to its trigger, used only to derive qualified
//! names for diagnostics.

use std::sync::{Arc, Weak};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One action invocation within a handler
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ActionConfig {
    /// Reference of the action in the registry
    #[serde(rename = "ref", default, skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,

    /// Input mapping template
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub input: Map<String, Value>,

    /// Output mapping template
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub output: Map<String, Value>,

    /// Boolean expression gating the action
    #[serde(
        rename = "if",
        alias = "condition",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub condition: Option<String>,
}

/// A named handler bound to one or more actions
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HandlerConfig {
    pub name: String,

    #[serde(default)]
    pub settings: Map<String, Value>,

    #[serde(default, alias = "action")]
    pub actions: Vec<ActionConfig>,

    #[serde(skip)]
    parent: Weak<TriggerConfig>,
}

impl HandlerConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_settings(mut self, settings: Map<String, Value>) -> Self {
        self.settings = settings;
        self
    }

    pub fn with_action(mut self, action: ActionConfig) -> Self {
        self.actions.push(action);
        self
    }

    /// Attach to a trigger without being owned by it
    pub fn with_parent(mut self, parent: &Arc<TriggerConfig>) -> Self {
        self.parent = Arc::downgrade(parent);
        self
    }

    /// The owning trigger, if it is still alive
    pub fn parent(&self) -> Option<Arc<TriggerConfig>> {
        self.parent.upgrade()
    }

    /// `<trigger id>.<handler name>`, or the handler name without a parent
    pub fn qualified_name(&self) -> String {
        match self.parent() {
            Some(trigger) => format!("{}.{}", trigger.id, self.name),
            None => self.name.clone(),
        }
    }
}

/// Serialized form of a trigger
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TriggerDef {
    pub id: String,

    #[serde(rename = "ref", default, skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,

    #[serde(default)]
    pub settings: Map<String, Value>,

    #[serde(default)]
    pub handlers: Vec<HandlerConfig>,
}

/// A trigger and the handlers it owns
#[derive(Debug)]
pub struct TriggerConfig {
    pub id: String,
    pub reference: Option<String>,
    pub settings: Map<String, Value>,
    pub handlers: Vec<Arc<HandlerConfig>>,
}

impl TriggerConfig {
    /// Build the trigger, pointing every handler back at it
    pub fn from_def(def: TriggerDef) -> Arc<Self> {
        Arc::new_cyclic(|weak| TriggerConfig {
            id: def.id,
            reference: def.reference,
            settings: def.settings,
            handlers: def
                .handlers
                .into_iter()
                .map(|mut handler| {
                    handler.parent = weak.clone();
                    Arc::new(handler)
                })
                .collect(),
        })
    }

    /// Build a trigger with no handlers
    pub fn new(id: impl Into<String>) -> Arc<Self> {
        Self::from_def(TriggerDef {
            id: id.into(),
            ..Default::default()
        })
    }

    pub fn handler(&self, name: &str) -> Option<&Arc<HandlerConfig>> {
        self.handlers.iter().find(|h| h.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_handler_config_deserialize() {
        let config: HandlerConfig = serde_json::from_value(json!({
            "name": "orders",
            "settings": {"path": "/orders"},
            "actions": [{
                "ref": "#echo",
                "if": "=$.total > 10",
                "input": {"id": "=$.id"},
                "output": {"ok": true}
            }]
        }))
        .unwrap();

        assert_eq!(config.name, "orders");
        assert_eq!(config.actions.len(), 1);
        assert_eq!(config.actions[0].reference.as_deref(), Some("#echo"));
        assert_eq!(config.actions[0].condition.as_deref(), Some("=$.total > 10"));
        assert!(config.parent().is_none());
        assert_eq!(config.qualified_name(), "orders");
    }

    #[test]
    fn test_trigger_links_handlers() {
        let def: TriggerDef = serde_json::from_value(json!({
            "id": "rest",
            "handlers": [{"name": "a"}, {"name": "b"}]
        }))
        .unwrap();
        let trigger = TriggerConfig::from_def(def);

        let names: Vec<_> = trigger.handlers.iter().map(|h| h.qualified_name()).collect();
        assert_eq!(names, ["rest.a", "rest.b"]);
        assert!(Arc::ptr_eq(&trigger.handlers[0].parent().unwrap(), &trigger));
        assert!(trigger.handler("b").is_some());
    }

    #[test]
    fn test_parent_is_not_owned() {
        let handler = {
            let trigger = TriggerConfig::from_def(TriggerDef {
                id: "t".into(),
                handlers: vec![HandlerConfig::new("h")],
                ..Default::default()
            });
            trigger.handlers[0].clone()
        };

        assert!(handler.parent().is_none());
        assert_eq!(handler.qualified_name(), "h");
    }

    #[test]
    fn test_with_parent() {
        let trigger = TriggerConfig::new("sampleTrig");
        let handler = HandlerConfig::new("sampleConfig").with_parent(&trigger);
        assert_eq!(handler.qualified_name(), "sampleTrig.sampleConfig");
    }

    #[test]
    fn test_action_config_skips_empty_fields() {
        let action = ActionConfig {
            reference: Some("#log".into()),
            ..Default::default()
        };
        assert_eq!(serde_json::to_value(&action).unwrap(), json!({"ref": "#log"}));
    }
}

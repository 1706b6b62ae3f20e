//! Application configuration

use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::info;
use trellis_trigger::{TriggerConfig, TriggerDef};

use crate::error::{ConfigError, ConfigResult};
use crate::loader::ConfigLoader;

/// Top-level application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Immutable properties exposed through `$property[...]`
    #[serde(default)]
    pub properties: Map<String, Value>,

    #[serde(default, alias = "trigger")]
    pub triggers: Vec<TriggerDef>,
}

impl AppConfig {
    /// Load from a file, resolving includes relative to its directory
    pub fn load(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref();
        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let file = path.file_name().map(Path::new).unwrap_or(path);
        Self::load_with(&mut ConfigLoader::new(dir), file)
    }

    /// Load a file through an existing loader
    pub fn load_with(loader: &mut ConfigLoader, path: impl AsRef<Path>) -> ConfigResult<Self> {
        let value = loader.load_file(path)?;
        let config = Self::from_yaml(value)?;
        info!(
            app = %config.name,
            triggers = config.triggers.len(),
            "Loaded application configuration"
        );
        Ok(config)
    }

    /// Deserialize from an already processed document
    pub fn from_yaml(value: serde_yaml::Value) -> ConfigResult<Self> {
        serde_yaml::from_value(value).map_err(|source| ConfigError::InvalidApp { source })
    }

    /// Build the trigger configuration trees
    pub fn trigger_configs(&self) -> Vec<Arc<TriggerConfig>> {
        self.triggers
            .iter()
            .cloned()
            .map(TriggerConfig::from_def)
            .collect()
    }
}

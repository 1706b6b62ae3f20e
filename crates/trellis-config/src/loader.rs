//! YAML configuration loader with custom tag support
//!
//! Supported tags:
//! - `!include path` - Include another YAML or JSON file
//! - `!include_dir_merge_list dir` - Concatenate lists from every YAML file in a directory
//! - `!env_var VAR` / `!env_var VAR default` - Environment variable substitution

use std::collections::HashSet;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde_yaml::value::TaggedValue;
use serde_yaml::Value;
use tracing::{debug, trace};

use crate::error::{ConfigError, ConfigResult};

type EnvLookup = dyn Fn(&str) -> Option<String> + Send + Sync;

/// Loader resolving tags relative to a configuration directory
pub struct ConfigLoader {
    /// Base directory for resolving relative paths
    config_dir: PathBuf,
    /// Source of `!env_var` values
    env: Arc<EnvLookup>,
    /// Files currently being loaded, to detect circular includes
    include_stack: HashSet<PathBuf>,
}

impl ConfigLoader {
    /// Create a loader reading the process environment
    pub fn new(config_dir: impl Into<PathBuf>) -> Self {
        Self::with_env(config_dir, |name| std::env::var(name).ok())
    }

    /// Create a loader with a custom environment lookup
    pub fn with_env<F>(config_dir: impl Into<PathBuf>, env: F) -> Self
    where
        F: Fn(&str) -> Option<String> + Send + Sync + 'static,
    {
        Self {
            config_dir: config_dir.into(),
            env: Arc::new(env),
            include_stack: HashSet::new(),
        }
    }

    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    /// Load and process a file
    pub fn load_file(&mut self, path: impl AsRef<Path>) -> ConfigResult<Value> {
        let path = self.resolve_path(path.as_ref());
        debug!(path = %path.display(), "Loading configuration file");

        if self.include_stack.contains(&path) {
            return Err(ConfigError::CircularInclude { path });
        }

        let content = fs::read_to_string(&path).map_err(|e| ConfigError::ReadFile {
            path: path.clone(),
            source: e,
        })?;

        self.include_stack.insert(path.clone());
        let result = self.load_string(&content, &path);
        self.include_stack.remove(&path);

        result
    }

    /// Load and process a document; `source_path` anchors relative includes
    pub fn load_string(&mut self, content: &str, source_path: &Path) -> ConfigResult<Value> {
        let value: Value = serde_yaml::from_str(content).map_err(|e| ConfigError::Parse {
            path: source_path.to_path_buf(),
            source: e,
        })?;

        self.process_value(value, source_path)
    }

    fn process_value(&mut self, value: Value, source_path: &Path) -> ConfigResult<Value> {
        match value {
            Value::Tagged(tagged) => self.process_tagged(*tagged, source_path),
            Value::Mapping(map) => {
                let mut result = serde_yaml::Mapping::with_capacity(map.len());
                for (k, v) in map {
                    result.insert(k, self.process_value(v, source_path)?);
                }
                Ok(Value::Mapping(result))
            }
            Value::Sequence(seq) => seq
                .into_iter()
                .map(|v| self.process_value(v, source_path))
                .collect::<ConfigResult<Vec<_>>>()
                .map(Value::Sequence),
            _ => Ok(value),
        }
    }

    fn process_tagged(&mut self, tagged: TaggedValue, source_path: &Path) -> ConfigResult<Value> {
        let tag = tagged.tag.to_string();
        trace!(tag = %tag, "Processing tag");

        match tag.as_str() {
            "!include" => {
                let path = self.value_to_path(&tagged.value, source_path)?;
                self.load_file(path)
            }
            "!include_dir_merge_list" => {
                let dir = self.value_to_path(&tagged.value, source_path)?;
                self.include_dir_merge_list(&dir)
            }
            "!env_var" => self.process_env_var(tagged.value),
            _ => Err(ConfigError::UnknownTag {
                tag,
                path: source_path.to_path_buf(),
            }),
        }
    }

    fn include_dir_merge_list(&mut self, dir: &Path) -> ConfigResult<Value> {
        debug!(dir = %dir.display(), "Including directory as merged list");

        if !dir.is_dir() {
            return Err(ConfigError::DirectoryNotFound {
                path: dir.to_path_buf(),
            });
        }

        let mut files: Vec<PathBuf> = fs::read_dir(dir)
            .map_err(|e| ConfigError::ReadFile {
                path: dir.to_path_buf(),
                source: e,
            })?
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| {
                path.extension()
                    .map(|ext| ext == "yaml" || ext == "yml" || ext == "json")
                    .unwrap_or(false)
            })
            .collect();
        files.sort();

        let mut result = Vec::new();
        for file in files {
            match self.load_file(&file)? {
                Value::Sequence(seq) => result.extend(seq),
                Value::Null => {}
                other => result.push(other),
            }
        }
        Ok(Value::Sequence(result))
    }

    /// `!env_var NAME`, `!env_var NAME default` or `!env_var [NAME, default]`
    fn process_env_var(&self, value: Value) -> ConfigResult<Value> {
        let (name, default) = match value {
            Value::String(s) => match s.trim().split_once(char::is_whitespace) {
                Some((name, default)) => (name.to_string(), Some(Value::String(default.trim().to_string()))),
                None => (s.trim().to_string(), None),
            },
            Value::Sequence(mut seq) if (1..=2).contains(&seq.len()) => {
                let default = if seq.len() == 2 { seq.pop() } else { None };
                match seq.pop() {
                    Some(Value::String(name)) => (name, default),
                    _ => return Err(invalid_env_var()),
                }
            }
            _ => return Err(invalid_env_var()),
        };

        match ((self.env)(&name), default) {
            (Some(value), _) => {
                debug!(var = %name, "Substituted env var");
                Ok(Value::String(value))
            }
            (None, Some(default)) => {
                debug!(var = %name, "Env var not set, using default");
                Ok(default)
            }
            (None, None) => Err(ConfigError::EnvVarNotFound { var: name }),
        }
    }

    /// Resolve an include path relative to the including file
    fn value_to_path(&self, value: &Value, source_path: &Path) -> ConfigResult<PathBuf> {
        let path_str = match value {
            Value::String(s) => s.trim(),
            _ => {
                return Err(ConfigError::InvalidIncludePath {
                    path: format!("{:?}", value),
                    reason: "path must be a string".to_string(),
                })
            }
        };

        let base_dir = source_path.parent().unwrap_or(&self.config_dir);
        Ok(if Path::new(path_str).is_absolute() {
            PathBuf::from(path_str)
        } else {
            base_dir.join(path_str)
        })
    }

    fn resolve_path(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.config_dir.join(path)
        }
    }
}

impl fmt::Debug for ConfigLoader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConfigLoader")
            .field("config_dir", &self.config_dir)
            .field("include_stack", &self.include_stack)
            .finish_non_exhaustive()
    }
}

fn invalid_env_var() -> ConfigError {
    ConfigError::InvalidValue {
        key: "!env_var".to_string(),
        reason: "expected a variable name, optionally followed by a default".to_string(),
    }
}

/// Load a file with full tag processing
pub fn load_file(config_dir: impl Into<PathBuf>, file: impl AsRef<Path>) -> ConfigResult<Value> {
    ConfigLoader::new(config_dir).load_file(file)
}

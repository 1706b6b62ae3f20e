//! Logging configuration loaded from the process environment
//!
//! Parsing is a pure step over a lookup function so the configuration can be
//! built before any component is constructed, and tested without touching
//! the real environment.

use std::fmt;
use std::str::FromStr;

use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

use crate::error::{LogError, LogResult};
use crate::logger::{Field, Logger};

/// Environment key selecting the root log level
pub const ENV_LOG_LEVEL: &str = "TRELLIS_LOG_LEVEL";
/// Environment key selecting console or JSON output
pub const ENV_LOG_FORMAT: &str = "TRELLIS_LOG_FORMAT";
/// Environment key enabling context fields on every logger
pub const ENV_LOG_CTX: &str = "TRELLIS_LOG_CTX";
/// Environment key holding `key=value` context fields
pub const ENV_LOG_CTX_FIELDS: &str = "TRELLIS_LOG_CTX_FIELDS";

/// Name of the root logger
pub const ROOT_LOGGER_NAME: &str = "trellis";

/// Log level
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum Level {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl Level {
    /// Parse a level name, falling back to the default level
    pub fn parse_or_default(s: &str) -> Self {
        s.parse().unwrap_or_default()
    }

    fn as_filter(self) -> LevelFilter {
        match self {
            Level::Trace => LevelFilter::TRACE,
            Level::Debug => LevelFilter::DEBUG,
            Level::Info => LevelFilter::INFO,
            Level::Warn => LevelFilter::WARN,
            Level::Error => LevelFilter::ERROR,
        }
    }
}

impl FromStr for Level {
    type Err = LogError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "TRACE" => Ok(Level::Trace),
            "DEBUG" => Ok(Level::Debug),
            "INFO" => Ok(Level::Info),
            "WARN" | "WARNING" => Ok(Level::Warn),
            "ERROR" => Ok(Level::Error),
            _ => Err(LogError::InvalidLevel(s.to_string())),
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Level::Trace => "TRACE",
            Level::Debug => "DEBUG",
            Level::Info => "INFO",
            Level::Warn => "WARN",
            Level::Error => "ERROR",
        };
        f.write_str(s)
    }
}

/// Output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Format {
    #[default]
    Console,
    Json,
}

/// Logging configuration
#[derive(Debug, Clone, Default)]
pub struct LogConfig {
    /// Minimum level emitted by loggers built from this config
    pub level: Level,

    /// Output format of the installed subscriber
    pub format: Format,

    /// Fields attached to the root logger (only when context logging is on)
    pub ctx_fields: Vec<Field>,
}

impl LogConfig {
    /// Load the configuration from the process environment
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load the configuration from an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let level = lookup(ENV_LOG_LEVEL)
            .map(|v| Level::parse_or_default(&v))
            .unwrap_or_default();

        let format = match lookup(ENV_LOG_FORMAT) {
            Some(v) if v.trim().eq_ignore_ascii_case("json") => Format::Json,
            _ => Format::Console,
        };

        let ctx_logging = lookup(ENV_LOG_CTX)
            .map(|v| v.trim().eq_ignore_ascii_case("true"))
            .unwrap_or(false);

        let ctx_fields = if ctx_logging {
            lookup(ENV_LOG_CTX_FIELDS)
                .map(|v| parse_ctx_fields(&v))
                .unwrap_or_default()
        } else {
            Vec::new()
        };

        Self {
            level,
            format,
            ctx_fields,
        }
    }

    /// Build the root logger described by this configuration
    pub fn root_logger(&self) -> Logger {
        Logger::root(ROOT_LOGGER_NAME, self.level).with_fields(self.ctx_fields.clone())
    }

    /// Install a global `tracing` subscriber matching this configuration
    ///
    /// `RUST_LOG`, when set, overrides the configured level.
    pub fn init(&self) -> LogResult<()> {
        let filter = EnvFilter::builder()
            .with_default_directive(self.level.as_filter().into())
            .from_env_lossy();

        let builder = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true);

        let result = match self.format {
            Format::Console => builder.try_init(),
            Format::Json => builder.json().try_init(),
        };

        result.map_err(|e| LogError::Init(e.to_string()))
    }
}

/// Parse `key=value,key2=value2`, dropping malformed or empty entries
fn parse_ctx_fields(raw: &str) -> Vec<Field> {
    raw.trim()
        .split(',')
        .filter_map(|attr| {
            let (key, value) = attr.split_once('=')?;
            if value.contains('=') {
                return None;
            }
            let (key, value) = (key.trim(), value.trim());
            if key.is_empty() || value.is_empty() {
                return None;
            }
            Some(Field::string(key, value))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = LogConfig::from_lookup(lookup(&[]));
        assert_eq!(config.level, Level::Info);
        assert_eq!(config.format, Format::Console);
        assert!(config.ctx_fields.is_empty());
    }

    #[test]
    fn test_level_and_format() {
        let config = LogConfig::from_lookup(lookup(&[
            (ENV_LOG_LEVEL, "debug"),
            (ENV_LOG_FORMAT, "JSON"),
        ]));
        assert_eq!(config.level, Level::Debug);
        assert_eq!(config.format, Format::Json);
    }

    #[test]
    fn test_unknown_level_falls_back() {
        let config = LogConfig::from_lookup(lookup(&[(ENV_LOG_LEVEL, "verbose")]));
        assert_eq!(config.level, Level::Info);
        assert!("verbose".parse::<Level>().is_err());
    }

    #[test]
    fn test_ctx_fields_require_ctx_flag() {
        let vars = [(ENV_LOG_CTX_FIELDS, "app=demo")];
        let config = LogConfig::from_lookup(lookup(&vars));
        assert!(config.ctx_fields.is_empty());

        let config = LogConfig::from_lookup(lookup(&[
            (ENV_LOG_CTX, "TRUE"),
            (ENV_LOG_CTX_FIELDS, " app = demo, bad, =x, y=, env=prod,a=b=c"),
        ]));
        assert_eq!(
            config.ctx_fields,
            vec![Field::string("app", "demo"), Field::string("env", "prod")]
        );
    }

    #[test]
    fn test_root_logger_carries_config() {
        let config = LogConfig::from_lookup(lookup(&[
            (ENV_LOG_LEVEL, "WARN"),
            (ENV_LOG_CTX, "true"),
            (ENV_LOG_CTX_FIELDS, "app=demo"),
        ]));
        let root = config.root_logger();

        assert_eq!(root.name(), ROOT_LOGGER_NAME);
        assert_eq!(root.level(), Level::Warn);
        assert!(!root.debug_enabled());
        assert_eq!(root.fields(), &[Field::string("app", "demo")]);
    }
}

//! Named, leveled loggers emitting `tracing` events
//!
//! A [`Logger`] is an explicit value: the root is built once from a
//! [`LogConfig`](crate::LogConfig) and every component receives a reference
//! (or a child) at construction. Events are emitted through `tracing` with
//! the logger name attached as the `logger` field.

use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use crate::config::Level;
use crate::error::{LogError, LogResult};

/// A structured key/value pair attached to log events
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub key: String,
    pub value: Value,
}

impl Field {
    pub fn new(key: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }

    pub fn string(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self::new(key, Value::String(value.into()))
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.value {
            Value::String(s) => write!(f, "{}={}", self.key, s),
            other => write!(f, "{}={}", self.key, other),
        }
    }
}

/// Space-separated rendering of a field list
struct Fields<'a>(&'a [Field], &'a [Field]);

impl Fields<'_> {
    fn is_empty(&self) -> bool {
        self.0.is_empty() && self.1.is_empty()
    }
}

impl fmt::Display for Fields<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, field) in self.0.iter().chain(self.1.iter()).enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{}", field)?;
        }
        Ok(())
    }
}

macro_rules! emit {
    ($level:expr, $name:expr, $fields:expr, $msg:expr) => {{
        let fields = $fields;
        if fields.is_empty() {
            match $level {
                Level::Trace => tracing::trace!(logger = %$name, "{}", $msg),
                Level::Debug => tracing::debug!(logger = %$name, "{}", $msg),
                Level::Info => tracing::info!(logger = %$name, "{}", $msg),
                Level::Warn => tracing::warn!(logger = %$name, "{}", $msg),
                Level::Error => tracing::error!(logger = %$name, "{}", $msg),
            }
        } else {
            match $level {
                Level::Trace => tracing::trace!(logger = %$name, fields = %fields, "{}", $msg),
                Level::Debug => tracing::debug!(logger = %$name, fields = %fields, "{}", $msg),
                Level::Info => tracing::info!(logger = %$name, fields = %fields, "{}", $msg),
                Level::Warn => tracing::warn!(logger = %$name, fields = %fields, "{}", $msg),
                Level::Error => tracing::error!(logger = %$name, fields = %fields, "{}", $msg),
            }
        }
    }};
}

/// A named logger
#[derive(Debug, Clone)]
pub struct Logger {
    name: Arc<str>,
    level: Level,
    fields: Arc<[Field]>,
}

impl Logger {
    /// Create a root logger
    pub fn root(name: &str, level: Level) -> Self {
        Self {
            name: Arc::from(name),
            level,
            fields: Arc::from(Vec::new()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn level(&self) -> Level {
        self.level
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    /// Same logger with a different minimum level
    pub fn with_level(mut self, level: Level) -> Self {
        self.level = level;
        self
    }

    /// Same logger with extra fields attached to every event
    pub fn with_fields(&self, fields: impl IntoIterator<Item = Field>) -> Self {
        let mut all = self.fields.to_vec();
        all.extend(fields);
        Self {
            name: self.name.clone(),
            level: self.level,
            fields: Arc::from(all),
        }
    }

    /// Create a child logger named `<parent>.<name>`
    pub fn child(&self, name: &str) -> LogResult<Self> {
        let name = name.trim();
        if name.is_empty()
            || name.starts_with('.')
            || name.ends_with('.')
            || name.chars().any(|c| c.is_whitespace() || c.is_control())
        {
            return Err(LogError::InvalidName(name.to_string()));
        }

        Ok(Self {
            name: Arc::from(format!("{}.{}", self.name, name)),
            level: self.level,
            fields: self.fields.clone(),
        })
    }

    pub fn enabled(&self, level: Level) -> bool {
        level >= self.level
    }

    pub fn trace_enabled(&self) -> bool {
        self.enabled(Level::Trace)
    }

    pub fn debug_enabled(&self) -> bool {
        self.enabled(Level::Debug)
    }

    pub fn log(&self, level: Level, msg: impl fmt::Display) {
        self.log_with(level, msg, &[]);
    }

    fn log_with(&self, level: Level, msg: impl fmt::Display, extra: &[Field]) {
        if !self.enabled(level) {
            return;
        }
        emit!(level, self.name, Fields(&self.fields, extra), msg);
    }

    pub fn trace(&self, msg: impl fmt::Display) {
        self.log(Level::Trace, msg);
    }

    pub fn debug(&self, msg: impl fmt::Display) {
        self.log(Level::Debug, msg);
    }

    pub fn info(&self, msg: impl fmt::Display) {
        self.log(Level::Info, msg);
    }

    pub fn warn(&self, msg: impl fmt::Display) {
        self.log(Level::Warn, msg);
    }

    pub fn error(&self, msg: impl fmt::Display) {
        self.log(Level::Error, msg);
    }

    /// Formatted variant, e.g. `logger.trace_fmt(format_args!("x={}", x))`
    pub fn trace_fmt(&self, args: fmt::Arguments<'_>) {
        self.log(Level::Trace, args);
    }

    pub fn debug_fmt(&self, args: fmt::Arguments<'_>) {
        self.log(Level::Debug, args);
    }

    pub fn info_fmt(&self, args: fmt::Arguments<'_>) {
        self.log(Level::Info, args);
    }

    pub fn warn_fmt(&self, args: fmt::Arguments<'_>) {
        self.log(Level::Warn, args);
    }

    pub fn error_fmt(&self, args: fmt::Arguments<'_>) {
        self.log(Level::Error, args);
    }

    /// Structured view of this logger
    pub fn structured(&self) -> StructuredLogger<'_> {
        StructuredLogger { logger: self }
    }
}

/// Logger variant taking per-event fields
#[derive(Debug, Clone, Copy)]
pub struct StructuredLogger<'a> {
    logger: &'a Logger,
}

impl StructuredLogger<'_> {
    pub fn debug(&self, msg: &str, fields: &[Field]) {
        self.logger.log_with(Level::Debug, msg, fields);
    }

    pub fn info(&self, msg: &str, fields: &[Field]) {
        self.logger.log_with(Level::Info, msg, fields);
    }

    pub fn warn(&self, msg: &str, fields: &[Field]) {
        self.logger.log_with(Level::Warn, msg, fields);
    }

    pub fn error(&self, msg: &str, fields: &[Field]) {
        self.logger.log_with(Level::Error, msg, fields);
    }
}

/// Create a child logger, falling back to `parent` if the name is rejected
pub fn child_logger(parent: &Logger, name: &str) -> Logger {
    match parent.child(name) {
        Ok(child) => child,
        Err(e) => {
            parent.warn_fmt(format_args!(
                "unable to create child logger named: {} - {}",
                name, e
            ));
            parent.clone()
        }
    }
}

/// Create a child logger carrying additional fields
pub fn child_with_fields(
    parent: &Logger,
    name: &str,
    fields: impl IntoIterator<Item = Field>,
) -> Logger {
    child_logger(parent, name).with_fields(fields)
}

/// Create a child logger for a contribution identified by its ref
///
/// Refs of the form `<...>/<category>/<kind>/<name>` where kind is
/// `activity`, `trigger` or `connector` produce `<category>.<kind>.<name>`;
/// other refs with at least three segments produce
/// `<kind>.<contribution_type>.<name>`; short refs produce
/// `<contribution_type>.<last segment>`.
pub fn logger_from_ref(parent: &Logger, contribution_type: &str, reference: &str) -> Logger {
    let reference = reference.trim().trim_end_matches('/');
    let dirs: Vec<&str> = reference.split('/').collect();

    let name = if dirs.len() >= 3 {
        let name = dirs[dirs.len() - 1];
        let kind = dirs[dirs.len() - 2];
        if matches!(kind, "activity" | "trigger" | "connector") {
            format!("{}.{}.{}", dirs[dirs.len() - 3], kind, name)
        } else {
            format!("{}.{}.{}", kind, contribution_type, name)
        }
    } else {
        let base = dirs.last().copied().unwrap_or_default();
        format!("{}.{}", contribution_type, base)
    };

    child_logger(parent, &name.to_lowercase())
}

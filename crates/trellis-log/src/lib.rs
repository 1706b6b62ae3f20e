//! Logging for Trellis
//!
//! Components never build loggers on their own: a root [`Logger`] is created
//! once from a [`LogConfig`] at process start and passed to every component
//! that logs, which derives named children from it.
//!
//! # Environment
//!
//! - `TRELLIS_LOG_LEVEL` - `TRACE`, `DEBUG`, `INFO` (default), `WARN`, `ERROR`
//! - `TRELLIS_LOG_FORMAT` - `CONSOLE` (default) or `JSON`
//! - `TRELLIS_LOG_CTX` - `true` to attach context fields to the root logger
//! - `TRELLIS_LOG_CTX_FIELDS` - context fields as `key=value,key2=value2`
//!
//! # Example
//!
//! ```ignore
//! use trellis_log::{child_logger, LogConfig};
//!
//! let config = LogConfig::from_env();
//! config.init()?;
//!
//! let root = config.root_logger();
//! let logger = child_logger(&root, "handler");
//! logger.info_fmt(format_args!("dispatching {} actions", 2));
//! ```

mod config;
mod error;
mod logger;

pub use config::{
    Format, Level, LogConfig, ENV_LOG_CTX, ENV_LOG_CTX_FIELDS, ENV_LOG_FORMAT, ENV_LOG_LEVEL,
    ROOT_LOGGER_NAME,
};
pub use error::{LogError, LogResult};
pub use logger::{child_logger, child_with_fields, logger_from_ref, Field, Logger, StructuredLogger};

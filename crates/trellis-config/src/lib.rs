//! Application configuration loading for Trellis
//!
//! Configuration files are YAML (JSON documents load as well) with custom
//! tags:
//!
//! - `!include path` - Include another file
//! - `!include_dir_merge_list dir` - Concatenate lists from every file in a directory
//! - `!env_var VAR [default]` - Environment variable substitution
//!
//! # Example
//!
//! ```ignore
//! use trellis_config::AppConfig;
//!
//! let app = AppConfig::load("/etc/trellis/app.yaml")?;
//! for trigger in app.trigger_configs() {
//!     // build handlers
//! }
//! ```

mod app;
mod error;
mod loader;

pub use app::AppConfig;
pub use error::{ConfigError, ConfigResult};
pub use loader::{load_file, ConfigLoader};

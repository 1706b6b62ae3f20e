//! Data binding for Trellis
//!
//! This crate evaluates symbolic expressions against runtime scopes and
//! projects scopes into structured values:
//!
//! # Scopes
//!
//! - [`SimpleScope`] - any name writable, optionally chained to a parent
//! - [`FixedScope`] - only names declared at construction are writable
//!
//! # Paths
//!
//! - `$.order.items[0].sku` - scope-relative (`.` resolver, also the default)
//! - `$env[HOME]` - environment variable
//! - `$property[app.version]` - application property
//!
//! # Expressions
//!
//! - `=$.order.id` - path
//! - `=42` / `="text"` / `=[1, 2]` - JSON literal
//! - `=count * 2` - template expression
//! - `Order {{ order.id }}` - string interpolation
//! - `{"@merge": ["x", "=$.tags"]}` - one-level splice of several results
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use serde_json::json;
//! use trellis_data::{CompositeResolver, MapperFactory, SimpleScope};
//!
//! let factory = MapperFactory::new(Arc::new(CompositeResolver::standard()));
//! let template = json!({"id": "=$.order.id", "tags": {"@merge": ["new", "=$.order.tags"]}});
//! let mapper = factory.new_mapper(template.as_object().unwrap())?.unwrap();
//!
//! let scope = SimpleScope::from_value(json!({"order": {"id": 7, "tags": ["a"]}}));
//! let out = mapper.apply(&scope)?;
//! // {"id": 7, "tags": ["new", "a"]}
//! ```

mod error;
mod expression;
mod mapper;
mod metadata;
pub mod path;
mod resolve;
mod scope;
mod template;

pub use error::{DataError, DataResult};
pub use expression::{Expr, ExpressionFactory, EXPR_PREFIX};
pub use mapper::{Mapper, MapperFactory, MergeMapper, ObjectMapper, MERGE};
pub use metadata::{Attribute, DataType, IOMetadata};
pub use resolve::{
    split_token, CompositeResolver, EnvResolver, PropertyResolver, Resolver, ScopeResolver,
    ENV_TOKEN, PATH_SIGIL, PROPERTY_TOKEN, SCOPE_TOKEN,
};
pub use scope::{FixedScope, Scope, SimpleScope, PAYLOAD_NAME};
pub use template::TemplateEnv;

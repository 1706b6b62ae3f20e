//! Path resolvers
//!
//! A fully qualified path has the form `$<token><rest>`: `$.name.field`
//! (token `.`), `$env[HOME]` (token `env`), `$property[app.version]`
//! (token `property`). The [`CompositeResolver`] dispatches on the token;
//! a path without the `$` sigil goes to the resolver registered for `.`.
//!
//! All resolvers in this module are read-only: none of them writes into the
//! scope it is given.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde_json::{Map, Value};
use tracing::trace;

use crate::error::{DataError, DataResult};
use crate::path::{self, PathSegment};
use crate::scope::Scope;

/// Sigil marking a resolvable path
pub const PATH_SIGIL: char = '$';

/// Token of the scope-relative resolver, also the default
pub const SCOPE_TOKEN: &str = ".";

/// Token of the environment variable resolver
pub const ENV_TOKEN: &str = "env";

/// Token of the application property resolver
pub const PROPERTY_TOKEN: &str = "property";

/// Strategy extracting a value for a path
pub trait Resolver: Send + Sync + fmt::Debug {
    /// Resolve `path` against `scope`
    fn resolve(&self, path: &str, scope: &dyn Scope) -> DataResult<Value>;

    /// Check at construction time that `path` can be handled
    fn validate(&self, _path: &str) -> DataResult<()> {
        Ok(())
    }
}

/// Dispatches to a registered resolver based on the path token
#[derive(Debug, Clone, Default)]
pub struct CompositeResolver {
    resolvers: HashMap<String, Arc<dyn Resolver>>,
}

impl CompositeResolver {
    /// Create a resolver from a token → resolver registry
    pub fn new(resolvers: HashMap<String, Arc<dyn Resolver>>) -> Self {
        Self { resolvers }
    }

    /// Empty resolver, populated with [`with`](Self::with)
    pub fn builder() -> Self {
        Self::default()
    }

    /// Resolver with the scope (`.`) and environment (`env`) resolvers registered
    pub fn standard() -> Self {
        Self::builder()
            .with(SCOPE_TOKEN, ScopeResolver)
            .with(ENV_TOKEN, EnvResolver::new())
    }

    /// Register a resolver for a token, replacing any previous one
    pub fn with(mut self, token: impl Into<String>, resolver: impl Resolver + 'static) -> Self {
        self.resolvers.insert(token.into(), Arc::new(resolver));
        self
    }

    pub fn tokens(&self) -> impl Iterator<Item = &str> {
        self.resolvers.keys().map(String::as_str)
    }

    /// Find the resolver for `path` and the remainder it should receive
    fn dispatch<'p>(&self, path: &'p str) -> DataResult<(&Arc<dyn Resolver>, &'p str)> {
        let (token, rest) = split_token(path)?;

        let resolver = self.resolvers.get(token).ok_or_else(|| {
            if path.starts_with(PATH_SIGIL) {
                DataError::unresolvable(path, format!("no resolver registered for '{}'", token))
            } else {
                DataError::unresolvable(path, "no default resolver registered")
            }
        })?;

        trace!(path, token, "Dispatching path");
        Ok((resolver, rest))
    }
}

impl Resolver for CompositeResolver {
    fn resolve(&self, path: &str, scope: &dyn Scope) -> DataResult<Value> {
        let (resolver, rest) = self.dispatch(path)?;
        resolver.resolve(rest, scope)
    }

    fn validate(&self, path: &str) -> DataResult<()> {
        let (resolver, rest) = self.dispatch(path)?;
        resolver.validate(rest)
    }
}

/// Split a path into its resolver token and the remainder
///
/// `$.a.b` → (`.`, `a.b`), `$env[HOME]` → (`env`, `[HOME]`),
/// `a.b` → (`.`, `a.b`).
pub fn split_token(path: &str) -> DataResult<(&str, &str)> {
    let Some(rest) = path.strip_prefix(PATH_SIGIL) else {
        return Ok((SCOPE_TOKEN, path));
    };

    if let Some(rest) = rest.strip_prefix('.') {
        return Ok((SCOPE_TOKEN, rest));
    }

    let end = rest.find(&['.', '['][..]).unwrap_or(rest.len());
    let token = &rest[..end];
    if token.is_empty() {
        return Err(DataError::invalid_path(path, "missing resolver token"));
    }
    Ok((token, &rest[end..]))
}

/// Resolves paths against the supplied scope
///
/// The first segment names a scope value; remaining segments walk into it.
#[derive(Debug, Clone, Copy, Default)]
pub struct ScopeResolver;

impl ScopeResolver {
    fn segments(path: &str) -> DataResult<(String, Vec<PathSegment>)> {
        let mut segments = path::parse(path)?;
        if segments.is_empty() {
            return Err(DataError::invalid_path(path, "missing scope name"));
        }
        let name = segments.remove(0).as_key();
        Ok((name, segments))
    }
}

impl Resolver for ScopeResolver {
    fn resolve(&self, path: &str, scope: &dyn Scope) -> DataResult<Value> {
        let (name, segments) = Self::segments(path)?;

        let root = scope
            .get_value(&name)
            .ok_or_else(|| DataError::NotFound(name.clone()))?;

        path::get(&root, &segments)
            .cloned()
            .ok_or_else(|| DataError::NotFound(path.to_string()))
    }

    fn validate(&self, path: &str) -> DataResult<()> {
        Self::segments(path).map(|_| ())
    }
}

type EnvLookup = dyn Fn(&str) -> Option<String> + Send + Sync;

/// Resolves `$env[NAME]` / `$env.NAME` to environment variables
#[derive(Clone)]
pub struct EnvResolver {
    lookup: Arc<EnvLookup>,
}

impl EnvResolver {
    /// Resolver reading the process environment
    pub fn new() -> Self {
        Self::with_lookup(|name| std::env::var(name).ok())
    }

    /// Resolver reading from a custom lookup
    pub fn with_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String> + Send + Sync + 'static,
    {
        Self {
            lookup: Arc::new(lookup),
        }
    }

    fn name(path: &str) -> DataResult<String> {
        match path::parse(path)?.as_slice() {
            [segment] => Ok(segment.as_key()),
            _ => Err(DataError::invalid_path(path, "expected a single variable name")),
        }
    }
}

impl Default for EnvResolver {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for EnvResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EnvResolver").finish_non_exhaustive()
    }
}

impl Resolver for EnvResolver {
    fn resolve(&self, path: &str, _scope: &dyn Scope) -> DataResult<Value> {
        let name = Self::name(path)?;
        (self.lookup)(&name)
            .map(Value::String)
            .ok_or(DataError::NotFound(name))
    }

    fn validate(&self, path: &str) -> DataResult<()> {
        Self::name(path).map(|_| ())
    }
}

/// Resolves `$property[name]` against immutable application properties
///
/// Property names may contain dots when written in brackets; further
/// segments walk into the property value.
#[derive(Debug, Clone, Default)]
pub struct PropertyResolver {
    properties: Arc<Map<String, Value>>,
}

impl PropertyResolver {
    pub fn new(properties: Map<String, Value>) -> Self {
        Self {
            properties: Arc::new(properties),
        }
    }
}

impl Resolver for PropertyResolver {
    fn resolve(&self, path: &str, _scope: &dyn Scope) -> DataResult<Value> {
        let (name, segments) = ScopeResolver::segments(path)?;

        let root = self
            .properties
            .get(&name)
            .ok_or_else(|| DataError::NotFound(name.clone()))?;

        path::get(root, &segments)
            .cloned()
            .ok_or_else(|| DataError::NotFound(path.to_string()))
    }

    fn validate(&self, path: &str) -> DataResult<()> {
        ScopeResolver::segments(path).map(|_| ())
    }
}

//! Object and merge mappers
//!
//! A [`Mapper`] projects a scope into a flat map of named fields, each field
//! backed by an [`ObjectMapper`] tree. Templates are JSON-shaped values:
//!
//! ```json
//! {
//!   "id": "=$.order.id",
//!   "summary": "Order {{ order.id }} for {{ customer }}",
//!   "tags": {"@merge": ["new", "=$.order.tags"]}
//! }
//! ```

mod merge;
mod object;

pub use merge::{MergeMapper, MERGE};
pub use object::ObjectMapper;

use std::sync::Arc;

use indexmap::IndexMap;
use serde_json::{Map, Value};
use tracing::trace;

use crate::error::{DataError, DataResult};
use crate::expression::ExpressionFactory;
use crate::metadata::IOMetadata;
use crate::resolve::Resolver;
use crate::scope::Scope;

/// Builds [`Mapper`]s sharing one expression factory
#[derive(Debug, Clone)]
pub struct MapperFactory {
    exprs: ExpressionFactory,
}

impl MapperFactory {
    pub fn new(resolver: Arc<dyn Resolver>) -> Self {
        Self::from_expression_factory(ExpressionFactory::new(resolver))
    }

    pub fn from_expression_factory(exprs: ExpressionFactory) -> Self {
        Self { exprs }
    }

    pub fn expression_factory(&self) -> &ExpressionFactory {
        &self.exprs
    }

    /// Compile a mapping template; an empty template yields no mapper
    pub fn new_mapper(&self, template: &Map<String, Value>) -> DataResult<Option<Mapper>> {
        if template.is_empty() {
            return Ok(None);
        }
        if template.contains_key(MERGE) {
            return Err(DataError::InvalidTemplate(format!(
                "'{}' cannot be used as a top-level field",
                MERGE
            )));
        }

        let fields = template
            .iter()
            .map(|(k, v)| Ok((k.clone(), ObjectMapper::new(v, &self.exprs)?)))
            .collect::<DataResult<IndexMap<_, _>>>()?;

        trace!(fields = fields.len(), "Compiled mapper");
        Ok(Some(Mapper { fields }))
    }
}

/// A compiled field mapping
#[derive(Debug, Clone)]
pub struct Mapper {
    fields: IndexMap<String, ObjectMapper>,
}

impl Mapper {
    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    /// Evaluate every field against `scope`
    pub fn apply(&self, scope: &dyn Scope) -> DataResult<Map<String, Value>> {
        let mut out = Map::with_capacity(self.fields.len());
        for (name, mapper) in &self.fields {
            out.insert(name.clone(), mapper.eval(scope)?);
        }
        Ok(out)
    }

    /// Evaluate, then coerce to the declared input types of `metadata`
    pub fn apply_with(
        &self,
        scope: &dyn Scope,
        metadata: &IOMetadata,
    ) -> DataResult<Map<String, Value>> {
        metadata.coerce_inputs(self.apply(scope)?)
    }
}

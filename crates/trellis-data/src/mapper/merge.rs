use serde_json::Value;
use tracing::debug;

use super::object::ObjectMapper;
use crate::error::DataResult;
use crate::expression::ExpressionFactory;
use crate::scope::Scope;

/// Key marking a merge in a mapping template: `{"@merge": [...]}`
pub const MERGE: &str = "@merge";

/// Concatenates the results of several sub-mappers into one sequence
///
/// A sub-result that is a sequence is spliced element by element; anything
/// else, `null` included, is appended as a single element. Splicing is
/// exactly one level deep: sequences nested inside a spliced sequence stay
/// nested.
#[derive(Debug, Clone)]
pub struct MergeMapper {
    mappers: Vec<ObjectMapper>,
}

impl MergeMapper {
    /// Compile every element of a merge sequence
    pub fn new(items: &[Value], factory: &ExpressionFactory) -> DataResult<Self> {
        let mappers = items
            .iter()
            .map(|item| ObjectMapper::new(item, factory))
            .collect::<DataResult<Vec<_>>>()?;
        Ok(Self { mappers })
    }

    pub fn len(&self) -> usize {
        self.mappers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mappers.is_empty()
    }

    /// Evaluate in order; the first failure is returned with no partial result
    pub fn eval(&self, scope: &dyn Scope) -> DataResult<Value> {
        let mut merged = Vec::with_capacity(self.mappers.len());

        for (position, mapper) in self.mappers.iter().enumerate() {
            match mapper.eval(scope) {
                Ok(Value::Array(items)) => merged.extend(items),
                Ok(value) => merged.push(value),
                Err(e) => {
                    debug!(position, error = %e, "Merge element failed");
                    return Err(e);
                }
            }
        }

        Ok(Value::Array(merged))
    }
}

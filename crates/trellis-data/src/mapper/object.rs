use indexmap::IndexMap;
use serde_json::{Map, Value};

use super::merge::{MergeMapper, MERGE};
use crate::error::{DataError, DataResult};
use crate::expression::{Expr, ExpressionFactory};
use crate::scope::Scope;

/// A compiled template tree
///
/// The shape of the template is decided once at construction; evaluation
/// rebuilds the same shape with every expression leaf replaced by its value.
#[derive(Debug, Clone)]
pub enum ObjectMapper {
    Literal(Value),
    Expr(Expr),
    Mapping(IndexMap<String, ObjectMapper>),
    Sequence(Vec<ObjectMapper>),
}

impl ObjectMapper {
    /// Compile a template value
    pub fn new(template: &Value, factory: &ExpressionFactory) -> DataResult<Self> {
        match template {
            Value::String(s) => Ok(match factory.compile_string(s)? {
                Some(expr) => ObjectMapper::Expr(expr),
                None => ObjectMapper::Literal(template.clone()),
            }),
            Value::Object(map) if map.contains_key(MERGE) => {
                let items = merge_items(map)?;
                Ok(ObjectMapper::Expr(Expr::Merge(MergeMapper::new(items, factory)?)))
            }
            Value::Object(map) => {
                let fields = map
                    .iter()
                    .map(|(k, v)| Ok((k.clone(), ObjectMapper::new(v, factory)?)))
                    .collect::<DataResult<IndexMap<_, _>>>()?;
                Ok(ObjectMapper::Mapping(fields))
            }
            Value::Array(items) => {
                let items = items
                    .iter()
                    .map(|v| ObjectMapper::new(v, factory))
                    .collect::<DataResult<Vec<_>>>()?;
                Ok(ObjectMapper::Sequence(items))
            }
            other => Ok(ObjectMapper::Literal(other.clone())),
        }
    }

    /// Evaluate against `scope`; any failing leaf fails the whole tree
    pub fn eval(&self, scope: &dyn Scope) -> DataResult<Value> {
        match self {
            ObjectMapper::Literal(value) => Ok(value.clone()),
            ObjectMapper::Expr(expr) => expr.eval(scope),
            ObjectMapper::Mapping(fields) => {
                let mut out = Map::with_capacity(fields.len());
                for (key, mapper) in fields {
                    out.insert(key.clone(), mapper.eval(scope)?);
                }
                Ok(Value::Object(out))
            }
            ObjectMapper::Sequence(items) => items
                .iter()
                .map(|m| m.eval(scope))
                .collect::<DataResult<Vec<_>>>()
                .map(Value::Array),
        }
    }

    /// True when no leaf depends on the scope
    pub fn is_literal(&self) -> bool {
        match self {
            ObjectMapper::Literal(_) => true,
            ObjectMapper::Expr(expr) => expr.is_literal(),
            ObjectMapper::Mapping(fields) => fields.values().all(ObjectMapper::is_literal),
            ObjectMapper::Sequence(items) => items.iter().all(ObjectMapper::is_literal),
        }
    }
}

/// Extract the sequence under a `@merge` marker
fn merge_items(map: &Map<String, Value>) -> DataResult<&[Value]> {
    if map.len() != 1 {
        return Err(DataError::InvalidTemplate(format!(
            "'{}' must be the only key of its mapping",
            MERGE
        )));
    }
    match map.get(MERGE) {
        Some(Value::Array(items)) => Ok(items),
        _ => Err(DataError::InvalidTemplate(format!(
            "'{}' expects a sequence",
            MERGE
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolve::CompositeResolver;
    use crate::scope::SimpleScope;
    use serde_json::json;
    use std::sync::Arc;

    fn factory() -> ExpressionFactory {
        ExpressionFactory::new(Arc::new(CompositeResolver::standard()))
    }

    #[test]
    fn test_nested_template() {
        let template = json!({
            "id": "=$.order.id",
            "kind": "order",
            "lines": [{"sku": "=$.order.items[0].sku", "qty": 1}, "static"],
            "greeting": "Hi {{ customer }}"
        });
        let mapper = ObjectMapper::new(&template, &factory()).unwrap();
        assert!(!mapper.is_literal());

        let scope = SimpleScope::from_value(json!({
            "customer": "ada",
            "order": {"id": 7, "items": [{"sku": "a1"}]}
        }));
        assert_eq!(
            mapper.eval(&scope).unwrap(),
            json!({
                "id": 7,
                "kind": "order",
                "lines": [{"sku": "a1", "qty": 1}, "static"],
                "greeting": "Hi ada"
            })
        );
    }

    #[test]
    fn test_key_order_preserved() {
        let template = json!({"z": 1, "a": "=$.x", "m": 3});
        let mapper = ObjectMapper::new(&template, &factory()).unwrap();
        let scope = SimpleScope::new().with_value("x", json!(2));

        let out = mapper.eval(&scope).unwrap();
        let keys: Vec<_> = out.as_object().unwrap().keys().cloned().collect();
        assert_eq!(keys, ["z", "a", "m"]);
    }

    #[test]
    fn test_failure_is_atomic() {
        let template = json!({"ok": "=$.x", "nested": {"bad": "=$.missing"}});
        let mapper = ObjectMapper::new(&template, &factory()).unwrap();
        let scope = SimpleScope::new().with_value("x", json!(1));

        assert!(matches!(mapper.eval(&scope), Err(DataError::NotFound(_))));
    }

    #[test]
    fn test_merge_marker_shape() {
        let f = factory();
        assert!(matches!(
            ObjectMapper::new(&json!({"@merge": "=$.x"}), &f),
            Err(DataError::InvalidTemplate(_))
        ));
        assert!(matches!(
            ObjectMapper::new(&json!({"@merge": [], "other": 1}), &f),
            Err(DataError::InvalidTemplate(_))
        ));

        let nested = json!({"all": {"@merge": ["=$.a", ["=$.b"]]}});
        let mapper = ObjectMapper::new(&nested, &f).unwrap();
        let scope = SimpleScope::new()
            .with_value("a", json!(1))
            .with_value("b", json!(2));
        assert_eq!(mapper.eval(&scope).unwrap(), json!({"all": [1, 2]}));
    }

    #[test]
    fn test_literals_are_verbatim() {
        let template = json!({"n": 1.5, "b": false, "s": "$.not_an_expression", "z": null});
        let mapper = ObjectMapper::new(&template, &factory()).unwrap();
        assert!(mapper.is_literal());
        assert_eq!(mapper.eval(&SimpleScope::new()).unwrap(), template);
    }
}

//! Declared input/output attributes and type coercion

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};

use crate::error::{DataError, DataResult};

/// Declared type of an attribute
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataType {
    #[default]
    Any,
    String,
    #[serde(alias = "int", alias = "long")]
    Integer,
    #[serde(alias = "number", alias = "double")]
    Float,
    #[serde(alias = "bool")]
    Boolean,
    #[serde(alias = "map", alias = "params")]
    Object,
    Array,
}

impl DataType {
    /// Convert `value` to this type; `null` is left unchanged
    pub fn coerce(&self, value: Value) -> DataResult<Value> {
        if value.is_null() {
            return Ok(value);
        }

        let coerced = match (self, &value) {
            (DataType::Any, _) => Some(value.clone()),

            (DataType::String, Value::String(_)) => Some(value.clone()),
            (DataType::String, Value::Number(n)) => Some(Value::String(n.to_string())),
            (DataType::String, Value::Bool(b)) => Some(Value::String(b.to_string())),
            (DataType::String, Value::Object(_) | Value::Array(_)) => {
                serde_json::to_string(&value).ok().map(Value::String)
            }

            (DataType::Integer, Value::Number(n)) => to_integer(n),
            (DataType::Integer, Value::String(s)) => {
                let s = s.trim();
                s.parse::<i64>()
                    .ok()
                    .map(Value::from)
                    .or_else(|| s.parse::<f64>().ok().and_then(float_to_integer))
            }
            (DataType::Integer, Value::Bool(b)) => Some(Value::from(i64::from(*b))),

            (DataType::Float, Value::Number(n)) => n.as_f64().and_then(Number::from_f64).map(Value::Number),
            (DataType::Float, Value::String(s)) => s
                .trim()
                .parse::<f64>()
                .ok()
                .and_then(Number::from_f64)
                .map(Value::Number),
            (DataType::Float, Value::Bool(b)) => Number::from_f64(if *b { 1.0 } else { 0.0 }).map(Value::Number),

            (DataType::Boolean, Value::Bool(_)) => Some(value.clone()),
            (DataType::Boolean, Value::String(s)) => match s.trim().to_lowercase().as_str() {
                "true" | "yes" | "on" | "1" => Some(Value::Bool(true)),
                "false" | "no" | "off" | "0" | "" => Some(Value::Bool(false)),
                _ => None,
            },
            (DataType::Boolean, Value::Number(n)) => n.as_f64().map(|f| Value::Bool(f != 0.0)),

            (DataType::Object, Value::Object(_)) => Some(value.clone()),
            (DataType::Object, Value::String(s)) => serde_json::from_str::<Value>(s)
                .ok()
                .filter(Value::is_object),

            (DataType::Array, Value::Array(_)) => Some(value.clone()),
            (DataType::Array, Value::String(s)) => serde_json::from_str::<Value>(s)
                .ok()
                .filter(Value::is_array),

            _ => None,
        };

        coerced.ok_or_else(|| DataError::Coercion {
            value: value.to_string(),
            data_type: self.to_string(),
        })
    }
}

fn to_integer(n: &Number) -> Option<Value> {
    if n.is_i64() || n.is_u64() {
        return Some(Value::Number(n.clone()));
    }
    n.as_f64().and_then(float_to_integer)
}

fn float_to_integer(f: f64) -> Option<Value> {
    (f.fract() == 0.0 && f.is_finite()).then(|| Value::from(f as i64))
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DataType::Any => "any",
            DataType::String => "string",
            DataType::Integer => "integer",
            DataType::Float => "float",
            DataType::Boolean => "boolean",
            DataType::Object => "object",
            DataType::Array => "array",
        };
        f.write_str(name)
    }
}

impl FromStr for DataType {
    type Err = DataError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        serde_json::from_value(Value::String(s.to_lowercase())).map_err(|_| DataError::Coercion {
            value: s.to_string(),
            data_type: "type name".to_string(),
        })
    }
}

/// A named, typed attribute with an optional default value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attribute {
    pub name: String,
    #[serde(rename = "type", default)]
    pub data_type: DataType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
}

impl Attribute {
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            data_type,
            value: None,
        }
    }

    pub fn with_default(mut self, value: Value) -> Self {
        self.value = Some(value);
        self
    }
}

/// Declared inputs and outputs of an action
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IOMetadata {
    #[serde(default)]
    pub input: Vec<Attribute>,
    #[serde(default)]
    pub output: Vec<Attribute>,
}

impl IOMetadata {
    pub fn input(&self, name: &str) -> Option<&Attribute> {
        self.input.iter().find(|a| a.name == name)
    }

    pub fn output(&self, name: &str) -> Option<&Attribute> {
        self.output.iter().find(|a| a.name == name)
    }

    /// Coerce declared inputs and fill in defaults; undeclared fields are kept
    pub fn coerce_inputs(&self, values: Map<String, Value>) -> DataResult<Map<String, Value>> {
        coerce_attributes(&self.input, values)
    }

    /// Coerce declared outputs and fill in defaults; undeclared fields are kept
    pub fn coerce_outputs(&self, values: Map<String, Value>) -> DataResult<Map<String, Value>> {
        coerce_attributes(&self.output, values)
    }

    /// Keep only declared inputs, coerced, with defaults for missing ones
    pub fn filter_inputs(&self, values: &Map<String, Value>) -> DataResult<Map<String, Value>> {
        let declared = values
            .iter()
            .filter(|(k, _)| self.input(k).is_some())
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        self.coerce_inputs(declared)
    }
}

fn coerce_attributes(
    attrs: &[Attribute],
    mut values: Map<String, Value>,
) -> DataResult<Map<String, Value>> {
    for attr in attrs {
        match values.get_mut(&attr.name) {
            Some(slot) => {
                let value = std::mem::take(slot);
                *slot = attr.data_type.coerce(value)?;
            }
            None => {
                if let Some(default) = &attr.value {
                    values.insert(attr.name.clone(), default.clone());
                }
            }
        }
    }
    Ok(values)
}

//! Template expressions backed by minijinja
//!
//! Provides the environment used by `=`-expressions that are neither paths
//! nor literals (e.g. `=count * 2`, `=name ~ '-' ~ suffix`) and by
//! interpolated strings (`"Hello {{ name }}"`). Undefined names are errors,
//! matching path resolution.

use minijinja::{Environment, Error, ErrorKind, UndefinedBehavior, Value as TemplateValue};
use serde_json::{Map, Value};
use tracing::trace;

use crate::error::{DataError, DataResult};

const INLINE_TEMPLATE: &str = "inline";

/// Template environment shared by every expression of a factory
pub struct TemplateEnv {
    env: Environment<'static>,
}

impl TemplateEnv {
    /// Create an environment with the standard filters registered
    pub fn new() -> Self {
        let mut env = Environment::new();
        env.set_undefined_behavior(UndefinedBehavior::Strict);

        env.add_filter("to_json", to_json);
        env.add_filter("from_json", from_json);
        env.add_filter("int", to_int);
        env.add_filter("float", to_float);
        env.add_filter("bool", to_bool);

        Self { env }
    }

    /// Check if a string contains template syntax
    pub fn is_template(s: &str) -> bool {
        s.contains("{{") || s.contains("{%") || s.contains("{#")
    }

    /// Check that `source` compiles as an expression
    pub fn check_expression(&self, source: &str) -> DataResult<()> {
        self.env
            .compile_expression_owned(source.to_string())
            .map(|_| ())
            .map_err(|e| invalid(source, e))
    }

    /// Parse `source` once into a template bound to this environment
    pub fn compile_template(&self, source: &str) -> DataResult<CompiledTemplate> {
        let mut env = self.env.clone();
        env.add_template_owned(INLINE_TEMPLATE, source.to_string())
            .map_err(|e| invalid(source, e))?;
        Ok(CompiledTemplate {
            source: source.to_string(),
            env,
        })
    }

    /// Evaluate an expression with `vars` as its context
    pub fn eval_expression(&self, source: &str, vars: &Map<String, Value>) -> DataResult<Value> {
        trace!(expression = source, "Evaluating template expression");
        let expr = self
            .env
            .compile_expression_owned(source.to_string())
            .map_err(|e| invalid(source, e))?;
        let result = expr.eval(vars).map_err(render_error)?;
        to_json_value(&result)
    }
}

impl Default for TemplateEnv {
    fn default() -> Self {
        Self::new()
    }
}

/// A parsed interpolation template
pub struct CompiledTemplate {
    source: String,
    env: Environment<'static>,
}

impl CompiledTemplate {
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Render with `vars` as the context
    pub fn render(&self, vars: &Map<String, Value>) -> DataResult<String> {
        trace!(template = %self.source, "Rendering template");
        self.env
            .get_template(INLINE_TEMPLATE)
            .and_then(|template| template.render(vars))
            .map_err(render_error)
    }
}

impl std::fmt::Debug for CompiledTemplate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompiledTemplate")
            .field("source", &self.source)
            .finish_non_exhaustive()
    }
}

impl std::fmt::Debug for TemplateEnv {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TemplateEnv").finish_non_exhaustive()
    }
}

fn invalid(source: &str, err: Error) -> DataError {
    DataError::InvalidExpression {
        expr: source.to_string(),
        reason: err.to_string(),
    }
}

fn render_error(err: Error) -> DataError {
    DataError::Template(err.to_string())
}

fn to_json_value(value: &TemplateValue) -> DataResult<Value> {
    if value.is_undefined() {
        return Ok(Value::Null);
    }
    serde_json::to_value(value).map_err(|e| DataError::Template(e.to_string()))
}

// --- Filters ---

fn to_json(value: TemplateValue, pretty: Option<bool>) -> Result<String, Error> {
    let json = serde_json::to_value(&value)
        .map_err(|e| Error::new(ErrorKind::InvalidOperation, format!("JSON error: {}", e)))?;
    if pretty.unwrap_or(false) {
        serde_json::to_string_pretty(&json)
    } else {
        serde_json::to_string(&json)
    }
    .map_err(|e| Error::new(ErrorKind::InvalidOperation, format!("JSON error: {}", e)))
}

fn from_json(value: &str) -> Result<TemplateValue, Error> {
    let json: Value = serde_json::from_str(value)
        .map_err(|e| Error::new(ErrorKind::InvalidOperation, format!("invalid JSON: {}", e)))?;
    Ok(TemplateValue::from_serialize(&json))
}

fn value_to_f64(value: &TemplateValue) -> Option<f64> {
    f64::try_from(value.clone())
        .ok()
        .or_else(|| value.as_i64().map(|i| i as f64))
}

fn to_int(value: TemplateValue, default: Option<i64>) -> TemplateValue {
    let parsed = value.as_i64().or_else(|| value_to_f64(&value).map(|f| f as i64)).or_else(|| {
        value.as_str().and_then(|s| {
            let s = s.trim();
            s.parse::<i64>()
                .ok()
                .or_else(|| s.parse::<f64>().ok().map(|f| f as i64))
        })
    });
    TemplateValue::from(parsed.unwrap_or(default.unwrap_or(0)))
}

fn to_float(value: TemplateValue, default: Option<f64>) -> TemplateValue {
    let parsed = value_to_f64(&value)
        .or_else(|| value.as_str().and_then(|s| s.trim().parse::<f64>().ok()));
    TemplateValue::from(parsed.unwrap_or(default.unwrap_or(0.0)))
}

fn to_bool(value: TemplateValue) -> bool {
    if value.is_undefined() || value.is_none() {
        return false;
    }
    if let Some(s) = value.as_str() {
        return matches!(
            s.trim().to_lowercase().as_str(),
            "true" | "yes" | "on" | "1" | "enable" | "enabled"
        );
    }
    value.is_true()
}

//! Compiled expressions and the factory producing them
//!
//! Expression strings are compiled once into an [`Expr`] and evaluated many
//! times. Accepted forms:
//!
//! - `=$.order.id`, `=$env[HOME]`: a path resolved through the resolver chain
//! - `=42`, `="text"`, `=[1, 2]`: a JSON literal
//! - `=count * 2`, `=$.total > 100`: a template expression over the scope's
//!   variables, where `$.name` reads the same as `name`
//! - `Hello {{ name }}`: string interpolation
//!
//! Any other string is not an expression; object mappers keep it verbatim.

use std::sync::Arc;

use serde_json::Value;
use tracing::trace;

use crate::error::{DataError, DataResult};
use crate::mapper::{MergeMapper, ObjectMapper};
use crate::resolve::{Resolver, PATH_SIGIL};
use crate::scope::Scope;
use crate::template::{CompiledTemplate, TemplateEnv};

/// Marker introducing an expression in a template string
pub const EXPR_PREFIX: char = '=';

/// A compiled, immutable expression
#[derive(Debug, Clone)]
pub enum Expr {
    /// Constant value
    Literal(Value),
    /// Path resolved through the factory's resolver
    Path {
        path: String,
        resolver: Arc<dyn Resolver>,
    },
    /// Template expression evaluated over `Scope::variables`
    Template {
        source: String,
        templates: Arc<TemplateEnv>,
    },
    /// String interpolation, always yields a string
    Render(Arc<CompiledTemplate>),
    /// Nested mapping or sequence template
    Object(Box<ObjectMapper>),
    /// One-level splice of several sub-results
    Merge(MergeMapper),
}

impl Expr {
    /// Evaluate against `scope`
    pub fn eval(&self, scope: &dyn Scope) -> DataResult<Value> {
        match self {
            Expr::Literal(value) => Ok(value.clone()),
            Expr::Path { path, resolver } => {
                trace!(path = %path, "Resolving path expression");
                resolver.resolve(path, scope)
            }
            Expr::Template { source, templates } => {
                templates.eval_expression(source, &scope.variables())
            }
            Expr::Render(template) => template.render(&scope.variables()).map(Value::String),
            Expr::Object(mapper) => mapper.eval(scope),
            Expr::Merge(merge) => merge.eval(scope),
        }
    }

    pub fn is_literal(&self) -> bool {
        matches!(self, Expr::Literal(_))
    }
}

/// Builds expressions bound to one resolver chain
#[derive(Debug, Clone)]
pub struct ExpressionFactory {
    resolver: Arc<dyn Resolver>,
    templates: Arc<TemplateEnv>,
}

impl ExpressionFactory {
    pub fn new(resolver: Arc<dyn Resolver>) -> Self {
        Self::with_templates(resolver, Arc::new(TemplateEnv::new()))
    }

    /// Factory sharing an existing template environment
    pub fn with_templates(resolver: Arc<dyn Resolver>, templates: Arc<TemplateEnv>) -> Self {
        Self {
            resolver,
            templates,
        }
    }

    pub fn resolver(&self) -> &Arc<dyn Resolver> {
        &self.resolver
    }

    pub fn templates(&self) -> &Arc<TemplateEnv> {
        &self.templates
    }

    /// Check whether a template string denotes an expression
    pub fn is_expression(s: &str) -> bool {
        s.starts_with(EXPR_PREFIX) || TemplateEnv::is_template(s)
    }

    /// Compile an expression; the leading `=` is optional
    ///
    /// Used for conditions, where the whole string is always an expression.
    pub fn new_expr(&self, text: &str) -> DataResult<Expr> {
        let text = text.trim();

        if TemplateEnv::is_template(text) && !text.starts_with(EXPR_PREFIX) {
            let template = self.templates.compile_template(text)?;
            return Ok(Expr::Render(Arc::new(template)));
        }

        let body = text.strip_prefix(EXPR_PREFIX).unwrap_or(text).trim();

        if body.starts_with(PATH_SIGIL) {
            match self.resolver.validate(body) {
                Ok(()) => {
                    return Ok(Expr::Path {
                        path: body.to_string(),
                        resolver: self.resolver.clone(),
                    })
                }
                Err(err) if !has_operator(body) => return Err(err),
                Err(_) => {}
            }
        }

        if let Ok(value) = serde_json::from_str::<Value>(body) {
            return Ok(Expr::Literal(value));
        }

        let source = lower_scope_paths(body)?;
        self.templates.check_expression(&source)?;
        Ok(Expr::Template {
            source,
            templates: self.templates.clone(),
        })
    }

    /// Compile a template string, or `None` if it is a plain literal
    pub fn compile_string(&self, s: &str) -> DataResult<Option<Expr>> {
        if Self::is_expression(s) {
            self.new_expr(s).map(Some)
        } else {
            Ok(None)
        }
    }

    /// Compile any template value into an expression
    pub fn compile_value(&self, template: &Value) -> DataResult<Expr> {
        Ok(match ObjectMapper::new(template, self)? {
            ObjectMapper::Literal(value) => Expr::Literal(value),
            ObjectMapper::Expr(expr) => expr,
            mapper => Expr::Object(Box::new(mapper)),
        })
    }
}

/// Whether `body` has whitespace or an operator outside string literals
fn has_operator(body: &str) -> bool {
    let mut quote = None;
    for c in body.chars() {
        match quote {
            Some(q) if c == q => quote = None,
            Some(_) => {}
            None if c == '\'' || c == '"' => quote = Some(c),
            None if c.is_whitespace() || "+*/%<>=!~|(),".contains(c) => return true,
            None => {}
        }
    }
    false
}

/// Rewrite `$.name` scope paths to plain variable access
fn lower_scope_paths(body: &str) -> DataResult<String> {
    let unsupported = || DataError::InvalidExpression {
        expr: body.to_string(),
        reason: "only `$.` scope paths may appear inside an operator expression".to_string(),
    };

    let mut out = String::with_capacity(body.len());
    let mut quote = None;
    let mut prev: Option<char> = None;
    let mut chars = body.chars().peekable();
    while let Some(c) = chars.next() {
        match quote {
            Some(q) => {
                if c == q && prev != Some('\\') {
                    quote = None;
                }
                out.push(c);
            }
            None if c == '\'' || c == '"' => {
                quote = Some(c);
                out.push(c);
            }
            None if c == PATH_SIGIL => {
                if prev.is_some_and(|p| p.is_alphanumeric() || p == '_') {
                    return Err(unsupported());
                }
                if chars.next() != Some('.') {
                    return Err(unsupported());
                }
                match chars.peek() {
                    Some(&n) if n.is_alphabetic() || n == '_' => {}
                    _ => return Err(unsupported()),
                }
            }
            None => out.push(c),
        }
        prev = Some(c);
    }
    Ok(out)
}

//! Reference expressions embedded in manifest strings.
//!
//! A string is parsed once into a [`Template`]: an ordered sequence of
//! literal text and expressions. Two expression forms exist:
//!
//! - `${ref:<component>.<dotted.path>}` refers to another component's
//!   configuration (or provided capability data).
//! - `${env:<key>}` refers to `environments.<env>.defaults.<key>`.
//!
//! Any other `${...}` sequence (e.g. `${AWS::Region}`) is kept as literal
//! text so it can flow through to the synthesizer untouched.

use crate::path::DocPath;
use serde_json::Value;
use std::fmt;
use thiserror::Error;

const OPEN: &str = "${";
const REF_PREFIX: &str = "ref:";
const ENV_PREFIX: &str = "env:";

/// `${ref:component.path}` after parsing.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RefExpr {
    pub component: String,
    /// Attribute path below the component; never empty.
    pub path: Vec<String>,
}

impl RefExpr {
    pub fn dotted_path(&self) -> String {
        self.path.join(".")
    }
}

/// A parsed expression.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Expression {
    Ref(RefExpr),
    Env(String),
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expression::Ref(r) => write!(f, "${{ref:{}.{}}}", r.component, r.dotted_path()),
            Expression::Env(key) => write!(f, "${{env:{}}}", key),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    Literal(String),
    Expr(Expression),
}

/// Errors raised while parsing an expression.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExprError {
    #[error("unterminated expression starting at '{0}'")]
    Unterminated(String),

    #[error("reference '{0}' must be of the form ${{ref:<component>.<attribute.path>}}")]
    MalformedRef(String),

    #[error("environment expression '{0}' must name a key")]
    EmptyEnvKey(String),
}

/// Errors raised while rendering a template.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RenderError<E> {
    #[error("{0}")]
    Resolve(E),

    #[error("{expression} resolves to {kind}, which cannot be embedded in a larger string")]
    NotEmbeddable { expression: String, kind: &'static str },
}

/// A string split into literal and expression segments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    tokens: Vec<Token>,
}

impl Template {
    pub fn parse(input: &str) -> Result<Self, ExprError> {
        let mut tokens = Vec::new();
        let mut literal = String::new();
        let mut rest = input;

        while let Some(start) = rest.find(OPEN) {
            literal.push_str(&rest[..start]);
            let after_open = &rest[start + OPEN.len()..];
            let recognized = after_open.starts_with(REF_PREFIX) || after_open.starts_with(ENV_PREFIX);

            let Some(end) = after_open.find('}') else {
                if recognized {
                    return Err(ExprError::Unterminated(rest[start..].to_string()));
                }
                literal.push_str(&rest[start..]);
                rest = "";
                break;
            };

            let body = &after_open[..end];
            let raw = &rest[start..start + OPEN.len() + end + 1];
            match parse_body(body, raw)? {
                Some(expr) => {
                    if !literal.is_empty() {
                        tokens.push(Token::Literal(std::mem::take(&mut literal)));
                    }
                    tokens.push(Token::Expr(expr));
                }
                None => literal.push_str(raw),
            }
            rest = &after_open[end + 1..];
        }

        literal.push_str(rest);
        if !literal.is_empty() {
            tokens.push(Token::Literal(literal));
        }
        Ok(Self { tokens })
    }

    pub fn tokens(&self) -> &[Token] {
        &self.tokens
    }

    pub fn expressions(&self) -> impl Iterator<Item = &Expression> {
        self.tokens.iter().filter_map(|token| match token {
            Token::Expr(expr) => Some(expr),
            Token::Literal(_) => None,
        })
    }

    pub fn has_expressions(&self) -> bool {
        self.expressions().next().is_some()
    }

    /// True when the whole string is exactly one expression.
    pub fn single_expression(&self) -> Option<&Expression> {
        match self.tokens.as_slice() {
            [Token::Expr(expr)] => Some(expr),
            _ => None,
        }
    }

    /// Resolve every expression and rebuild the value.
    ///
    /// A string that is exactly one expression becomes the resolved value
    /// itself (any JSON type). Expressions embedded among literal text must
    /// resolve to scalars, which are rendered into the surrounding string.
    pub fn render<E>(
        &self,
        mut resolve: impl FnMut(&Expression) -> Result<Value, E>,
    ) -> Result<Value, RenderError<E>> {
        if let Some(expr) = self.single_expression() {
            return resolve(expr).map_err(RenderError::Resolve);
        }

        let mut out = String::new();
        for token in &self.tokens {
            match token {
                Token::Literal(text) => out.push_str(text),
                Token::Expr(expr) => {
                    let value = resolve(expr).map_err(RenderError::Resolve)?;
                    match value {
                        Value::String(s) => out.push_str(&s),
                        Value::Number(n) => out.push_str(&n.to_string()),
                        Value::Bool(b) => out.push_str(if b { "true" } else { "false" }),
                        Value::Null => {
                            return Err(RenderError::NotEmbeddable {
                                expression: expr.to_string(),
                                kind: "null",
                            });
                        }
                        Value::Array(_) => {
                            return Err(RenderError::NotEmbeddable {
                                expression: expr.to_string(),
                                kind: "an array",
                            });
                        }
                        Value::Object(_) => {
                            return Err(RenderError::NotEmbeddable {
                                expression: expr.to_string(),
                                kind: "an object",
                            });
                        }
                    }
                }
            }
        }
        Ok(Value::String(out))
    }
}

fn parse_body(body: &str, raw: &str) -> Result<Option<Expression>, ExprError> {
    if let Some(reference) = body.strip_prefix(REF_PREFIX) {
        let mut parts = reference.split('.');
        let component = parts.next().unwrap_or_default().trim();
        let path: Vec<String> = parts.map(|p| p.trim().to_string()).collect();
        if component.is_empty() || path.is_empty() || path.iter().any(String::is_empty) {
            return Err(ExprError::MalformedRef(raw.to_string()));
        }
        return Ok(Some(Expression::Ref(RefExpr {
            component: component.to_string(),
            path,
        })));
    }
    if let Some(key) = body.strip_prefix(ENV_PREFIX) {
        let key = key.trim();
        if key.is_empty() {
            return Err(ExprError::EmptyEnvKey(raw.to_string()));
        }
        return Ok(Some(Expression::Env(key.to_string())));
    }
    Ok(None)
}

/// Visit every string in `value`, depth first in document order.
pub fn walk_strings(value: &Value, path: &DocPath, visit: &mut impl FnMut(&DocPath, &str)) {
    match value {
        Value::String(s) => visit(path, s),
        Value::Array(items) => {
            for (index, item) in items.iter().enumerate() {
                walk_strings(item, &path.index(index), visit);
            }
        }
        Value::Object(map) => {
            for (key, child) in map {
                walk_strings(child, &path.key(key.clone()), visit);
            }
        }
        _ => {}
    }
}

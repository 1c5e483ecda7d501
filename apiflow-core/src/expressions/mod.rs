//! Condition language used by IF, FOR and FOR_EACH nodes and by assertions.
//!
//! Expressions are parsed once into an [`Expression`] and evaluated against a
//! JSON root map. The operator set is closed: paths, literals, comparisons,
//! `in`/`notin`, `&&`, `||`, `!` and parentheses.

mod eval;
mod lexer;
mod parser;
mod value;

use serde_json::Value as JsonValue;

pub use parser::{CmpOp, Expr, Path, PathSegment};
pub use value::Value;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExprError {
    #[error("PARSE_ERROR at {offset}: {message}")]
    Parse { offset: usize, message: String },
    #[error("LOOKUP_MISS: {0}")]
    LookupMiss(String),
    #[error("TYPE_ERROR: {0}")]
    Type(String),
}

impl ExprError {
    pub fn code(&self) -> &'static str {
        match self {
            ExprError::Parse { .. } => "PARSE_ERROR",
            ExprError::LookupMiss(_) => "LOOKUP_MISS",
            ExprError::Type(_) => "TYPE_ERROR",
        }
    }

    /// Lookup and type errors are data-dependent; parse errors are not.
    pub fn is_evaluation_error(&self) -> bool {
        !matches!(self, ExprError::Parse { .. })
    }
}

/// A parsed expression, reusable across evaluations.
#[derive(Debug, Clone, PartialEq)]
pub struct Expression {
    source: String,
    ast: Expr,
}

impl Expression {
    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn ast(&self) -> &Expr {
        &self.ast
    }

    pub fn eval(&self, root: &JsonValue) -> Result<Value, ExprError> {
        eval::eval(&self.ast, root)
    }

    pub fn eval_bool(&self, root: &JsonValue) -> Result<bool, ExprError> {
        self.eval(root).map(|v| v.is_truthy())
    }

    /// Assertion semantics: lookup misses and type errors count as `false`.
    pub fn check(&self, root: &JsonValue) -> bool {
        self.eval_bool(root).unwrap_or(false)
    }
}

pub fn parse_expression(src: &str) -> Result<Expression, ExprError> {
    Ok(Expression {
        source: src.to_string(),
        ast: parser::parse(src)?,
    })
}

pub fn evaluate(src: &str, root: &JsonValue) -> Result<Value, ExprError> {
    parse_expression(src)?.eval(root)
}

/// Evaluate an assertion. Parse errors propagate; evaluation errors yield `false`.
pub fn assert(src: &str, root: &JsonValue) -> Result<bool, ExprError> {
    Ok(parse_expression(src)?.check(root))
}

/// Resolve a dotted path such as `node.response.body.items[0]` against `root`.
pub fn lookup_path<'a>(path: &str, root: &'a JsonValue) -> Result<&'a JsonValue, ExprError> {
    match parse_expression(path)?.ast {
        Expr::Path(p) => eval::resolve(&p, root),
        _ => Err(ExprError::Parse {
            offset: 0,
            message: format!("{path:?} is not a path"),
        }),
    }
}

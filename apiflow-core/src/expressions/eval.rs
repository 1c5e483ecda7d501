use serde_json::Value as JsonValue;

use super::parser::{CmpOp, Expr, Path, PathSegment};
use super::value::Value;
use super::ExprError;

pub(crate) fn eval(expr: &Expr, root: &JsonValue) -> Result<Value, ExprError> {
    match expr {
        Expr::Literal(v) => Ok(v.clone()),
        Expr::Path(path) => resolve(path, root).map(Value::from),
        Expr::Not(inner) => Ok(Value::Bool(!eval(inner, root)?.is_truthy())),
        Expr::And(lhs, rhs) => {
            if !eval(lhs, root)?.is_truthy() {
                return Ok(Value::Bool(false));
            }
            Ok(Value::Bool(eval(rhs, root)?.is_truthy()))
        }
        Expr::Or(lhs, rhs) => {
            if eval(lhs, root)?.is_truthy() {
                return Ok(Value::Bool(true));
            }
            Ok(Value::Bool(eval(rhs, root)?.is_truthy()))
        }
        Expr::Compare { op, lhs, rhs } => {
            let a = eval(lhs, root)?;
            let b = eval(rhs, root)?;
            compare(*op, &a, &b).map(Value::Bool)
        }
    }
}

fn compare(op: CmpOp, a: &Value, b: &Value) -> Result<bool, ExprError> {
    Ok(match op {
        CmpOp::Eq => a.loose_eq(b),
        CmpOp::Ne => !a.loose_eq(b),
        CmpOp::Lt => a.try_cmp(b)?.is_lt(),
        CmpOp::Le => a.try_cmp(b)?.is_le(),
        CmpOp::Gt => a.try_cmp(b)?.is_gt(),
        CmpOp::Ge => a.try_cmp(b)?.is_ge(),
        CmpOp::In | CmpOp::NotIn => {
            let Value::Array(items) = b else {
                return Err(ExprError::Type(format!(
                    "`{}` expects an array on the right, got {}",
                    op.as_str(),
                    b.type_name()
                )));
            };
            let found = items.iter().any(|item| a.loose_eq(item));
            if op == CmpOp::In {
                found
            } else {
                !found
            }
        }
    })
}

/// Walk `path` through `root` without copying intermediate nodes.
pub(crate) fn resolve<'a>(path: &Path, root: &'a JsonValue) -> Result<&'a JsonValue, ExprError> {
    let miss = || ExprError::LookupMiss(path.to_string());

    let mut cur = match root {
        JsonValue::Object(map) => map.get(&path.root).ok_or_else(miss)?,
        _ => return Err(miss()),
    };

    for seg in &path.segments {
        cur = match (seg, cur) {
            (PathSegment::Key(k), JsonValue::Object(map)) => map.get(k).ok_or_else(miss)?,
            (PathSegment::Key(k), JsonValue::Array(items)) => match k.parse::<usize>() {
                Ok(i) => items.get(i).ok_or_else(miss)?,
                Err(_) => {
                    return Err(ExprError::Type(format!(
                        "cannot read key {k:?} of an array in {path}"
                    )))
                }
            },
            (PathSegment::Index(i), JsonValue::Array(items)) => items.get(*i).ok_or_else(miss)?,
            (seg, other) => {
                let what = match seg {
                    PathSegment::Key(k) => format!("key {k:?}"),
                    PathSegment::Index(i) => format!("index {i}"),
                };
                return Err(ExprError::Type(format!(
                    "cannot read {what} of {} in {path}",
                    json_type(other)
                )));
            }
        };
    }
    Ok(cur)
}

fn json_type(v: &JsonValue) -> &'static str {
    match v {
        JsonValue::Null => "null",
        JsonValue::Bool(_) => "bool",
        JsonValue::Number(_) => "number",
        JsonValue::String(_) => "string",
        JsonValue::Array(_) => "array",
        JsonValue::Object(_) => "map",
    }
}

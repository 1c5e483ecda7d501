use std::sync::LazyLock;

use regex::Regex;

use super::{VarError, VarLookup};

static KEY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9._\-]+$").expect("valid regex"));

const OPEN: &str = "{{";
const CLOSE: &str = "}}";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment<'a> {
    Literal(&'a str),
    Var(&'a str),
}

pub fn is_valid_key(key: &str) -> bool {
    KEY_RE.is_match(key)
}

/// Split `input` into literal and `{{key}}` segments. Keys are returned trimmed.
///
/// Tokens do not nest: the first `}}` after a `{{` closes it.
pub fn parse_segments(input: &str) -> Result<Vec<Segment<'_>>, VarError> {
    let mut segments = Vec::new();
    let mut rest = input;
    let mut offset = 0;

    while let Some(start) = rest.find(OPEN) {
        if start > 0 {
            segments.push(Segment::Literal(&rest[..start]));
        }
        let after_open = &rest[start + OPEN.len()..];
        let end = after_open
            .find(CLOSE)
            .ok_or(VarError::Unclosed { offset: offset + start })?;
        let key = after_open[..end].trim();
        if !is_valid_key(key) {
            return Err(VarError::InvalidKey(key.to_string()));
        }
        segments.push(Segment::Var(key));

        let consumed = start + OPEN.len() + end + CLOSE.len();
        offset += consumed;
        rest = &rest[consumed..];
    }

    if !rest.is_empty() {
        segments.push(Segment::Literal(rest));
    }
    Ok(segments)
}

pub fn contains_var(input: &str) -> bool {
    input.contains(OPEN)
}

/// The key of `input` when the whole string is exactly one `{{key}}` token.
pub fn single_var(input: &str) -> Option<&str> {
    match parse_segments(input.trim()).ok()?.as_slice() {
        [Segment::Var(key)] => Some(key),
        _ => None,
    }
}

/// Replace every `{{key}}` token with its value from `scope`.
pub fn substitute<L>(scope: &L, input: &str) -> Result<String, VarError>
where
    L: VarLookup + ?Sized,
{
    if !contains_var(input) {
        return Ok(input.to_string());
    }
    let mut out = String::with_capacity(input.len());
    for seg in parse_segments(input)? {
        match seg {
            Segment::Literal(s) => out.push_str(s),
            Segment::Var(key) => {
                let v = scope
                    .lookup(key)
                    .ok_or_else(|| VarError::KeyNotFound(key.to_string()))?;
                out.push_str(&v);
            }
        }
    }
    Ok(out)
}

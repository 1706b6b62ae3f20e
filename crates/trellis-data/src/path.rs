//! Member paths into JSON values
//!
//! A path is a sequence of segments: `name`, `.name`, `[0]`, `["key"]`,
//! `['key']` or `[bare key]`. Quoted and bracketed keys may contain dots.

use std::fmt;

use serde_json::Value;

use crate::error::{DataError, DataResult};

/// One step of a member path
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathSegment {
    Key(String),
    Index(usize),
}

impl PathSegment {
    /// Key as written, used to name the first segment of scope paths
    pub fn as_key(&self) -> String {
        match self {
            PathSegment::Key(k) => k.clone(),
            PathSegment::Index(i) => i.to_string(),
        }
    }
}

impl fmt::Display for PathSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathSegment::Key(k) => write!(f, ".{}", k),
            PathSegment::Index(i) => write!(f, "[{}]", i),
        }
    }
}

fn is_ident_char(c: char) -> bool {
    !(c == '.' || c == '[' || c == ']' || c.is_whitespace())
}

/// Parse a path into segments
pub fn parse(path: &str) -> DataResult<Vec<PathSegment>> {
    let mut segments = Vec::new();
    let mut chars = path.char_indices().peekable();
    let mut expect_ident = true;

    while let Some(&(pos, c)) = chars.peek() {
        match c {
            '.' => {
                chars.next();
                match chars.peek() {
                    Some(&(_, next)) if is_ident_char(next) => expect_ident = true,
                    _ => return Err(DataError::invalid_path(path, format!("empty member at {}", pos))),
                }
            }
            '[' => {
                chars.next();
                let rest = &path[pos + 1..];
                let (segment, consumed) = parse_bracket(path, rest)?;
                for _ in 0..consumed {
                    chars.next();
                }
                segments.push(segment);
                expect_ident = false;
            }
            c if is_ident_char(c) => {
                if !expect_ident {
                    return Err(DataError::invalid_path(
                        path,
                        format!("unexpected '{}' at {}", c, pos),
                    ));
                }
                let mut ident = String::new();
                while let Some(&(_, c)) = chars.peek() {
                    if !is_ident_char(c) {
                        break;
                    }
                    ident.push(c);
                    chars.next();
                }
                segments.push(PathSegment::Key(ident));
                expect_ident = false;
            }
            other => {
                return Err(DataError::invalid_path(
                    path,
                    format!("unexpected '{}' at {}", other, pos),
                ))
            }
        }
    }

    Ok(segments)
}

/// Parse the inside of `[...]`; returns the segment and the number of chars
/// consumed including the closing bracket
fn parse_bracket(path: &str, rest: &str) -> DataResult<(PathSegment, usize)> {
    let quote = rest.chars().next().filter(|c| *c == '"' || *c == '\'');

    if let Some(quote) = quote {
        let body = &rest[1..];
        let end = body
            .find(quote)
            .ok_or_else(|| DataError::invalid_path(path, "unterminated quoted key"))?;
        if !body[end + 1..].starts_with(']') {
            return Err(DataError::invalid_path(path, "expected ']' after quoted key"));
        }
        let key = &body[..end];
        let consumed = key.chars().count() + 3;
        return Ok((PathSegment::Key(key.to_string()), consumed));
    }

    let end = rest
        .find(']')
        .ok_or_else(|| DataError::invalid_path(path, "unterminated '['"))?;
    let inner = rest[..end].trim();
    if inner.is_empty() {
        return Err(DataError::invalid_path(path, "empty brackets"));
    }
    let segment = match inner.parse::<usize>() {
        Ok(i) => PathSegment::Index(i),
        Err(_) => PathSegment::Key(inner.to_string()),
    };
    Ok((segment, rest[..end].chars().count() + 1))
}

/// Walk `segments` starting at `value`
///
/// Numeric segments index arrays and fall back to a key lookup on objects.
pub fn get<'v>(value: &'v Value, segments: &[PathSegment]) -> Option<&'v Value> {
    segments.iter().try_fold(value, |current, segment| match (current, segment) {
        (Value::Object(map), PathSegment::Key(k)) => map.get(k),
        (Value::Object(map), PathSegment::Index(i)) => map.get(&i.to_string()),
        (Value::Array(items), PathSegment::Index(i)) => items.get(*i),
        _ => None,
    })
}

//! Nested-path lookup for `{{runtime.<path>}}` tokens.
//!
//! `options[1].name` → base `options` (runtime map, then global map),
//! index `1`, property `name`. A segment written `[2]` with no name indexes
//! the current value directly. Every failure is explicit; callers decide
//! whether to swallow it.

use std::collections::HashMap;

use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PathError {
    #[error("variable '{0}' not found in runtime or global variables")]
    VariableNotFound(String),

    #[error("cannot access '{segment}' on a null value")]
    NullDereference { segment: String },

    #[error("property '{property}' not found")]
    MissingProperty { property: String },

    #[error("cannot access property '{property}' on a non-object value")]
    NotAnObject { property: String },

    #[error("cannot index '{segment}': value is not an array")]
    NotAnArray { segment: String },

    #[error("invalid array index '{raw}'")]
    InvalidIndex { raw: String },

    #[error("index {index} out of bounds for array of length {len}")]
    IndexOutOfBounds { index: usize, len: usize },
}

/// One dot-separated piece of a path: an optional property name followed by
/// zero or more `[n]` indexes.
#[derive(Debug, PartialEq, Eq)]
struct Segment<'a> {
    name: &'a str,
    indexes: Vec<usize>,
}

fn parse_segment(part: &str) -> Result<Segment<'_>, PathError> {
    let Some(open) = part.find('[') else {
        return Ok(Segment {
            name: part,
            indexes: Vec::new(),
        });
    };

    let name = &part[..open];
    let mut indexes = Vec::new();
    let mut rest = &part[open..];
    while !rest.is_empty() {
        let close = match (rest.starts_with('['), rest.find(']')) {
            (true, Some(close)) => close,
            _ => {
                return Err(PathError::InvalidIndex {
                    raw: rest.to_owned(),
                })
            }
        };
        let raw = rest[1..close].trim();
        let index = raw.parse::<usize>().map_err(|_| PathError::InvalidIndex {
            raw: raw.to_owned(),
        })?;
        indexes.push(index);
        rest = &rest[close + 1..];
    }

    Ok(Segment { name, indexes })
}

fn property<'v>(current: &'v Value, name: &str) -> Result<&'v Value, PathError> {
    match current {
        Value::Null => Err(PathError::NullDereference {
            segment: name.to_owned(),
        }),
        Value::Object(map) => map.get(name).ok_or_else(|| PathError::MissingProperty {
            property: name.to_owned(),
        }),
        _ => Err(PathError::NotAnObject {
            property: name.to_owned(),
        }),
    }
}

fn index<'v>(current: &'v Value, index: usize, segment: &str) -> Result<&'v Value, PathError> {
    match current {
        Value::Null => Err(PathError::NullDereference {
            segment: format!("{segment}[{index}]"),
        }),
        Value::Array(items) => items.get(index).ok_or(PathError::IndexOutOfBounds {
            index,
            len: items.len(),
        }),
        _ => Err(PathError::NotAnArray {
            segment: format!("{segment}[{index}]"),
        }),
    }
}

/// Resolve `path` against the runtime map, falling back to the global map
/// for the base variable.
pub fn lookup_path(
    path: &str,
    runtime: &HashMap<String, Value>,
    global: &HashMap<String, Value>,
) -> Result<Value, PathError> {
    let mut parts = path.split('.');
    let first = parse_segment(parts.next().unwrap_or_default().trim())?;

    let mut current = runtime
        .get(first.name)
        .or_else(|| global.get(first.name))
        .ok_or_else(|| PathError::VariableNotFound(first.name.to_owned()))?;
    for &i in &first.indexes {
        current = index(current, i, first.name)?;
    }

    for part in parts {
        let segment = parse_segment(part.trim())?;
        if !segment.name.is_empty() {
            current = property(current, segment.name)?;
        }
        for &i in &segment.indexes {
            current = index(current, i, segment.name)?;
        }
    }

    Ok(current.clone())
}

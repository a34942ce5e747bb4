//! Template resolution: `{{token}}` scanning and the lookup precedence.

use serde_json::Value;
use tracing::warn;

use super::path::lookup_path;
use super::{faker, functions, VariableContext, VariableError, MAX_RESOLUTION_DEPTH};
use crate::config::{AutomationConfig, VariableKind};

/// Replace every `{{token}}` in `input`.
///
/// Tokens are resolved left to right and never overlap. An unclosed `{{`
/// and everything after it is copied through untouched.
///
/// # Errors
/// Only [`VariableError::RecursionLimit`]; every other miss degrades to a
/// warning.
pub fn resolve_in_string(
    input: &str,
    ctx: &VariableContext,
    config: &AutomationConfig,
) -> Result<String, VariableError> {
    resolve_at_depth(input, ctx, config, 0)
}

/// Resolve every string leaf of `value`, recursing through maps and lists.
pub fn resolve_in_config(
    value: &Value,
    ctx: &VariableContext,
    config: &AutomationConfig,
) -> Result<Value, VariableError> {
    match value {
        Value::String(s) => Ok(Value::String(resolve_in_string(s, ctx, config)?)),
        Value::Array(items) => items
            .iter()
            .map(|item| resolve_in_config(item, ctx, config))
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Array),
        Value::Object(map) => {
            let mut resolved = serde_json::Map::with_capacity(map.len());
            for (key, item) in map {
                resolved.insert(key.clone(), resolve_in_config(item, ctx, config)?);
            }
            Ok(Value::Object(resolved))
        }
        other => Ok(other.clone()),
    }
}

/// Like [`resolve_in_config`], but top-level entries named in `skip_keys`
/// are copied verbatim.
pub fn resolve_in_config_except(
    value: &Value,
    ctx: &VariableContext,
    config: &AutomationConfig,
    skip_keys: &[&str],
) -> Result<Value, VariableError> {
    let Value::Object(map) = value else {
        return resolve_in_config(value, ctx, config);
    };

    let mut resolved = serde_json::Map::with_capacity(map.len());
    for (key, item) in map {
        let item = if skip_keys.contains(&key.as_str()) {
            item.clone()
        } else {
            resolve_in_config(item, ctx, config)?
        };
        resolved.insert(key.clone(), item);
    }
    Ok(Value::Object(resolved))
}

fn resolve_at_depth(
    input: &str,
    ctx: &VariableContext,
    config: &AutomationConfig,
    depth: usize,
) -> Result<String, VariableError> {
    let mut out = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(open) = rest.find("{{") {
        let Some(close) = rest[open + 2..].find("}}") else {
            break;
        };
        let close = open + 2 + close;

        out.push_str(&rest[..open]);
        let raw = &rest[open..close + 2];
        let token = rest[open + 2..close].trim();
        out.push_str(&resolve_token(token, raw, ctx, config, depth)?);
        rest = &rest[close + 2..];
    }

    out.push_str(rest);
    Ok(out)
}

fn resolve_token(
    token: &str,
    raw: &str,
    ctx: &VariableContext,
    config: &AutomationConfig,
    depth: usize,
) -> Result<String, VariableError> {
    if let Some(value) = reserved(token, ctx) {
        return Ok(value);
    }

    if let Some(path) = token.strip_prefix("runtime.") {
        return Ok(
            match lookup_path(path, &ctx.runtime_vars, &ctx.global_vars) {
                Ok(value) => value_to_string(&value),
                Err(e) => {
                    warn!(path, error = %e, "runtime variable lookup failed");
                    String::new()
                }
            },
        );
    }

    if let Some(method) = token.strip_prefix("faker.") {
        return Ok(faker::generate(method).unwrap_or_else(|| {
            warn!(method, "unknown faker method");
            raw.to_owned()
        }));
    }

    if let Some(name) = token.strip_prefix("function.") {
        return Ok(functions::call(name).unwrap_or_else(|| raw.to_owned()));
    }

    if let Some(value) = ctx.static_vars.get(token) {
        return Ok(value.clone());
    }

    if let Some(variable) = config.variable(token) {
        return match variable.kind {
            VariableKind::Static => Ok(variable.value.clone()),
            VariableKind::Dynamic => Ok(dynamic_value(&variable.value)),
            VariableKind::Environment => {
                if depth >= MAX_RESOLUTION_DEPTH {
                    return Err(VariableError::RecursionLimit {
                        key: token.to_owned(),
                        depth: depth + 1,
                    });
                }
                resolve_at_depth(&variable.value, ctx, config, depth + 1)
            }
        };
    }

    warn!(token, "unresolved variable");
    Ok(raw.to_owned())
}

fn reserved(token: &str, ctx: &VariableContext) -> Option<String> {
    let value = match token {
        "loopIndex" => ctx.loop_index.to_string(),
        "localLoopIndex" => ctx.local_loop_index.to_string(),
        "timestamp" => ctx.timestamp.to_string(),
        "runId" => ctx.run_id.clone(),
        "userId" => ctx.user_id.clone(),
        "projectId" => ctx.project_id.clone(),
        "automationId" => ctx.automation_id.clone(),
        _ => return None,
    };
    Some(value)
}

/// `{{faker.email}}` → a generated email. Anything else is used literally.
fn dynamic_value(template: &str) -> String {
    let method = template
        .trim()
        .strip_prefix("{{")
        .and_then(|s| s.strip_suffix("}}"))
        .and_then(|s| s.trim().strip_prefix("faker."));

    match method {
        Some(method) => faker::generate(method).unwrap_or_else(|| {
            warn!(method, "unknown faker method in dynamic variable");
            template.to_owned()
        }),
        None => template.to_owned(),
    }
}

/// Render a JSON value for interpolation into a string. Null renders empty.
pub fn value_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

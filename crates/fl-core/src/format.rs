//! Constrained `{role.field}` substitution.
//!
//! Placeholders name an argument followed by attribute (`.name`) and index
//! (`[0]`, `[key]`) steps. Two conversions are supported on top of plain
//! text: `!e` escapes HTML and `!x` applies ROT13. `{{` and `}}` are
//! literal braces. Anything after a `:` inside a placeholder is ignored.

use serde_json::{Map, Value};

use crate::error::{CoreError, CoreResult};
use crate::markup;

/// Substitute every placeholder in `template` from `args`.
pub fn format(template: &str, args: &Map<String, Value>) -> CoreResult<String> {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(pos) = rest.find(['{', '}']) {
        out.push_str(&rest[..pos]);
        let tail = &rest[pos..];
        if let Some(after) = tail.strip_prefix("{{") {
            out.push('{');
            rest = after;
        } else if let Some(after) = tail.strip_prefix("}}") {
            out.push('}');
            rest = after;
        } else if let Some(after) = tail.strip_prefix('{') {
            let end = after
                .find('}')
                .ok_or_else(|| CoreError::Template(format!("unclosed '{{' in {template:?}")))?;
            let field = &after[..end];
            if field.contains('{') {
                return Err(CoreError::Template(format!("nested '{{' in {template:?}")));
            }
            out.push_str(&substitute(field, args)?);
            rest = &after[end + 1..];
        } else {
            return Err(CoreError::Template(format!("single '}}' in {template:?}")));
        }
    }
    out.push_str(rest);
    Ok(out)
}

fn substitute(field: &str, args: &Map<String, Value>) -> CoreResult<String> {
    let (expr, conversion) = match field.split_once('!') {
        Some((expr, conversion)) => (expr, conversion.split(':').next().unwrap_or("")),
        None => (field, ""),
    };
    let path = expr.split(':').next().unwrap_or("").trim();
    let text = to_text(lookup(args, path)?);
    match conversion {
        "" | "s" => Ok(text),
        "e" => Ok(markup::escape_attr(&text)),
        "x" => Ok(rot13(&text)),
        other => Err(CoreError::Format {
            field: field.to_string(),
            reason: format!("unknown conversion '!{other}'"),
        }),
    }
}

/// Resolve a path whose first step names an argument.
pub fn lookup<'a>(args: &'a Map<String, Value>, path: &str) -> CoreResult<&'a Value> {
    let end = path.find(['.', '[']).unwrap_or(path.len());
    let name = &path[..end];
    let root = args.get(name).ok_or_else(|| CoreError::Format {
        field: path.to_string(),
        reason: format!("no argument '{name}'"),
    })?;
    resolve(root, &path[end..])
}

/// Follow attribute and index steps from `value`. An empty path is `value`.
pub fn resolve<'a>(value: &'a Value, path: &str) -> CoreResult<&'a Value> {
    let fail = |reason: String| CoreError::Format {
        field: path.to_string(),
        reason,
    };
    let mut current = value;
    let mut rest = path;
    while !rest.is_empty() {
        if let Some(after) = rest.strip_prefix('[') {
            let end = after
                .find(']')
                .ok_or_else(|| fail("unclosed '['".to_string()))?;
            let key = &after[..end];
            current = index(current, key).ok_or_else(|| fail(format!("no item [{key}]")))?;
            rest = &after[end + 1..];
        } else {
            let after = rest.strip_prefix('.').unwrap_or(rest);
            let end = after.find(['.', '[']).unwrap_or(after.len());
            let name = &after[..end];
            if name.is_empty() {
                return Err(fail("empty attribute".to_string()));
            }
            current = current
                .get(name)
                .ok_or_else(|| fail(format!("no attribute '{name}'")))?;
            rest = &after[end..];
        }
    }
    Ok(current)
}

fn index<'a>(value: &'a Value, key: &str) -> Option<&'a Value> {
    match value {
        Value::Array(items) => key.parse::<usize>().ok().and_then(|i| items.get(i)),
        Value::Object(map) => map.get(key),
        _ => None,
    }
}

/// Plain text for a value: strings unquoted, everything else as JSON.
pub fn to_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Rotate ASCII letters by 13 places.
pub fn rot13(text: &str) -> String {
    text.chars()
        .map(|c| match c {
            'a'..='z' => (((c as u8 - b'a') + 13) % 26 + b'a') as char,
            'A'..='Z' => (((c as u8 - b'A') + 13) % 26 + b'A') as char,
            _ => c,
        })
        .collect()
}

//! Helpers for working with JSON field maps

use crate::types::Fields;
use serde_json::Value;

/// Look up a dotted path (`properties.sslPolicy.policyType`).
pub fn get_path<'a>(fields: &'a Fields, path: &str) -> Option<&'a Value> {
    let mut segments = path.split('.');
    let first = segments.next()?;
    let mut current = fields.get(first)?;
    for segment in segments {
        current = current.as_object()?.get(segment)?;
    }
    Some(current)
}

/// Write a value at a dotted path, creating intermediate objects.
///
/// A non-object value sitting on an intermediate segment is replaced.
pub fn set_path(fields: &mut Fields, path: &str, value: Value) {
    match path.split_once('.') {
        None => {
            fields.insert(path.to_string(), value);
        }
        Some((head, rest)) => {
            let entry = fields
                .entry(head.to_string())
                .or_insert_with(|| Value::Object(Fields::new()));
            if !entry.is_object() {
                *entry = Value::Object(Fields::new());
            }
            if let Value::Object(child) = entry {
                set_path(child, rest, value);
            }
        }
    }
}

/// Remove a dotted path, returning the removed value.
pub fn remove_path(fields: &mut Fields, path: &str) -> Option<Value> {
    match path.split_once('.') {
        None => fields.remove(path),
        Some((head, rest)) => match fields.get_mut(head) {
            Some(Value::Object(child)) => remove_path(child, rest),
            _ => None,
        },
    }
}

/// `{"MODE": "prod"}` -> `[{"name": "MODE", "value": "prod"}]`
pub fn name_value_list(map: &Fields) -> Value {
    Value::Array(
        map.iter()
            .map(|(name, value)| {
                let mut entry = Fields::new();
                entry.insert("name".to_string(), Value::String(name.clone()));
                entry.insert("value".to_string(), value.clone());
                Value::Object(entry)
            })
            .collect(),
    )
}

/// Inverse of [`name_value_list`]. Entries without a string `name` are skipped.
pub fn name_value_map(list: &Value) -> Fields {
    list.as_array()
        .into_iter()
        .flatten()
        .filter_map(|entry| {
            let name = entry.get("name")?.as_str()?;
            let value = entry.get("value").cloned().unwrap_or(Value::Null);
            Some((name.to_string(), value))
        })
        .collect()
}

/// Compare two leaf values the way the control plane does.
///
/// Strings compare case-insensitively. A number and a numeric string compare
/// by value, and so do a bool and `"true"`/`"false"`.
pub fn scalars_match(observed: &Value, desired: &Value) -> bool {
    match (observed, desired) {
        (Value::String(a), Value::String(b)) => a.eq_ignore_ascii_case(b),
        (Value::Number(a), Value::Number(b)) => match (a.as_f64(), b.as_f64()) {
            (Some(x), Some(y)) => (x - y).abs() < f64::EPSILON,
            _ => a == b,
        },
        (Value::Number(n), Value::String(s)) | (Value::String(s), Value::Number(n)) => {
            match (n.as_f64(), s.trim().parse::<f64>()) {
                (Some(x), Ok(y)) => (x - y).abs() < f64::EPSILON,
                _ => false,
            }
        }
        (Value::Bool(b), Value::String(s)) | (Value::String(s), Value::Bool(b)) => {
            s.eq_ignore_ascii_case(if *b { "true" } else { "false" })
        }
        _ => observed == desired,
    }
}

/// `backend_http_settings_collection` -> `backendHttpSettingsCollection`
pub fn camel_case(snake: &str) -> String {
    let mut out = String::with_capacity(snake.len());
    let mut upper_next = false;
    for c in snake.chars() {
        if c == '_' {
            upper_next = !out.is_empty();
        } else if upper_next {
            out.extend(c.to_uppercase());
            upper_next = false;
        } else {
            out.push(c);
        }
    }
    out
}

/// Short single-line rendering of a value for messages.
pub fn render(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => "(unset)".to_string(),
        other => other.to_string(),
    }
}

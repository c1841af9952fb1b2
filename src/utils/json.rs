//! Helpers for reading loosely-typed upstream JSON.

use serde_json::Value;

const MAX_ERROR_MESSAGE_CHARS: usize = 500;

/// Trimmed string value, or `""` for non-strings.
pub fn normalize_string(value: Option<&Value>) -> String {
    match value {
        Some(Value::String(s)) => s.trim().to_string(),
        _ => String::new(),
    }
}

/// Convert an untrusted numeric value into a validated non-negative integer.
///
/// Accepts JSON numbers and numeric strings; rejects negative, non-finite and
/// non-numeric input. Fractions are floored.
pub fn normalize_non_negative_int(value: Option<&Value>) -> Option<u64> {
    let n = match value? {
        Value::Number(n) => {
            if let Some(u) = n.as_u64() {
                return Some(u);
            }
            n.as_f64()?
        }
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    if n.is_finite() && n >= 0.0 {
        Some(n.floor() as u64)
    } else {
        None
    }
}

/// First non-empty string among `keys` on `obj`.
pub fn first_string(obj: &Value, keys: &[&str]) -> String {
    keys.iter()
        .map(|k| normalize_string(obj.get(*k)))
        .find(|s| !s.is_empty())
        .unwrap_or_default()
}

/// `true` when the payload encodes an upstream error (`error` or `message` field).
pub fn has_error_field(json: &Value) -> bool {
    json.is_object()
        && (json.get("error").is_some_and(|v| !v.is_null())
            || json.get("message").is_some_and(|v| !v.is_null()))
}

/// Best-effort human-readable message from an upstream error payload.
pub fn extract_error_message(json: &Value) -> String {
    let error = json.get("error");
    let candidates = [
        error.and_then(|e| e.get("message")),
        error.filter(|e| e.is_string()),
        json.get("message"),
        json.get("detail"),
        error.and_then(|e| e.get("code")),
    ];
    let msg = candidates
        .into_iter()
        .flatten()
        .map(|v| match v {
            Value::String(s) => s.trim().to_string(),
            Value::Number(n) => n.to_string(),
            _ => String::new(),
        })
        .find(|s| !s.is_empty())
        .unwrap_or_default();
    truncate_chars(&msg, MAX_ERROR_MESSAGE_CHARS)
}

/// Truncate to at most `max` characters on a char boundary.
pub fn truncate_chars(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}

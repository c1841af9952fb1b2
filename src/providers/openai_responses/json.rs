//! Responses object helpers
//!
//! Shared by the buffered JSON path and the final `response` object carried by
//! `response.completed` / `response.incomplete` events.

use crate::streaming::tool_calls::{ArgumentsUpdate, ToolCallFragment};
use crate::utils::json::{first_string, normalize_string};
use serde_json::Value;

/// Most output item types listed in diagnostics.
const MAX_REPORTED_OUTPUT_TYPES: usize = 12;

pub fn output_items(response: &Value) -> &[Value] {
    response
        .get("output")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default()
}

fn item_type(item: &Value) -> String {
    normalize_string(item.get("type"))
}

/// Response text: `output_text` when present, else the `output_text` parts of
/// `message` items concatenated.
pub fn extract_text(response: &Value) -> String {
    if let Some(text) = response.get("output_text").and_then(Value::as_str)
        && !text.is_empty()
    {
        return text.to_string();
    }
    output_items(response)
        .iter()
        .filter(|item| item_type(item) == "message")
        .filter_map(|item| item.get("content").and_then(Value::as_array))
        .flatten()
        .filter(|part| item_type(part) == "output_text")
        .filter_map(|part| part.get("text").and_then(Value::as_str))
        .collect()
}

/// `summary_text` parts of a reasoning item, joined by newlines.
pub fn reasoning_item_summary(item: &Value) -> String {
    let Some(summary) = item.get("summary").and_then(Value::as_array) else {
        return String::new();
    };
    summary
        .iter()
        .filter(|s| item_type(s) == "summary_text")
        .map(|s| normalize_string(s.get("text")))
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string()
}

/// Reasoning summary across every reasoning item of `output`.
pub fn extract_reasoning_summary(output: &[Value]) -> String {
    output
        .iter()
        .filter(|item| item_type(item) == "reasoning")
        .map(reasoning_item_summary)
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// A `function_call` item as a fragment. Item arguments are a complete snapshot.
pub fn function_call_fragment(item: &Value) -> Option<ToolCallFragment> {
    if item_type(item) != "function_call" {
        return None;
    }
    let arguments = match item.get("arguments").and_then(Value::as_str).map(str::trim) {
        Some(args) if !args.is_empty() => ArgumentsUpdate::Replace(args.to_string()),
        _ => ArgumentsUpdate::Keep,
    };
    Some(ToolCallFragment {
        call_id: first_string(item, &["call_id", "callId", "callID"]),
        name: normalize_string(item.get("name")),
        arguments,
    })
}

/// Function calls of `output`, keyed by array position.
pub fn function_call_fragments(output: &[Value]) -> Vec<(u64, ToolCallFragment)> {
    output
        .iter()
        .enumerate()
        .filter_map(|(pos, item)| Some((pos as u64, function_call_fragment(item)?)))
        .collect()
}

pub fn has_function_call(response: &Value) -> bool {
    output_items(response)
        .iter()
        .any(|item| item_type(item) == "function_call")
}

/// Comma-separated output item types for diagnostics (`n/a` when none).
pub fn describe_output_types(response: &Value) -> String {
    let types: Vec<String> = output_items(response)
        .iter()
        .take(MAX_REPORTED_OUTPUT_TYPES)
        .map(|item| match item_type(item) {
            t if t.is_empty() => "unknown".to_string(),
            t => t,
        })
        .collect();
    if types.is_empty() {
        "n/a".to_string()
    } else {
        types.join(",")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> Value {
        json!({
            "status": "completed",
            "output": [
                {"type": "reasoning", "summary": [
                    {"type": "summary_text", "text": "first"},
                    {"type": "other", "text": "skip"},
                    {"type": "summary_text", "text": "second"}
                ]},
                {"type": "message", "content": [
                    {"type": "output_text", "text": "Hi "},
                    {"type": "output_text", "text": "there"}
                ]},
                {"type": "function_call", "call_id": "call_9", "name": "lookup", "arguments": "{\"q\":1}"},
                {"id": "x"}
            ]
        })
    }

    #[test]
    fn reads_text_from_output_when_output_text_is_absent() {
        let json = sample();
        assert_eq!(extract_text(&json), "Hi there");
        assert_eq!(extract_text(&json!({"output_text": "direct"})), "direct");
    }

    #[test]
    fn reads_reasoning_and_function_calls() {
        let json = sample();
        assert_eq!(extract_reasoning_summary(output_items(&json)), "first\nsecond");

        let calls = function_call_fragments(output_items(&json));
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0, 2);
        assert_eq!(calls[0].1.call_id, "call_9");
        assert_eq!(
            calls[0].1.arguments,
            ArgumentsUpdate::Replace("{\"q\":1}".to_string())
        );
        assert!(has_function_call(&json));
    }

    #[test]
    fn describes_output_types() {
        assert_eq!(
            describe_output_types(&sample()),
            "reasoning,message,function_call,unknown"
        );
        assert_eq!(describe_output_types(&json!({})), "n/a");
    }
}

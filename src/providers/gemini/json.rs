//! Gemini payload helpers
//!
//! Gemini frames (streamed or buffered) share one shape: `candidates[0]` holds
//! `content.parts[]` (text, thought text, or a `functionCall`) and a
//! `finishReason`; `usageMetadata` sits at the top level.

use crate::utils::json::{first_string, normalize_string};
use serde::Deserialize;
use serde_json::Value;

/// Keys carrying a function-call id, in priority order.
const FUNCTION_CALL_ID_KEYS: [&str; 5] = ["id", "call_id", "callId", "tool_use_id", "toolUseId"];

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiPart {
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    thought: Option<bool>,
    #[serde(default)]
    function_call: Option<Value>,
}

/// One content part, classified.
#[derive(Debug, Clone, PartialEq)]
pub enum GeminiPartKind {
    Text(String),
    Thought(String),
    FunctionCall(GeminiFunctionCall),
}

#[derive(Debug, Clone, PartialEq)]
pub struct GeminiFunctionCall {
    /// Empty when upstream sent no id
    pub id: String,
    pub name: String,
    pub arguments_json: String,
}

/// First candidate of a payload.
pub fn first_candidate(json: &Value) -> Option<&Value> {
    json.get("candidates")
        .and_then(Value::as_array)
        .and_then(|c| c.first())
        .filter(|c| c.is_object())
}

/// Classified parts of the first candidate. Parts that are neither non-empty
/// text nor a named function call are skipped.
pub fn candidate_parts(json: &Value) -> Vec<GeminiPartKind> {
    let Some(parts) = first_candidate(json)
        .and_then(|c| c.get("content"))
        .and_then(|c| c.get("parts"))
        .and_then(Value::as_array)
    else {
        return Vec::new();
    };

    parts
        .iter()
        .filter_map(|raw| {
            let part = GeminiPart::deserialize(raw).ok()?;
            if let Some(text) = part.text.filter(|t| !t.is_empty()) {
                return Some(if part.thought == Some(true) {
                    GeminiPartKind::Thought(text)
                } else {
                    GeminiPartKind::Text(text)
                });
            }
            let call = part.function_call.filter(Value::is_object)?;
            let name = normalize_string(call.get("name"));
            if name.is_empty() {
                return None;
            }
            Some(GeminiPartKind::FunctionCall(GeminiFunctionCall {
                id: first_string(&call, &FUNCTION_CALL_ID_KEYS),
                name,
                arguments_json: normalize_function_call_args(
                    call.get("args").or_else(|| call.get("arguments")),
                ),
            }))
        })
        .collect()
}

/// Function-call arguments as a JSON string; `"{}"` when absent.
pub fn normalize_function_call_args(args: Option<&Value>) -> String {
    match args {
        None | Some(Value::Null) => "{}".to_string(),
        Some(Value::String(s)) => match s.trim() {
            "" => "{}".to_string(),
            s => s.to_string(),
        },
        Some(other) => serde_json::to_string(other).unwrap_or_else(|_| "{}".to_string()),
    }
}

/// Concatenated non-thought text of the first candidate.
pub fn extract_text(json: &Value) -> String {
    candidate_parts(json)
        .into_iter()
        .filter_map(|part| match part {
            GeminiPartKind::Text(text) => Some(text),
            _ => None,
        })
        .collect()
}

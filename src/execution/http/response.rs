//! Response shape checks
//!
//! A streaming call expects `text/event-stream`; a body advertising JSON is
//! handled as the buffered equivalent by the drivers. Anything else is an
//! upstream shape error carrying the observed content type and a body preview.

use crate::error::LlmError;
use crate::utils::json::{extract_error_message, truncate_chars};
use reqwest::header::CONTENT_TYPE;

/// Characters of body kept in shape/HTTP error messages.
pub const ERROR_PREVIEW_CHARS: usize = 500;

/// Lower-cased `content-type` header, `""` when absent.
pub fn content_type(response: &reqwest::Response) -> String {
    response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|ct| ct.trim().to_ascii_lowercase())
        .unwrap_or_default()
}

pub fn is_json_content_type(content_type: &str) -> bool {
    content_type.contains("json")
}

pub fn is_sse_content_type(content_type: &str) -> bool {
    content_type.contains("text/event-stream")
}

/// Read a body for diagnostics: the upstream error message when the body is
/// JSON, otherwise a truncated raw preview.
pub async fn read_error_detail(response: reqwest::Response, max_chars: usize) -> String {
    let text = match response.text().await {
        Ok(t) => t,
        Err(e) => return format!("<failed to read body: {e}>"),
    };
    describe_body(&text, max_chars)
}

pub(crate) fn describe_body(text: &str, max_chars: usize) -> String {
    if let Ok(json) = serde_json::from_str::<serde_json::Value>(text) {
        let msg = extract_error_message(&json);
        if !msg.is_empty() {
            return truncate_chars(&msg, max_chars);
        }
    }
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return "<empty body>".to_string();
    }
    truncate_chars(trimmed, max_chars)
}

/// Pass the response through when it is SSE; otherwise fail with a shape error.
pub async fn assert_sse_response(
    response: reqwest::Response,
    label: &str,
    expected_hint: &str,
) -> Result<reqwest::Response, LlmError> {
    let ct = content_type(&response);
    if is_sse_content_type(&ct) {
        return Ok(response);
    }
    tracing::debug!(target: "siumai::http", label, content_type = %ct, "unexpected content-type for streaming response");
    let detail = read_error_detail(response, ERROR_PREVIEW_CHARS).await;
    let hint = expected_hint.trim();
    Err(LlmError::ResponseFormatError {
        label: label.to_string(),
        content_type: if ct.is_empty() {
            "unknown".to_string()
        } else {
            ct
        },
        hint: if hint.is_empty() {
            String::new()
        } else {
            format!("; {hint}")
        },
        detail,
    })
}

/// Read a whole body as JSON. An unparseable body yields `Value::Null`;
/// transport failures propagate.
pub async fn read_json_body(response: reqwest::Response) -> Result<serde_json::Value, LlmError> {
    let bytes = response.bytes().await?;
    Ok(serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null))
}

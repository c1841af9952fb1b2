//! Gemini text-only operations

use crate::error::LlmError;
use crate::execution::http::response::read_json_body;
use crate::execution::http::{HttpExecutor, ProviderRequest};
use crate::providers::gemini::json::extract_text;
use crate::streaming::converters::TextFrameConverter;
use crate::streaming::factory::{OpenedStream, StreamFactory};
use crate::streaming::sse_json::SseFrame;
use crate::streaming::text::CumulativeText;
use crate::streaming::TextDeltaStream;
use crate::utils::cancel::CancelHandle;
use crate::utils::json::has_error_field;
use serde_json::Value;

pub const TEXT_STREAM_LABEL: &str = "Gemini(stream)";
pub const COMPLETE_TEXT_LABEL: &str = "Gemini";
const TEXT_STREAM_HINT: &str = "check that the base URL points at the Google Generative Language API";

/// Reconciles cumulative part text into deltas.
pub struct GeminiTextConverter {
    label: String,
    text: CumulativeText,
}

impl GeminiTextConverter {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            text: CumulativeText::new(),
        }
    }
}

impl TextFrameConverter for GeminiTextConverter {
    fn convert_frame(&mut self, frame: SseFrame) -> Result<Vec<String>, LlmError> {
        if has_error_field(&frame.json) {
            return Err(LlmError::upstream_payload(&self.label, &frame.json, "upstream error"));
        }
        let chunk = extract_text(&frame.json);
        if chunk.is_empty() {
            return Ok(Vec::new());
        }
        Ok(vec![self.text.push(&chunk)])
    }
}

/// Stream plain text deltas for `request`.
pub async fn stream_text_deltas(
    executor: &HttpExecutor,
    request: &ProviderRequest,
    cancel: Option<CancelHandle>,
) -> Result<TextDeltaStream, LlmError> {
    match StreamFactory::open(executor, request, cancel, TEXT_STREAM_HINT).await? {
        OpenedStream::Json { json, content_type } => {
            if has_error_field(&json) {
                return Err(LlmError::upstream_payload(&request.label, &json, "upstream error"));
            }
            let text = extract_text(&json);
            if text.is_empty() {
                return Err(LlmError::ParseError(format!(
                    "{} JSON response has no candidates[0].content.parts[].text (content-type={content_type})",
                    request.label
                )));
            }
            Ok(Box::pin(futures::stream::once(async move { Ok::<_, LlmError>(text) })))
        }
        OpenedStream::Sse(frames) => Ok(StreamFactory::text_stream(
            frames,
            GeminiTextConverter::new(request.label.clone()),
            request.label.clone(),
        )),
    }
}

/// Non-streaming completion returning the response text.
pub async fn complete_text(
    executor: &HttpExecutor,
    request: &ProviderRequest,
    cancel: Option<CancelHandle>,
) -> Result<String, LlmError> {
    let response = executor
        .fetch_with_fallback(request, false, cancel.as_ref())
        .await?;
    let json = read_json_body(response).await?;
    if has_error_field(&json) {
        return Err(LlmError::upstream_payload(&request.label, &json, "upstream error"));
    }
    let text = extract_text(&json);
    if text.is_empty() {
        return Err(LlmError::ParseError(format!(
            "{} response has no candidates[0].content.parts[].text",
            request.label
        )));
    }
    Ok(text)
}

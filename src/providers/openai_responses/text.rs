//! Responses text-only operations

use crate::error::LlmError;
use crate::execution::http::response::read_json_body;
use crate::execution::http::{HttpExecutor, ProviderRequest};
use crate::providers::openai_responses::chat::{event_response, text_output_index};
use crate::providers::openai_responses::events::ResponsesEventKind;
use crate::providers::openai_responses::json::{
    describe_output_types, extract_text, has_function_call,
};
use crate::streaming::converters::TextFrameConverter;
use crate::streaming::factory::{OpenedStream, StreamFactory};
use crate::streaming::sse_json::SseFrame;
use crate::streaming::text::OutputTextTracker;
use crate::streaming::TextDeltaStream;
use crate::utils::cancel::CancelHandle;
use crate::utils::json::has_error_field;
use futures::StreamExt;
use serde_json::Value;

pub const TEXT_STREAM_LABEL: &str = "OpenAI(responses-stream)";
pub const COMPLETE_TEXT_LABEL: &str = "OpenAI(responses)";
const TEXT_STREAM_HINT: &str = "check that the base URL points at an OpenAI /responses SSE endpoint";

/// Output-text deltas plus whatever the snapshots add.
pub struct ResponsesTextConverter {
    label: String,
    text: OutputTextTracker,
}

impl ResponsesTextConverter {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            text: OutputTextTracker::new(),
        }
    }
}

impl TextFrameConverter for ResponsesTextConverter {
    fn convert_frame(&mut self, frame: SseFrame) -> Result<Vec<String>, LlmError> {
        let json = &frame.json;
        let delta = match ResponsesEventKind::of_frame(&frame) {
            ResponsesEventKind::OutputTextDelta => {
                let delta = json.get("delta").and_then(Value::as_str).unwrap_or_default();
                self.text.push_delta(text_output_index(json), delta);
                delta.to_string()
            }
            ResponsesEventKind::OutputTextDone => {
                let full = json.get("text").and_then(Value::as_str).unwrap_or_default();
                self.text.apply_final_text(text_output_index(json), full)
            }
            ResponsesEventKind::Completed => match event_response(json) {
                Some(response) => self.text.apply_final_text_all(&extract_text(response)),
                None => String::new(),
            },
            kind if kind.is_failure() => {
                return Err(LlmError::upstream_payload(
                    &self.label,
                    event_response(json).unwrap_or(json),
                    "upstream error event",
                ));
            }
            _ => String::new(),
        };
        Ok(vec![delta])
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
            let text = extract_text(&json);
            if text.is_empty() {
                return Err(LlmError::ParseError(format!(
                    "{} JSON response has no parseable text (content-type={content_type})",
                    request.label
                )));
            }
            Ok(Box::pin(futures::stream::once(async move { Ok::<_, LlmError>(text) })))
        }
        OpenedStream::Sse(frames) => Ok(StreamFactory::text_stream(
            frames,
            ResponsesTextConverter::new(request.label.clone()),
            request.label.clone(),
        )),
    }
}

/// Non-streaming completion returning the response text.
///
/// Some gateways only speak SSE even for non-streaming calls; when the JSON
/// body carries no text, `stream_fallback` (the same call with streaming
/// enabled) is tried once.
pub async fn complete_text(
    executor: &HttpExecutor,
    request: &ProviderRequest,
    stream_fallback: Option<&ProviderRequest>,
    cancel: Option<CancelHandle>,
) -> Result<String, LlmError> {
    let response = executor
        .fetch_with_fallback(request, false, cancel.as_ref())
        .await?;
    let json = read_json_body(response).await?;
    if has_error_field(&json) {
        return Err(LlmError::upstream_payload(&request.label, &json, "upstream error"));
    }

    let direct = extract_text(&json);
    if !direct.is_empty() {
        return Ok(direct);
    }
    if has_function_call(&json) {
        return Err(LlmError::UnsupportedOperation(format!(
            "{} returned a function_call; tool calls need the chat stream",
            request.label
        )));
    }

    if let Some(stream_request) = stream_fallback {
        tracing::debug!(target: "siumai::stream", label = %request.label, "no text in JSON body; retrying as a stream");
        let collected = collect_deltas(executor, stream_request, cancel).await;
        match collected {
            Ok(text) if !text.trim().is_empty() => return Ok(text.trim().to_string()),
            Ok(_) => {}
            Err(e) => {
                return Err(LlmError::ParseError(format!(
                    "{} response has no parseable text (stream fallback failed: {e})",
                    request.label
                )));
            }
        }
    }

    Err(LlmError::ParseError(format!(
        "{} response has no parseable text (output_types={})",
        request.label,
        describe_output_types(&json)
    )))
}

async fn collect_deltas(
    executor: &HttpExecutor,
    request: &ProviderRequest,
    cancel: Option<CancelHandle>,
) -> Result<String, LlmError> {
    let mut stream = stream_text_deltas(executor, request, cancel).await?;
    let mut out = String::new();
    while let Some(delta) = stream.next().await {
        out.push_str(&delta?);
    }
    Ok(out)
}

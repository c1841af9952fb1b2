//! Responses chat stream
//!
//! Text deltas are keyed by output index and may be finalized by snapshots
//! (`output_text.done`, the final response's `output_text`). Function calls are
//! keyed by output index; the call id can arrive after the first fragment.
//! Reasoning text is buffered and emitted once at the end.

use crate::error::LlmError;
use crate::execution::http::{HttpExecutor, ProviderRequest};
use crate::providers::openai_responses::events::ResponsesEventKind;
use crate::providers::openai_responses::json::{
    extract_reasoning_summary, extract_text, function_call_fragment, function_call_fragments,
    output_items, reasoning_item_summary,
};
use crate::streaming::assembler::{ChunkAssembler, StreamOutcome};
use crate::streaming::completion::{
    StopReasonState, extract_responses_stop_reason, extract_responses_usage,
};
use crate::streaming::converters::ChatFrameConverter;
use crate::streaming::factory::{OpenedStream, StreamFactory};
use crate::streaming::sse_json::{SseFrame, SseFrameStats};
use crate::streaming::text::OutputTextTracker;
use crate::streaming::tool_calls::{ArgumentsUpdate, ToolCallAggregator, ToolCallFragment};
use crate::streaming::ChatChunkStream;
use crate::types::{ChatChunk, ChatStreamOptions, TokenUsage};
use crate::utils::json::{first_string, has_error_field, normalize_non_negative_int, normalize_string};
use serde_json::Value;

pub const CHAT_STREAM_LABEL: &str = "OpenAI(responses-chat-stream)";
const CHAT_STREAM_HINT: &str = "check that the base URL points at an OpenAI /responses SSE endpoint";

/// Output index of a text event; loose or missing values fall back to 0.
pub(crate) fn text_output_index(json: &Value) -> u64 {
    let raw = ["output_index", "outputIndex", "index"]
        .iter()
        .find_map(|k| json.get(*k).filter(|v| !v.is_null()));
    normalize_non_negative_int(raw).unwrap_or(0)
}

/// Response object of a terminal event, if it carries one.
pub(crate) fn event_response(json: &Value) -> Option<&Value> {
    json.get("response").filter(|r| r.is_object())
}

/// Per-call state of a Responses chat stream.
pub struct ResponsesChatConverter {
    label: String,
    assembler: ChunkAssembler,
    text: OutputTextTracker,
    thinking: String,
    tool_calls: ToolCallAggregator,
    usage: TokenUsage,
    stop: StopReasonState,
    final_response: Option<Value>,
}

impl ResponsesChatConverter {
    pub fn new(label: impl Into<String>, options: ChatStreamOptions) -> Self {
        let label = label.into();
        Self {
            assembler: ChunkAssembler::new(label.clone(), options),
            label,
            text: OutputTextTracker::new(),
            thinking: String::new(),
            tool_calls: ToolCallAggregator::by_index(),
            usage: TokenUsage::default(),
            stop: StopReasonState::default(),
            final_response: None,
        }
    }

    fn observe_output_item(&mut self, json: &Value, done: bool) {
        let Some(item) = json.get("item").filter(|i| i.is_object()) else {
            return;
        };
        if let Some(fragment) = function_call_fragment(item)
            && let Some(index) = normalize_non_negative_int(json.get("output_index"))
        {
            self.tool_calls.observe_at_index(index, fragment);
        }
        if done && self.thinking.is_empty() && normalize_string(item.get("type")) == "reasoning" {
            self.thinking = reasoning_item_summary(item);
        }
    }

    fn observe_arguments(&mut self, json: &Value, arguments: ArgumentsUpdate) {
        let Some(index) = normalize_non_negative_int(json.get("output_index")) else {
            return;
        };
        let fragment = ToolCallFragment {
            call_id: first_string(json, &["call_id", "callId", "callID"]),
            name: normalize_string(json.get("name")),
            arguments,
        };
        let has_arguments = match &fragment.arguments {
            ArgumentsUpdate::Append(s) | ArgumentsUpdate::Replace(s) => !s.is_empty(),
            ArgumentsUpdate::Keep => false,
        };
        if has_arguments || !fragment.call_id.is_empty() || !fragment.name.is_empty() {
            self.tool_calls.observe_at_index(index, fragment);
        }
    }

    fn merge_reasoning_done(&mut self, full: &str) {
        if full.is_empty() {
            return;
        }
        if self.thinking.is_empty() || full.starts_with(self.thinking.as_str()) {
            self.thinking = full.to_string();
        } else if !self.thinking.contains(full) {
            self.thinking.push('\n');
            self.thinking.push_str(full);
        }
    }

    /// Record a final response object; returns text never pushed as deltas.
    fn observe_final_response(&mut self, response: &Value) -> Option<ChatChunk> {
        self.stop.observe(extract_responses_stop_reason(response));
        self.usage
            .merge(extract_responses_usage(response.get("usage")));
        let rest = self.text.apply_final_text_all(&extract_text(response));
        self.final_response = Some(response.clone());
        self.assembler.text_chunk(&rest)
    }

    fn finish_with(
        &mut self,
        stats: SseFrameStats,
        mut ended_cleanly: bool,
    ) -> Result<Vec<ChatChunk>, LlmError> {
        let mut out = Vec::new();
        if let Some(response) = self.final_response.take() {
            let output = output_items(&response);
            for (index, fragment) in function_call_fragments(output) {
                self.tool_calls.observe_at_index(index, fragment);
            }
            let summary = extract_reasoning_summary(output);
            if !summary.is_empty() {
                self.thinking = summary;
            }
            self.usage
                .merge(extract_responses_usage(response.get("usage")));
            let rest = self.text.apply_final_text_all(&extract_text(&response));
            out.extend(self.assembler.text_chunk(&rest));
            ended_cleanly = true;
        }
        ended_cleanly |= stats.done_seen || self.stop.seen();

        let outcome = StreamOutcome {
            thinking: std::mem::take(&mut self.thinking),
            tool_calls: std::mem::replace(&mut self.tool_calls, ToolCallAggregator::by_index())
                .finalize(),
            usage: self.usage,
            stop: self.stop,
            ended_cleanly,
            stats,
        };
        out.extend(self.assembler.finish(outcome)?);
        Ok(out)
    }
}

impl ChatFrameConverter for ResponsesChatConverter {
    fn convert_frame(&mut self, frame: SseFrame) -> Result<Vec<ChatChunk>, LlmError> {
        let kind = ResponsesEventKind::of_frame(&frame);
        let json = &frame.json;
        tracing::trace!(target: "siumai::stream", label = %self.label, ?kind, "responses event");

        let chunk = match kind {
            ResponsesEventKind::OutputItemAdded => {
                self.observe_output_item(json, false);
                None
            }
            ResponsesEventKind::OutputItemDone => {
                self.observe_output_item(json, true);
                None
            }
            ResponsesEventKind::FunctionCallArgumentsDelta => {
                let delta = json.get("delta").and_then(Value::as_str).unwrap_or_default();
                self.observe_arguments(json, ArgumentsUpdate::Append(delta.to_string()));
                None
            }
            ResponsesEventKind::FunctionCallArgumentsDone => {
                let args = json.get("arguments").and_then(Value::as_str).unwrap_or_default();
                self.observe_arguments(json, ArgumentsUpdate::Replace(args.to_string()));
                None
            }
            ResponsesEventKind::OutputTextDelta => {
                let delta = json.get("delta").and_then(Value::as_str).unwrap_or_default();
                if delta.is_empty() {
                    None
                } else {
                    self.text.push_delta(text_output_index(json), delta);
                    self.assembler.text_chunk(delta)
                }
            }
            ResponsesEventKind::OutputTextDone => {
                let full = json.get("text").and_then(Value::as_str).unwrap_or_default();
                let rest = self.text.apply_final_text(text_output_index(json), full);
                self.assembler.text_chunk(&rest)
            }
            ResponsesEventKind::ReasoningSummaryTextDelta
            | ResponsesEventKind::ReasoningTextDelta => {
                if let Some(delta) = json.get("delta").and_then(Value::as_str) {
                    self.thinking.push_str(delta);
                }
                None
            }
            ResponsesEventKind::ReasoningSummaryTextDone => {
                self.merge_reasoning_done(&normalize_string(json.get("text")));
                None
            }
            ResponsesEventKind::Completed => match event_response(json) {
                Some(response) => self.observe_final_response(response),
                None => None,
            },
            ResponsesEventKind::Incomplete => match event_response(json) {
                Some(response) => self.observe_final_response(response),
                None => {
                    self.stop.observe(extract_responses_stop_reason(json));
                    None
                }
            },
            ResponsesEventKind::Failed => {
                let source = event_response(json).unwrap_or(json);
                return Err(LlmError::upstream_payload(
                    &self.label,
                    source,
                    "upstream failed",
                ));
            }
            ResponsesEventKind::ResponseError | ResponsesEventKind::Error => {
                return Err(LlmError::upstream_payload(
                    &self.label,
                    json,
                    "upstream error event",
                ));
            }
            ResponsesEventKind::Unknown => None,
        };
        Ok(chunk.into_iter().collect())
    }

    fn finish(&mut self, stats: SseFrameStats) -> Result<Vec<ChatChunk>, LlmError> {
        self.finish_with(stats, false)
    }

    fn convert_json(&mut self, json: Value) -> Result<Vec<ChatChunk>, LlmError> {
        if has_error_field(&json) {
            return Err(LlmError::upstream_payload(&self.label, &json, "upstream error"));
        }
        let parsed = u64::from(json.is_object());
        if parsed == 1 {
            self.stop.observe(extract_responses_stop_reason(&json));
            self.final_response = Some(json);
        }
        let stats = SseFrameStats {
            data_events: 1,
            parsed_chunks: parsed,
            done_seen: false,
        };
        self.finish_with(stats, false)
    }
}

/// Open a Responses chat stream for `request`.
pub async fn chat_stream(
    executor: &HttpExecutor,
    request: &ProviderRequest,
    options: ChatStreamOptions,
) -> Result<ChatChunkStream, LlmError> {
    let converter = ResponsesChatConverter::new(request.label.clone(), options.clone());
    match StreamFactory::open(executor, request, options.cancel, CHAT_STREAM_HINT).await? {
        OpenedStream::Json { json, .. } => StreamFactory::chat_stream_from_json(json, converter),
        OpenedStream::Sse(frames) => Ok(StreamFactory::chat_stream(frames, converter)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ResponseNode, StopReason};
    use serde_json::json;

    fn frame(event: &str, json: Value) -> SseFrame {
        SseFrame {
            event_type: Some(event.to_string()),
            json,
        }
    }

    fn feed(conv: &mut ResponsesChatConverter, frames: Vec<SseFrame>) -> Vec<ChatChunk> {
        frames
            .into_iter()
            .flat_map(|f| conv.convert_frame(f).expect("frame"))
            .collect()
    }

    fn stats(n: u64) -> SseFrameStats {
        SseFrameStats {
            data_events: n,
            parsed_chunks: n,
            done_seen: false,
        }
    }

    #[test]
    fn tool_use_ids_stay_unique_across_output_indices() {
        let mut conv = ResponsesChatConverter::new(CHAT_STREAM_LABEL, ChatStreamOptions::new());
        feed(
            &mut conv,
            vec![
                frame(
                    "response.output_item.done",
                    json!({"output_index": 0, "item": {"type": "function_call", "name": "a", "arguments": "{}"}}),
                ),
                frame(
                    "response.output_item.done",
                    json!({"output_index": 1, "item": {"type": "function_call", "call_id": "call_1", "name": "b", "arguments": "{}"}}),
                ),
            ],
        );
        let chunks = conv.finish(stats(2)).expect("finish");
        let ids: Vec<&str> = chunks
            .iter()
            .flat_map(|c| c.tool_uses())
            .filter_map(|n| match n {
                ResponseNode::ToolUse { tool_use_id, .. } => Some(tool_use_id.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(ids, vec!["call_2", "call_1"]);
    }

    #[test]
    fn streamed_function_call_arguments_concatenate() {
        let mut conv = ResponsesChatConverter::new(CHAT_STREAM_LABEL, ChatStreamOptions::new());
        let streamed = feed(
            &mut conv,
            vec![
                frame(
                    "response.output_item.added",
                    json!({"output_index": 0, "item": {"type": "function_call", "name": "lookup", "arguments": ""}}),
                ),
                frame(
                    "response.function_call_arguments.delta",
                    json!({"output_index": 0, "delta": "{\"q\":"}),
                ),
                frame(
                    "response.function_call_arguments.delta",
                    json!({"output_index": 0, "delta": "\"x\"}", "call_id": "call_1"}),
                ),
            ],
        );
        assert!(streamed.is_empty());

        let chunks = conv.finish(stats(3)).expect("finish");
        let tool_use = chunks.iter().flat_map(|c| c.tool_uses()).next().expect("tool use");
        match tool_use {
            ResponseNode::ToolUse {
                tool_use_id,
                tool_name,
                arguments_json,
                ..
            } => {
                assert_eq!(tool_use_id, "call_1");
                assert_eq!(tool_name, "lookup");
                assert_eq!(arguments_json, "{\"q\":\"x\"}");
            }
            other => panic!("unexpected node: {other:?}"),
        }
        // no explicit stop and no clean end
        assert_eq!(chunks.last().and_then(|c| c.stop_reason), None);
    }

    #[test]
    fn arguments_done_snapshot_replaces_deltas() {
        let mut conv = ResponsesChatConverter::new(CHAT_STREAM_LABEL, ChatStreamOptions::new());
        feed(
            &mut conv,
            vec![
                frame(
                    "response.function_call_arguments.delta",
                    json!({"output_index": 1, "delta": "{\"a\":1,\"b\"", "name": "f"}),
                ),
                frame(
                    "response.function_call_arguments.done",
                    json!({"output_index": 1, "arguments": "{\"a\":1}"}),
                ),
            ],
        );
        let chunks = conv.finish(stats(2)).expect("finish");
        match chunks[0].nodes.first() {
            Some(ResponseNode::ToolUse {
                tool_use_id,
                arguments_json,
                id,
                ..
            }) => {
                assert_eq!(arguments_json, "{\"a\":1}");
                assert_eq!(tool_use_id, "call_1");
                assert_eq!(*id, 1);
            }
            other => panic!("unexpected node: {other:?}"),
        }
    }

    #[test]
    fn text_deltas_and_completed_snapshot() {
        let mut conv = ResponsesChatConverter::new(CHAT_STREAM_LABEL, ChatStreamOptions::new());
        let chunks = feed(
            &mut conv,
            vec![
                frame("response.output_text.delta", json!({"output_index": 0, "delta": "Hel"})),
                frame("response.output_text.delta", json!({"output_index": 0, "delta": "lo"})),
                frame("response.output_text.done", json!({"output_index": 0, "text": "Hello"})),
                frame(
                    "response.completed",
                    json!({"response": {
                        "status": "completed",
                        "output_text": "Hello!",
                        "usage": {"input_tokens": 9, "output_tokens": 3}
                    }}),
                ),
            ],
        );
        let texts: Vec<&str> = chunks.iter().map(|c| c.text.as_str()).collect();
        assert_eq!(texts, vec!["Hel", "lo", "!"]);

        let tail = conv.finish(stats(4)).expect("finish");
        assert_eq!(tail.len(), 2);
        assert_eq!(tail[0].usage.and_then(|u| u.input_tokens), Some(9));
        assert_eq!(tail[1].stop_reason, Some(StopReason::Stop));
    }

    #[test]
    fn incomplete_status_maps_reason() {
        let mut conv = ResponsesChatConverter::new(CHAT_STREAM_LABEL, ChatStreamOptions::new());
        feed(
            &mut conv,
            vec![
                frame("response.output_text.delta", json!({"delta": "partial"})),
                frame(
                    "response.incomplete",
                    json!({"response": {"status": "incomplete", "incomplete_details": {"reason": "max_output_tokens"}}}),
                ),
            ],
        );
        let tail = conv.finish(stats(2)).expect("finish");
        assert_eq!(tail.last().and_then(|c| c.stop_reason), Some(StopReason::MaxTokens));
    }

    #[test]
    fn reasoning_is_buffered_into_one_chunk() {
        let mut conv = ResponsesChatConverter::new(CHAT_STREAM_LABEL, ChatStreamOptions::new());
        let streamed = feed(
            &mut conv,
            vec![
                frame("response.reasoning_summary_text.delta", json!({"delta": "Think"})),
                frame("response.reasoning_summary_text.done", json!({"text": "Thinking hard"})),
                frame("response.output_text.delta", json!({"delta": "ok"})),
            ],
        );
        assert_eq!(streamed.len(), 1);
        let tail = conv.finish(SseFrameStats {
            done_seen: true,
            ..stats(3)
        })
        .expect("finish");
        assert!(matches!(
            &tail[0].nodes[0],
            ResponseNode::Thinking { summary, id: 2 } if summary == "Thinking hard"
        ));
        assert_eq!(tail[1].stop_reason, Some(StopReason::Stop));
    }

    #[test]
    fn failure_events_abort() {
        let mut conv = ResponsesChatConverter::new(CHAT_STREAM_LABEL, ChatStreamOptions::new());
        let err = conv
            .convert_frame(frame(
                "response.failed",
                json!({"response": {"status": "failed", "error": {"message": "model crashed"}}}),
            ))
            .expect_err("failed");
        assert!(err.to_string().contains("model crashed"));

        let err = conv
            .convert_frame(SseFrame {
                event_type: None,
                json: json!({"type": "error", "message": "rate limited"}),
            })
            .expect_err("error");
        assert!(matches!(err, LlmError::UpstreamError { ref message, .. } if message == "rate limited"));
    }

    #[test]
    fn buffered_json_emits_text_tools_and_reasoning() {
        let mut conv = ResponsesChatConverter::new(
            CHAT_STREAM_LABEL,
            ChatStreamOptions::new().with_node_id_start(100),
        );
        let chunks = conv
            .convert_json(json!({
                "status": "completed",
                "error": null,
                "output": [
                    {"type": "reasoning", "summary": [{"type": "summary_text", "text": "why"}]},
                    {"type": "message", "content": [{"type": "output_text", "text": "Answer"}]},
                    {"type": "function_call", "name": "lookup", "arguments": "{}"}
                ]
            }))
            .expect("chunks");
        assert_eq!(chunks[0].text, "Answer");
        assert_eq!(chunks[0].nodes[0].id(), 101);
        assert!(matches!(chunks[1].nodes[0], ResponseNode::Thinking { id: 102, .. }));
        assert!(matches!(
            &chunks[2].nodes[0],
            ResponseNode::ToolUse { tool_use_id, id: 103, .. } if tool_use_id == "call_103"
        ));
        assert_eq!(chunks.last().and_then(|c| c.stop_reason), Some(StopReason::ToolUse));
    }

    #[test]
    fn empty_stream_is_an_error() {
        let mut conv = ResponsesChatConverter::new(CHAT_STREAM_LABEL, ChatStreamOptions::new());
        feed(
            &mut conv,
            vec![frame("response.created", json!({"response": {"status": "in_progress"}}))],
        );
        let err = conv.finish(stats(1)).expect_err("empty");
        assert!(matches!(err, LlmError::EmptyResult { data_events: 1, .. }));
    }
}

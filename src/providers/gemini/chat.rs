//! Gemini chat stream
//!
//! Text arrives as (possibly cumulative) part text and is reconciled into true
//! deltas. Function calls are complete per part and keyed by id, with
//! signature-derived ids for gateways that omit one.

use crate::error::LlmError;
use crate::execution::http::{HttpExecutor, ProviderRequest};
use crate::providers::gemini::json::{GeminiPartKind, candidate_parts, first_candidate};
use crate::streaming::assembler::{ChunkAssembler, StreamOutcome};
use crate::streaming::completion::{StopReasonState, extract_gemini_stop_reason, extract_gemini_usage};
use crate::streaming::converters::ChatFrameConverter;
use crate::streaming::factory::{OpenedStream, StreamFactory};
use crate::streaming::sse_json::{SseFrame, SseFrameStats};
use crate::streaming::text::CumulativeText;
use crate::streaming::tool_calls::ToolCallAggregator;
use crate::streaming::ChatChunkStream;
use crate::types::{ChatChunk, ChatStreamOptions, TokenUsage};
use crate::utils::json::has_error_field;
use serde_json::Value;

pub const CHAT_STREAM_LABEL: &str = "Gemini(chat-stream)";
const CHAT_STREAM_HINT: &str = "check that the base URL points at Gemini /streamGenerateContent SSE";

/// Per-call state of a Gemini chat stream.
pub struct GeminiChatConverter {
    label: String,
    assembler: ChunkAssembler,
    text: CumulativeText,
    thinking: String,
    tool_calls: ToolCallAggregator,
    usage: TokenUsage,
    stop: StopReasonState,
}

impl GeminiChatConverter {
    pub fn new(label: impl Into<String>, options: ChatStreamOptions) -> Self {
        let label = label.into();
        Self {
            assembler: ChunkAssembler::new(label.clone(), options),
            label,
            text: CumulativeText::new(),
            thinking: String::new(),
            tool_calls: ToolCallAggregator::by_id(),
            usage: TokenUsage::default(),
            stop: StopReasonState::default(),
        }
    }

    fn check_upstream_error(&self, json: &Value) -> Result<(), LlmError> {
        if has_error_field(json) {
            return Err(LlmError::upstream_payload(&self.label, json, "upstream error"));
        }
        Ok(())
    }

    /// Fold one payload into the state; returns the text chunk, if any.
    fn observe_payload(&mut self, json: &Value) -> Option<ChatChunk> {
        self.usage.merge(extract_gemini_usage(json));
        self.stop
            .observe(extract_gemini_stop_reason(first_candidate(json)));

        let mut chunk_text = String::new();
        for part in candidate_parts(json) {
            match part {
                GeminiPartKind::Text(text) => chunk_text.push_str(&text),
                GeminiPartKind::Thought(text) => self.thinking.push_str(&text),
                GeminiPartKind::FunctionCall(call) => {
                    let explicit = Some(call.id.as_str()).filter(|id| !id.is_empty());
                    self.tool_calls
                        .observe_call(explicit, &call.name, &call.arguments_json);
                }
            }
        }
        if chunk_text.is_empty() {
            return None;
        }
        let delta = self.text.push(&chunk_text);
        self.assembler.text_chunk(&delta)
    }

    fn finish_with(
        &mut self,
        stats: SseFrameStats,
        ended_cleanly: bool,
    ) -> Result<Vec<ChatChunk>, LlmError> {
        let outcome = StreamOutcome {
            thinking: std::mem::take(&mut self.thinking),
            tool_calls: std::mem::replace(&mut self.tool_calls, ToolCallAggregator::by_id())
                .finalize(),
            usage: self.usage,
            stop: self.stop,
            ended_cleanly,
            stats,
        };
        self.assembler.finish(outcome)
    }
}

impl ChatFrameConverter for GeminiChatConverter {
    fn convert_frame(&mut self, frame: SseFrame) -> Result<Vec<ChatChunk>, LlmError> {
        self.check_upstream_error(&frame.json)?;
        Ok(self.observe_payload(&frame.json).into_iter().collect())
    }

    fn finish(&mut self, stats: SseFrameStats) -> Result<Vec<ChatChunk>, LlmError> {
        let ended_cleanly = stats.done_seen || self.stop.seen();
        self.finish_with(stats, ended_cleanly)
    }

    fn convert_json(&mut self, json: Value) -> Result<Vec<ChatChunk>, LlmError> {
        self.check_upstream_error(&json)?;
        let parsed = u64::from(json.is_object());
        let mut out: Vec<ChatChunk> = self.observe_payload(&json).into_iter().collect();
        let stats = SseFrameStats {
            data_events: 1,
            parsed_chunks: parsed,
            done_seen: false,
        };
        out.extend(self.finish_with(stats, parsed == 1)?);
        Ok(out)
    }
}

/// Open a Gemini chat stream for `request`.
///
/// The request is sent with the fallback policy; the returned stream is lazy.
pub async fn chat_stream(
    executor: &HttpExecutor,
    request: &ProviderRequest,
    options: ChatStreamOptions,
) -> Result<ChatChunkStream, LlmError> {
    let converter = GeminiChatConverter::new(request.label.clone(), options.clone());
    match StreamFactory::open(executor, request, options.cancel, CHAT_STREAM_HINT).await? {
        OpenedStream::Json { json, .. } => StreamFactory::chat_stream_from_json(json, converter),
        OpenedStream::Sse(frames) => Ok(StreamFactory::chat_stream(frames, converter)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::streaming::sse_json::{SseFrameStream, SseJsonStreamConfig};
    use crate::types::{ResponseNode, StopReason};
    use futures::StreamExt;
    use serde_json::json;

    async fn run(lines: Vec<&'static str>, options: ChatStreamOptions) -> Vec<Result<ChatChunk, LlmError>> {
        let data: Vec<Result<&'static [u8], LlmError>> =
            lines.into_iter().map(|c| Ok(c.as_bytes())).collect();
        let frames = SseFrameStream::new(
            futures::stream::iter(data),
            SseJsonStreamConfig::new(CHAT_STREAM_LABEL),
        );
        let converter = GeminiChatConverter::new(CHAT_STREAM_LABEL, options);
        StreamFactory::chat_stream(frames, converter).collect().await
    }

    #[tokio::test]
    async fn cumulative_text_becomes_deltas() {
        let out = run(
            vec![
                "data: {\"candidates\":[{\"content\":{\"parts\":[{\"text\":\"Hello\"}]}}]}\n\n",
                "data: {\"candidates\":[{\"content\":{\"parts\":[{\"text\":\"Hello world\"}]},\"finishReason\":\"STOP\"}]}\n\n",
            ],
            ChatStreamOptions::new(),
        )
        .await;
        let chunks: Vec<ChatChunk> = out.into_iter().map(|r| r.expect("chunk")).collect();
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0].text, "Hello");
        assert_eq!(chunks[1].text, " world");
        assert_eq!(chunks[2].stop_reason, Some(StopReason::Stop));
        assert_eq!(chunks[1].nodes[0].id(), 2);
    }

    #[tokio::test]
    async fn repeated_function_calls_collapse() {
        let call = "data: {\"candidates\":[{\"content\":{\"parts\":[{\"functionCall\":{\"name\":\"get weather\",\"args\":{\"city\":\"Paris\"}}}]}}],\"usageMetadata\":{\"promptTokenCount\":7,\"candidatesTokenCount\":2}}\n\n";
        let out = run(vec![call, call, "data: [DONE]\n\n"], ChatStreamOptions::new()).await;
        let chunks: Vec<ChatChunk> = out.into_iter().map(|r| r.expect("chunk")).collect();

        let tool_uses: Vec<&ResponseNode> = chunks.iter().flat_map(|c| c.tool_uses()).collect();
        assert_eq!(tool_uses.len(), 1);
        match tool_uses[0] {
            ResponseNode::ToolUse {
                tool_use_id,
                arguments_json,
                ..
            } => {
                assert_eq!(tool_use_id, "tool-get_weather-1");
                assert_eq!(arguments_json, r#"{"city":"Paris"}"#);
            }
            other => panic!("unexpected node: {other:?}"),
        }

        let usage = chunks.iter().find_map(|c| c.usage).expect("usage chunk");
        assert_eq!(usage.input_tokens, Some(7));
        let last = chunks.last().expect("final");
        assert_eq!(last.stop_reason, Some(StopReason::ToolUse));
    }

    #[tokio::test]
    async fn thought_parts_become_one_thinking_chunk() {
        let out = run(
            vec![
                "data: {\"candidates\":[{\"content\":{\"parts\":[{\"text\":\"step one. \",\"thought\":true}]}}]}\n\n",
                "data: {\"candidates\":[{\"content\":{\"parts\":[{\"text\":\"step two\",\"thought\":true},{\"text\":\"Answer\"}]},\"finishReason\":\"MAX_TOKENS\"}]}\n\n",
            ],
            ChatStreamOptions::new().with_node_id_start(5),
        )
        .await;
        let chunks: Vec<ChatChunk> = out.into_iter().map(|r| r.expect("chunk")).collect();
        assert_eq!(chunks[0].text, "Answer");
        assert_eq!(chunks[0].nodes[0].id(), 6);
        match &chunks[1].nodes[0] {
            ResponseNode::Thinking { id, summary } => {
                assert_eq!(*id, 7);
                assert_eq!(summary, "step one. step two");
            }
            other => panic!("unexpected node: {other:?}"),
        }
        assert_eq!(chunks.last().and_then(|c| c.stop_reason), Some(StopReason::MaxTokens));
    }

    #[tokio::test]
    async fn error_payload_aborts_the_stream() {
        let out = run(
            vec![
                "data: {\"candidates\":[{\"content\":{\"parts\":[{\"text\":\"partial\"}]}}]}\n\n",
                "data: {\"error\":{\"code\":503,\"message\":\"overloaded\"}}\n\n",
                "data: {\"candidates\":[{\"content\":{\"parts\":[{\"text\":\"never\"}]}}]}\n\n",
            ],
            ChatStreamOptions::new(),
        )
        .await;
        assert_eq!(out.len(), 2);
        assert!(out[0].is_ok());
        match &out[1] {
            Err(LlmError::UpstreamError { message, .. }) => assert_eq!(message, "overloaded"),
            other => panic!("unexpected item: {other:?}"),
        }
    }

    #[tokio::test]
    async fn no_data_frames_is_an_empty_result() {
        let out = run(vec![": ping\n\n"], ChatStreamOptions::new()).await;
        assert_eq!(out.len(), 1);
        assert!(matches!(
            out[0],
            Err(LlmError::EmptyResult {
                data_events: 0,
                parsed_chunks: 0,
                ..
            })
        ));
    }

    #[tokio::test]
    async fn unclean_end_reports_no_stop_reason() {
        let out = run(
            vec!["data: {\"candidates\":[{\"content\":{\"parts\":[{\"text\":\"cut\"}]}}]}\n\n"],
            ChatStreamOptions::new(),
        )
        .await;
        let last = out.last().expect("final").as_ref().expect("chunk");
        assert_eq!(last.stop_reason, None);
    }

    #[test]
    fn buffered_json_uses_the_same_assembly() {
        let mut converter = GeminiChatConverter::new(
            CHAT_STREAM_LABEL,
            ChatStreamOptions::new().with_tool_use_start(true),
        );
        let chunks = converter
            .convert_json(json!({
                "candidates": [{
                    "content": {"parts": [
                        {"functionCall": {"id": "call-weather-1", "name": "get_weather", "args": {"location": "Tokyo"}}}
                    ]},
                    "finishReason": "STOP"
                }]
            }))
            .expect("chunks");
        assert_eq!(chunks.len(), 3);
        assert!(matches!(
            &chunks[0].nodes[0],
            ResponseNode::ToolUseStart { tool_use_id, .. } if tool_use_id == "call-weather-1"
        ));
        assert_eq!(chunks[2].stop_reason, Some(StopReason::ToolUse));
    }
}

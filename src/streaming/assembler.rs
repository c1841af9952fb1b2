//! Canonical chunk assembly
//!
//! Emission order for one call:
//! 1. text chunks, one per non-empty delta, as frames arrive
//! 2. at most one thinking chunk, after the event loop
//! 3. tool-use chunks (optionally preceded by tool-use-start) per finalized record
//! 4. at most one usage chunk
//! 5. exactly one final chunk carrying the stop reason
//!
//! A single node-id counter is shared by every node kind of the call, and every
//! emitted tool-use id is unique within it.

use crate::error::LlmError;
use crate::streaming::completion::StopReasonState;
use crate::streaming::sse_json::SseFrameStats;
use crate::streaming::tool_calls::ToolCallRecord;
use crate::types::{ChatChunk, ChatStreamOptions, ResponseNode, StopReason, TokenUsage};
use std::collections::HashSet;

/// Everything gathered by a driver's event loop, consumed once at the end.
#[derive(Debug, Clone, Default)]
pub struct StreamOutcome {
    pub thinking: String,
    pub tool_calls: Vec<ToolCallRecord>,
    pub usage: TokenUsage,
    pub stop: StopReasonState,
    /// Done sentinel observed or an explicit completion event seen
    pub ended_cleanly: bool,
    pub stats: SseFrameStats,
}

#[derive(Debug, Clone)]
pub struct ChunkAssembler {
    label: String,
    node_id: u64,
    text_chunks: u64,
    tool_uses: u64,
    thinking_emitted: bool,
    /// Tool-use ids already emitted
    emitted_tool_ids: HashSet<String>,
    /// Upstream ids of records still to be emitted; synthesized ids avoid them
    reserved_tool_ids: HashSet<String>,
    options: ChatStreamOptions,
}

impl ChunkAssembler {
    pub fn new(label: impl Into<String>, options: ChatStreamOptions) -> Self {
        Self {
            label: label.into(),
            node_id: options.node_id_start,
            text_chunks: 0,
            tool_uses: 0,
            thinking_emitted: false,
            emitted_tool_ids: HashSet::new(),
            reserved_tool_ids: HashSet::new(),
            options,
        }
    }

    /// Last node id handed out (the seed if none yet).
    pub fn node_id(&self) -> u64 {
        self.node_id
    }

    pub fn text_chunks(&self) -> u64 {
        self.text_chunks
    }

    pub fn saw_tool_use(&self) -> bool {
        self.tool_uses > 0
    }

    fn next_id(&mut self) -> u64 {
        self.node_id += 1;
        self.node_id
    }

    /// A text chunk for `delta`, or `None` when it is empty.
    pub fn text_chunk(&mut self, delta: &str) -> Option<ChatChunk> {
        if delta.is_empty() {
            return None;
        }
        let id = self.next_id();
        self.text_chunks += 1;
        Some(ChatChunk {
            text: delta.to_string(),
            nodes: vec![ResponseNode::Text {
                id,
                content: delta.to_string(),
            }],
            ..Default::default()
        })
    }

    /// The single thinking chunk of the call.
    pub fn thinking_chunk(&mut self, summary: &str) -> Option<ChatChunk> {
        let summary = summary.trim();
        if summary.is_empty() || self.thinking_emitted {
            return None;
        }
        self.thinking_emitted = true;
        let id = self.next_id();
        Some(ChatChunk {
            nodes: vec![ResponseNode::Thinking {
                id,
                summary: summary.to_string(),
            }],
            ..Default::default()
        })
    }

    /// Reserve the upstream ids of `records` so ids synthesized for their
    /// siblings cannot collide with them.
    pub fn reserve_tool_ids(&mut self, records: &[ToolCallRecord]) {
        self.reserved_tool_ids.extend(
            records
                .iter()
                .map(|rec| rec.tool_use_id.trim())
                .filter(|id| !id.is_empty())
                .map(str::to_string),
        );
    }

    /// The id a tool-use is emitted under: the upstream id unless it was
    /// already emitted, else the first free `call_<n>` from the next node id.
    fn unique_tool_use_id(&mut self, upstream: &str) -> String {
        let upstream = upstream.trim();
        let id = if !upstream.is_empty() && !self.emitted_tool_ids.contains(upstream) {
            upstream.to_string()
        } else {
            let mut n = self.node_id + 1;
            loop {
                let candidate = format!("call_{n}");
                if !self.emitted_tool_ids.contains(&candidate)
                    && !self.reserved_tool_ids.contains(&candidate)
                {
                    break candidate;
                }
                n += 1;
            }
        };
        self.emitted_tool_ids.insert(id.clone());
        id
    }

    /// Chunks for one finalized tool call. A record without an id (or whose id
    /// was already used) gets `call_<n>`; empty arguments become `{}`.
    pub fn tool_use_chunks(&mut self, record: &ToolCallRecord) -> Vec<ChatChunk> {
        let tool_name = record.tool_name.trim();
        if tool_name.is_empty() {
            return Vec::new();
        }
        let tool_use_id = self.unique_tool_use_id(&record.tool_use_id);
        let arguments_json = match record.arguments_json.trim() {
            "" => "{}".to_string(),
            args => args.to_string(),
        };
        let meta = self.options.tool_meta(tool_name);

        let mut chunks = Vec::with_capacity(2);
        if self.options.support_tool_use_start {
            let id = self.next_id();
            chunks.push(ChatChunk {
                nodes: vec![ResponseNode::ToolUseStart {
                    id,
                    tool_use_id: tool_use_id.clone(),
                    tool_name: tool_name.to_string(),
                    mcp_server_name: meta.server_name.clone(),
                    mcp_tool_name: meta.remote_tool_name.clone(),
                }],
                ..Default::default()
            });
        }
        let id = self.next_id();
        chunks.push(ChatChunk {
            nodes: vec![ResponseNode::ToolUse {
                id,
                tool_use_id,
                tool_name: tool_name.to_string(),
                arguments_json,
                mcp_server_name: meta.server_name,
                mcp_tool_name: meta.remote_tool_name,
            }],
            ..Default::default()
        });
        self.tool_uses += 1;
        chunks
    }

    /// The usage chunk, only when at least one figure is known.
    pub fn usage_chunk(&self, usage: TokenUsage) -> Option<ChatChunk> {
        if usage.is_empty() {
            return None;
        }
        Some(ChatChunk {
            usage: Some(usage),
            ..Default::default()
        })
    }

    /// The terminal chunk.
    pub fn final_chunk(&self, stop: &StopReasonState, ended_cleanly: bool) -> ChatChunk {
        ChatChunk {
            stop_reason: resolve_stop_reason(stop.reason(), self.saw_tool_use(), ended_cleanly),
            ..Default::default()
        }
    }

    /// Steps 2-5 of the emission order, guarded against empty results.
    pub fn finish(&mut self, outcome: StreamOutcome) -> Result<Vec<ChatChunk>, LlmError> {
        let StreamOutcome {
            thinking,
            tool_calls,
            usage,
            stop,
            ended_cleanly,
            stats,
        } = outcome;

        let has_thinking = !thinking.trim().is_empty();
        let has_tools = tool_calls.iter().any(|tc| !tc.tool_name.trim().is_empty());
        if self.text_chunks == 0 && !has_thinking && !has_tools && usage.is_empty() {
            return Err(LlmError::EmptyResult {
                label: self.label.clone(),
                data_events: stats.data_events,
                parsed_chunks: stats.parsed_chunks,
            });
        }

        let mut out = Vec::new();
        out.extend(self.thinking_chunk(&thinking));
        self.reserve_tool_ids(&tool_calls);
        for record in &tool_calls {
            out.extend(self.tool_use_chunks(record));
        }
        out.extend(self.usage_chunk(usage));
        out.push(self.final_chunk(&stop, ended_cleanly));

        tracing::debug!(
            target: "siumai::stream",
            label = %self.label,
            text_chunks = self.text_chunks,
            tool_uses = self.tool_uses,
            data_events = stats.data_events,
            parsed_chunks = stats.parsed_chunks,
            done_seen = stats.done_seen,
            "stream finished"
        );
        Ok(out)
    }
}

/// Stop reason carried by the final chunk.
///
/// An explicit reason wins, except that a plain `Stop` becomes `ToolUse` when
/// tool calls were emitted. Without an explicit reason a clean end defaults to
/// `Stop` (or `ToolUse`); an unclean end reports none.
pub fn resolve_stop_reason(
    explicit: Option<StopReason>,
    saw_tool_use: bool,
    ended_cleanly: bool,
) -> Option<StopReason> {
    match explicit {
        Some(StopReason::Stop) if saw_tool_use => Some(StopReason::ToolUse),
        Some(reason) => Some(reason),
        None if ended_cleanly => Some(if saw_tool_use {
            StopReason::ToolUse
        } else {
            StopReason::Stop
        }),
        None => None,
    }
}

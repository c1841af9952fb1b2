//! Canonical output types
//!
//! Every provider driver emits the same chunk protocol: a text delta plus an
//! ordered list of typed nodes, optionally carrying a stop reason or usage.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

use crate::utils::cancel::CancelHandle;

/// Canonical reason why generation ended.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// Completed naturally (Gemini `STOP`, Responses `completed`)
    Stop,
    /// Output token limit reached
    MaxTokens,
    /// The model requested tool calls
    ToolUse,
    /// Blocked by a safety/content filter
    Safety,
    /// Anything the upstream reported that has no canonical counterpart
    Other,
}

/// Token usage, each figure nullable.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct TokenUsage {
    pub input_tokens: Option<u64>,
    pub output_tokens: Option<u64>,
    pub cache_read_input_tokens: Option<u64>,
}

impl TokenUsage {
    /// `true` when no figure is known.
    pub fn is_empty(&self) -> bool {
        self.input_tokens.is_none()
            && self.output_tokens.is_none()
            && self.cache_read_input_tokens.is_none()
    }

    /// Overwrite each field with the newer value when that value is present.
    pub fn merge(&mut self, newer: TokenUsage) {
        if newer.input_tokens.is_some() {
            self.input_tokens = newer.input_tokens;
        }
        if newer.output_tokens.is_some() {
            self.output_tokens = newer.output_tokens;
        }
        if newer.cache_read_input_tokens.is_some() {
            self.cache_read_input_tokens = newer.cache_read_input_tokens;
        }
    }
}

/// A typed element inside a [`ChatChunk`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ResponseNode {
    Text {
        id: u64,
        content: String,
    },
    Thinking {
        id: u64,
        summary: String,
    },
    ToolUseStart {
        id: u64,
        tool_use_id: String,
        tool_name: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        mcp_server_name: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        mcp_tool_name: Option<String>,
    },
    ToolUse {
        id: u64,
        tool_use_id: String,
        tool_name: String,
        arguments_json: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        mcp_server_name: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        mcp_tool_name: Option<String>,
    },
}

impl ResponseNode {
    pub fn id(&self) -> u64 {
        match self {
            Self::Text { id, .. }
            | Self::Thinking { id, .. }
            | Self::ToolUseStart { id, .. }
            | Self::ToolUse { id, .. } => *id,
        }
    }
}

/// One unit of the canonical output protocol.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatChunk {
    pub text: String,
    pub nodes: Vec<ResponseNode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop_reason: Option<StopReason>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage: Option<TokenUsage>,
}

impl ChatChunk {
    /// Tool-use nodes carried by this chunk.
    pub fn tool_uses(&self) -> impl Iterator<Item = &ResponseNode> {
        self.nodes
            .iter()
            .filter(|n| matches!(n, ResponseNode::ToolUse { .. }))
    }
}

/// MCP routing metadata for a tool exposed to the model.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToolMeta {
    pub server_name: Option<String>,
    pub remote_tool_name: Option<String>,
}

/// Per-call inputs of a chat stream.
///
/// `tool_meta_by_name` is read-only and may be shared across concurrent calls.
#[derive(Debug, Clone, Default)]
pub struct ChatStreamOptions {
    pub tool_meta_by_name: Arc<HashMap<String, ToolMeta>>,
    /// Emit a tool-use-start chunk before each tool-use chunk
    pub support_tool_use_start: bool,
    /// First node id is `node_id_start + 1`
    pub node_id_start: u64,
    pub cancel: Option<CancelHandle>,
}

impl ChatStreamOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tool_meta(mut self, tool_meta_by_name: Arc<HashMap<String, ToolMeta>>) -> Self {
        self.tool_meta_by_name = tool_meta_by_name;
        self
    }

    pub fn with_tool_use_start(mut self, enabled: bool) -> Self {
        self.support_tool_use_start = enabled;
        self
    }

    pub fn with_node_id_start(mut self, node_id_start: u64) -> Self {
        self.node_id_start = node_id_start;
        self
    }

    pub fn with_cancel(mut self, cancel: CancelHandle) -> Self {
        self.cancel = Some(cancel);
        self
    }

    pub(crate) fn tool_meta(&self, tool_name: &str) -> ToolMeta {
        self.tool_meta_by_name
            .get(tool_name)
            .cloned()
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn usage_merge_keeps_last_non_null() {
        let mut usage = TokenUsage {
            input_tokens: Some(10),
            output_tokens: Some(1),
            cache_read_input_tokens: None,
        };
        usage.merge(TokenUsage {
            input_tokens: None,
            output_tokens: Some(7),
            cache_read_input_tokens: Some(2),
        });
        assert_eq!(usage.input_tokens, Some(10));
        assert_eq!(usage.output_tokens, Some(7));
        assert_eq!(usage.cache_read_input_tokens, Some(2));
        assert!(!usage.is_empty());
        assert!(TokenUsage::default().is_empty());
    }

    #[test]
    fn nodes_serialize_with_type_tag() {
        let node = ResponseNode::Text {
            id: 3,
            content: "hi".to_string(),
        };
        let json = serde_json::to_value(&node).unwrap();
        assert_eq!(json["type"], "text");
        assert_eq!(json["id"], 3);
        assert_eq!(node.id(), 3);
    }
}

//! Frame converters
//!
//! A converter owns the per-call state of one provider driver. The factory
//! pulls frames and feeds them in one at a time; processing a received frame
//! is synchronous.

use crate::error::LlmError;
use crate::streaming::sse_json::{SseFrame, SseFrameStats};
use crate::types::ChatChunk;

/// Converts provider frames into canonical chat chunks.
pub trait ChatFrameConverter: Send {
    /// Chunks to emit right away for one frame (text deltas).
    fn convert_frame(&mut self, frame: SseFrame) -> Result<Vec<ChatChunk>, LlmError>;

    /// Chunks emitted once the frame sequence is drained: thinking, tool uses,
    /// usage and the final chunk.
    fn finish(&mut self, stats: SseFrameStats) -> Result<Vec<ChatChunk>, LlmError>;

    /// Convert a buffered (non-SSE) JSON body into the equivalent chunk list.
    fn convert_json(&mut self, json: serde_json::Value) -> Result<Vec<ChatChunk>, LlmError>;
}

/// Converts provider frames into plain text deltas.
pub trait TextFrameConverter: Send {
    fn convert_frame(&mut self, frame: SseFrame) -> Result<Vec<String>, LlmError>;
}

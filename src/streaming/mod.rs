//! Streaming normalization
//!
//! Leaves first: the SSE frame iterator, text reconciliation, tool-call
//! aggregation and stop/usage extraction feed the chunk assembler; converters
//! hold per-call provider state and the factory wires them to a response.

pub mod assembler;
pub mod completion;
pub mod converters;
pub mod factory;
pub mod sse_json;
pub mod text;
pub mod tool_calls;

use crate::error::LlmError;
use crate::types::ChatChunk;
use futures::Stream;
use std::pin::Pin;

pub use assembler::{ChunkAssembler, StreamOutcome, resolve_stop_reason};
pub use completion::StopReasonState;
pub use converters::{ChatFrameConverter, TextFrameConverter};
pub use factory::{OpenedStream, StreamFactory};
pub use sse_json::{SseFrame, SseFrameStats, SseFrameStream, SseJsonStreamConfig};
pub use text::{CumulativeText, OutputTextTracker, TextDelta, derive_cumulative_text_delta};
pub use tool_calls::{
    ArgumentsUpdate, ToolCallAggregator, ToolCallFragment, ToolCallKeying, ToolCallRecord,
};

/// Canonical chat chunk stream of one call.
pub type ChatChunkStream = Pin<Box<dyn Stream<Item = Result<ChatChunk, LlmError>> + Send>>;

/// Plain text delta stream.
pub type TextDeltaStream = Pin<Box<dyn Stream<Item = Result<String, LlmError>> + Send>>;

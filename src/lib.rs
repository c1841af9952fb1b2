//! siumai-normalize
//!
//! Streaming normalization engine: turns Gemini and OpenAI Responses-style
//! SSE (or buffered JSON) responses into one canonical sequence of chat chunks.
#![deny(unsafe_code)]

pub mod error;
pub mod execution;
pub mod providers;
pub mod streaming;
pub mod types;
pub mod utils;

pub use error::LlmError;
pub use execution::http::{HttpConfig, HttpExecutor, ProviderRequest};
pub use streaming::{ChatChunkStream, TextDeltaStream};
pub use types::{ChatChunk, ChatStreamOptions, ResponseNode, StopReason, TokenUsage, ToolMeta};
pub use utils::cancel::CancelHandle;

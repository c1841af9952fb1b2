//! Gemini driver
//!
//! Candidate-style payloads: `candidates[0].content.parts[]` and a
//! `finishReason`, streamed over SSE or returned as one JSON body.

pub mod chat;
pub mod json;
pub mod text;

pub use chat::{CHAT_STREAM_LABEL, GeminiChatConverter, chat_stream};
pub use text::{
    COMPLETE_TEXT_LABEL, GeminiTextConverter, TEXT_STREAM_LABEL, complete_text, stream_text_deltas,
};

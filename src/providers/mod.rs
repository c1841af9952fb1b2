//! Provider drivers
//!
//! Each driver maps its provider's event shapes onto the shared streaming
//! components and exposes `chat_stream`, `stream_text_deltas` and
//! `complete_text`.

pub mod gemini;
pub mod openai_responses;

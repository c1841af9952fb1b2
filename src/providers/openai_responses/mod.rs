//! OpenAI Responses-style driver
//!
//! Status-style event streams (`response.*` events) and the equivalent
//! non-streaming response object.

pub mod chat;
pub mod events;
pub mod json;
pub mod text;

pub use chat::{CHAT_STREAM_LABEL, ResponsesChatConverter, chat_stream};
pub use events::ResponsesEventKind;
pub use text::{
    COMPLETE_TEXT_LABEL, ResponsesTextConverter, TEXT_STREAM_LABEL, complete_text,
    stream_text_deltas,
};

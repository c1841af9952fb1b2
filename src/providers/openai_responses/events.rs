//! Responses stream event kinds

use crate::streaming::sse_json::SseFrame;
use crate::utils::json::normalize_string;

/// Event kinds this driver acts on. Everything else is `Unknown` and ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResponsesEventKind {
    OutputItemAdded,
    OutputItemDone,
    FunctionCallArgumentsDelta,
    FunctionCallArgumentsDone,
    OutputTextDelta,
    OutputTextDone,
    ReasoningSummaryTextDelta,
    ReasoningSummaryTextDone,
    ReasoningTextDelta,
    Completed,
    Incomplete,
    Failed,
    ResponseError,
    Error,
    Unknown,
}

impl ResponsesEventKind {
    pub fn parse(name: &str) -> Self {
        match name.trim() {
            "response.output_item.added" => Self::OutputItemAdded,
            "response.output_item.done" => Self::OutputItemDone,
            "response.function_call_arguments.delta" => Self::FunctionCallArgumentsDelta,
            "response.function_call_arguments.done" => Self::FunctionCallArgumentsDone,
            "response.output_text.delta" => Self::OutputTextDelta,
            "response.output_text.done" => Self::OutputTextDone,
            "response.reasoning_summary_text.delta" => Self::ReasoningSummaryTextDelta,
            "response.reasoning_summary_text.done" => Self::ReasoningSummaryTextDone,
            "response.reasoning_text.delta" => Self::ReasoningTextDelta,
            "response.completed" => Self::Completed,
            "response.incomplete" => Self::Incomplete,
            "response.failed" => Self::Failed,
            "response.error" => Self::ResponseError,
            "error" => Self::Error,
            _ => Self::Unknown,
        }
    }

    /// Kind of a frame: the `event:` line, else the payload's `type` field.
    pub fn of_frame(frame: &SseFrame) -> Self {
        match frame.event_type.as_deref() {
            Some(name) => Self::parse(name),
            None => Self::parse(&normalize_string(frame.json.get("type"))),
        }
    }

    /// Events that abort the stream.
    pub fn is_failure(self) -> bool {
        matches!(self, Self::Failed | Self::ResponseError | Self::Error)
    }
}

//! Error Handling Module
//!
//! A single error type for the normalization engine. Every failure is delivered
//! to the caller as a hard error; nothing is folded into an empty successful
//! result.
//!
//! The variants fall into the following families:
//! - transport (`HttpError`, `TimeoutError`, `ConnectionError`, `Aborted`)
//! - upstream shape (`ResponseFormatError`)
//! - upstream payload (`UpstreamError`)
//! - empty result (`EmptyResult`)
//! - request shape rejection (`RequestShapeRejected`) and other HTTP statuses (`ApiError`)

use thiserror::Error;

/// HTTP statuses classified as "request shape rejected".
pub const REQUEST_SHAPE_REJECTED_STATUSES: [u16; 2] = [400, 422];

/// Errors produced while fetching and normalizing a provider response.
#[derive(Debug, Clone, Error)]
pub enum LlmError {
    /// Generic transport failure (connection reset, body read failure, ...)
    #[error("HTTP error: {0}")]
    HttpError(String),

    /// Response acquisition or a streaming read timed out
    #[error("Timeout error: {0}")]
    TimeoutError(String),

    /// Could not connect to the upstream
    #[error("Connection error: {0}")]
    ConnectionError(String),

    /// The caller aborted the call through its cancel handle
    #[error("Request aborted: {0}")]
    Aborted(String),

    /// The response content-type does not match the expected streaming/JSON shape
    #[error("{label} response is not SSE (content-type={content_type}){hint}; detail: {detail}")]
    ResponseFormatError {
        label: String,
        content_type: String,
        hint: String,
        detail: String,
    },

    /// The payload itself encodes an upstream error
    #[error("{label} upstream error: {message}")]
    UpstreamError { label: String, message: String },

    /// The transport completed cleanly but nothing interpretable was produced
    #[error(
        "{label} produced no upstream content (data_events={data_events}, parsed_chunks={parsed_chunks})"
    )]
    EmptyResult {
        label: String,
        data_events: u64,
        parsed_chunks: u64,
    },

    /// 400/422 from the upstream: the request body shape was rejected
    #[error("Request shape rejected (HTTP {status}): {message}")]
    RequestShapeRejected { status: u16, message: String },

    /// Any other non-success HTTP status
    #[error("API error {code}: {message}")]
    ApiError {
        code: u16,
        message: String,
        details: Option<serde_json::Value>,
    },

    /// A payload could not be interpreted
    #[error("Parse error: {0}")]
    ParseError(String),

    /// JSON (de)serialization failure
    #[error("JSON error: {0}")]
    JsonError(String),

    /// Invalid engine configuration
    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    /// The upstream answered with something this operation does not handle
    #[error("Unsupported operation: {0}")]
    UnsupportedOperation(String),
}

impl LlmError {
    /// Classify a non-success HTTP status into the matching variant.
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        let message = message.into();
        if is_request_shape_rejected_status(status) {
            Self::RequestShapeRejected { status, message }
        } else {
            Self::ApiError {
                code: status,
                message,
                details: None,
            }
        }
    }

    /// Upstream payload error built from an error-bearing JSON body.
    pub fn upstream_payload(label: &str, json: &serde_json::Value, default_message: &str) -> Self {
        let message = match crate::utils::json::extract_error_message(json) {
            m if m.is_empty() => default_message.to_string(),
            m => m,
        };
        Self::UpstreamError {
            label: label.to_string(),
            message,
        }
    }

    /// HTTP status carried by this error, if any.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::RequestShapeRejected { status, .. } => Some(*status),
            Self::ApiError { code, .. } => Some(*code),
            _ => None,
        }
    }

    /// Whether this error may trigger the request-shape fallback.
    pub fn is_request_shape_rejected(&self) -> bool {
        matches!(self, Self::RequestShapeRejected { .. })
    }

    /// Network, timeout and abort failures. These are never retried.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            Self::HttpError(_) | Self::TimeoutError(_) | Self::ConnectionError(_) | Self::Aborted(_)
        )
    }
}

/// `true` for statuses in the fixed rejection set (400, 422).
pub fn is_request_shape_rejected_status(status: u16) -> bool {
    REQUEST_SHAPE_REJECTED_STATUSES.contains(&status)
}

impl From<reqwest::Error> for LlmError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            return Self::TimeoutError(err.to_string());
        }
        if err.is_connect() {
            return Self::ConnectionError(err.to_string());
        }
        Self::HttpError(err.to_string())
    }
}

impl From<serde_json::Error> for LlmError {
    fn from(err: serde_json::Error) -> Self {
        Self::JsonError(err.to_string())
    }
}

//! HTTP Interceptor interfaces
//!
//! Interceptors can observe and tweak request builders before send, observe
//! responses, be notified of errors and fallback attempts, and receive decoded
//! SSE events. The hooks are best-effort and should avoid expensive work.

use crate::error::LlmError;

/// Context passed to interceptors describing the request.
#[derive(Clone, Debug)]
pub struct HttpRequestContext {
    /// Attempt label, e.g. `OpenAI(responses):minimal-defaults`
    pub label: String,
    pub url: String,
    pub stream: bool,
}

/// HTTP interceptor trait
pub trait HttpInterceptor: Send + Sync {
    /// Called before sending a request. Return the (possibly modified) builder
    /// or an error to short-circuit the request.
    fn on_before_send(
        &self,
        _ctx: &HttpRequestContext,
        builder: reqwest::RequestBuilder,
        _body: &serde_json::Value,
    ) -> Result<reqwest::RequestBuilder, LlmError> {
        Ok(builder)
    }

    /// Called after a successful response is received.
    fn on_response(
        &self,
        _ctx: &HttpRequestContext,
        _response: &reqwest::Response,
    ) -> Result<(), LlmError> {
        Ok(())
    }

    /// Called when an attempt fails and the error propagates.
    fn on_error(&self, _ctx: &HttpRequestContext, _error: &LlmError) {}

    /// Called when a rejected attempt is about to be retried with the reduced body.
    fn on_fallback(&self, _ctx: &HttpRequestContext, _error: &LlmError, _attempt: usize) {}

    /// Called for every SSE event decoded from a streaming body.
    fn on_sse_event(
        &self,
        _ctx: &HttpRequestContext,
        _event: &eventsource_stream::Event,
    ) -> Result<(), LlmError> {
        Ok(())
    }
}

/// A simple logging interceptor backed by `tracing` (no sensitive data).
#[derive(Clone, Default)]
pub struct LoggingInterceptor;

impl HttpInterceptor for LoggingInterceptor {
    fn on_before_send(
        &self,
        ctx: &HttpRequestContext,
        builder: reqwest::RequestBuilder,
        _body: &serde_json::Value,
    ) -> Result<reqwest::RequestBuilder, LlmError> {
        tracing::debug!(target: "siumai::http", label=%ctx.label, url=%ctx.url, stream=%ctx.stream, "sending request");
        Ok(builder)
    }

    fn on_response(
        &self,
        ctx: &HttpRequestContext,
        response: &reqwest::Response,
    ) -> Result<(), LlmError> {
        tracing::debug!(target: "siumai::http", label=%ctx.label, url=%ctx.url, status=%response.status().as_u16(), "response received");
        Ok(())
    }

    fn on_error(&self, ctx: &HttpRequestContext, error: &LlmError) {
        tracing::debug!(target: "siumai::http", label=%ctx.label, url=%ctx.url, stream=%ctx.stream, err=%error, "request error");
    }

    fn on_fallback(&self, ctx: &HttpRequestContext, error: &LlmError, attempt: usize) {
        tracing::debug!(target: "siumai::http", label=%ctx.label, attempt, status=?error.status_code(), "request shape rejected, retrying with reduced body");
    }

    fn on_sse_event(
        &self,
        ctx: &HttpRequestContext,
        event: &eventsource_stream::Event,
    ) -> Result<(), LlmError> {
        tracing::trace!(target: "siumai::http", label=%ctx.label, event_name=%event.event, "sse event");
        Ok(())
    }
}

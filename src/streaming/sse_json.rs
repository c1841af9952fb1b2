//! SSE JSON frame iterator
//!
//! Decodes a streaming body into `(event type, json)` frames. Framing (blank-line
//! delimiters, `event:` lines, multi-line `data:` joined with `\n`, UTF-8
//! boundaries) is handled by `eventsource-stream`; this layer adds the done
//! sentinel, lenient JSON parsing, diagnostic counters, cancellation and the
//! idle timeout.
//!
//! A body that ends without a closing blank line still dispatches its last
//! frame, so a trailing `data: [DONE]` counts as the sentinel.
//!
//! The iterator is pull-based: the network is only read when the consumer asks
//! for the next frame.

use crate::error::LlmError;
use crate::execution::http::interceptor::{HttpInterceptor, HttpRequestContext};
use crate::utils::cancel::CancelHandle;
use eventsource_stream::{Event, EventStreamError, Eventsource};
use futures_util::{Stream, StreamExt};
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct SseJsonStreamConfig {
    /// Label used in error messages (e.g. "Gemini(chat-stream)").
    pub label: String,
    /// SSE `data` payloads that end the stream without being delivered.
    pub done_markers: Vec<String>,
    /// Upper bound on waiting for the next frame.
    pub idle_timeout: Option<Duration>,
}

impl SseJsonStreamConfig {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            done_markers: vec!["[DONE]".to_string()],
            idle_timeout: None,
        }
    }

    pub fn with_done_markers(mut self, markers: Vec<String>) -> Self {
        self.done_markers = markers;
        self
    }

    pub fn with_idle_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.idle_timeout = timeout;
        self
    }
}

/// One decoded unit from the wire.
#[derive(Debug, Clone, PartialEq)]
pub struct SseFrame {
    /// Value of the `event:` line; `None` when absent.
    pub event_type: Option<String>,
    pub json: serde_json::Value,
}

/// Diagnostic counters kept while iterating.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SseFrameStats {
    /// Frames seen with a non-empty, non-sentinel `data:` payload
    pub data_events: u64,
    /// Frames whose payload parsed as JSON
    pub parsed_chunks: u64,
    /// Whether the done sentinel was observed
    pub done_seen: bool,
}

/// Body bytes plus the blank line appended at end of body.
enum BodyChunk<B> {
    Body(B),
    Terminator,
}

impl<B: AsRef<[u8]>> AsRef<[u8]> for BodyChunk<B> {
    fn as_ref(&self) -> &[u8] {
        match self {
            Self::Body(bytes) => bytes.as_ref(),
            Self::Terminator => b"\n\n",
        }
    }
}

type EventStream = Pin<Box<dyn Stream<Item = Result<Event, EventStreamError<LlmError>>> + Send>>;

/// Forward-only, finite iterator over SSE JSON frames.
pub struct SseFrameStream {
    events: EventStream,
    cfg: SseJsonStreamConfig,
    cancel: Option<CancelHandle>,
    interceptors: Vec<Arc<dyn HttpInterceptor>>,
    ctx: Option<HttpRequestContext>,
    stats: SseFrameStats,
    finished: bool,
}

impl SseFrameStream {
    /// Wrap any byte stream.
    pub fn new<S, B>(byte_stream: S, cfg: SseJsonStreamConfig) -> Self
    where
        S: Stream<Item = Result<B, LlmError>> + Send + 'static,
        B: AsRef<[u8]> + Send + 'static,
    {
        Self {
            events: Box::pin(
                byte_stream
                    .map(|r| r.map(BodyChunk::Body))
                    .chain(futures_util::stream::once(async {
                        Ok::<_, LlmError>(BodyChunk::Terminator)
                    }))
                    .eventsource(),
            ),
            cfg,
            cancel: None,
            interceptors: Vec::new(),
            ctx: None,
            stats: SseFrameStats::default(),
            finished: false,
        }
    }

    /// Wrap the body of an HTTP response.
    pub fn from_response(response: reqwest::Response, cfg: SseJsonStreamConfig) -> Self {
        Self::new(response.bytes_stream().map(|r| r.map_err(LlmError::from)), cfg)
    }

    pub fn with_cancel(mut self, cancel: Option<CancelHandle>) -> Self {
        self.cancel = cancel;
        self
    }

    /// Notify `interceptors` of every decoded SSE event.
    pub fn with_interceptors(
        mut self,
        interceptors: Vec<Arc<dyn HttpInterceptor>>,
        ctx: HttpRequestContext,
    ) -> Self {
        self.interceptors = interceptors;
        self.ctx = Some(ctx);
        self
    }

    pub fn stats(&self) -> SseFrameStats {
        self.stats
    }

    /// Pull the next JSON frame. `Ok(None)` once the body ends or the sentinel
    /// is seen; transport errors are fatal and end the iteration.
    pub async fn next_frame(&mut self) -> Result<Option<SseFrame>, LlmError> {
        while !self.finished {
            let event = match self.pull_event().await {
                Ok(Some(event)) => event,
                Ok(None) => {
                    self.finished = true;
                    break;
                }
                Err(e) => {
                    self.finished = true;
                    return Err(e);
                }
            };

            if let Some(ctx) = &self.ctx {
                for it in &self.interceptors {
                    it.on_sse_event(ctx, &event)?;
                }
            }

            let data = event.data.trim();
            if data.is_empty() {
                continue;
            }
            if self.cfg.done_markers.iter().any(|m| m == data) {
                self.stats.done_seen = true;
                self.finished = true;
                break;
            }

            self.stats.data_events += 1;
            let json: serde_json::Value = match serde_json::from_str(data) {
                Ok(v) => v,
                Err(e) => {
                    tracing::trace!(target: "siumai::sse", label = %self.cfg.label, error = %e, "skipping malformed SSE JSON frame");
                    continue;
                }
            };
            self.stats.parsed_chunks += 1;

            let event_type = match event.event.as_str() {
                "" | "message" => None,
                other => Some(other.to_string()),
            };
            return Ok(Some(SseFrame { event_type, json }));
        }
        Ok(None)
    }

    async fn pull_event(&mut self) -> Result<Option<Event>, LlmError> {
        let Self {
            events,
            cfg,
            cancel,
            ..
        } = self;
        let label = cfg.label.as_str();

        let read = async {
            match cfg.idle_timeout {
                Some(limit) => tokio::time::timeout(limit, events.next())
                    .await
                    .map_err(|_| {
                        LlmError::TimeoutError(format!(
                            "{label} stream idle for more than {}ms",
                            limit.as_millis()
                        ))
                    }),
                None => Ok(events.next().await),
            }
        };

        let item = match cancel {
            Some(cancel) => {
                if cancel.is_cancelled() {
                    return Err(LlmError::Aborted(format!("{label} stream cancelled")));
                }
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => {
                        return Err(LlmError::Aborted(format!("{label} stream cancelled")));
                    }
                    item = read => item?,
                }
            }
            None => read.await?,
        };

        match item {
            None => Ok(None),
            Some(Ok(event)) => Ok(Some(event)),
            Some(Err(EventStreamError::Transport(e))) => Err(e),
            Some(Err(e)) => Err(LlmError::ParseError(format!(
                "SSE stream error ({label}): {e}"
            ))),
        }
    }
}

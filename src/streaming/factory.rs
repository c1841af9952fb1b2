//! Stream Factory
//!
//! Opens a provider response and turns it into a lazily consumed chunk stream.
//! A body advertising JSON is handed back whole so the driver can interpret it
//! as the buffered equivalent; any other non-SSE body is a shape error.

use crate::error::LlmError;
use crate::execution::http::interceptor::HttpRequestContext;
use crate::execution::http::response::{
    assert_sse_response, content_type, is_json_content_type, read_json_body,
};
use crate::execution::http::{HttpExecutor, ProviderRequest};
use crate::streaming::converters::{ChatFrameConverter, TextFrameConverter};
use crate::streaming::sse_json::{SseFrameStream, SseJsonStreamConfig};
use crate::streaming::{ChatChunkStream, TextDeltaStream};
use crate::types::ChatChunk;
use crate::utils::cancel::CancelHandle;
use async_stream::try_stream;

/// An opened streaming response.
pub enum OpenedStream {
    /// The upstream answered with a buffered JSON body
    Json {
        json: serde_json::Value,
        content_type: String,
    },
    Sse(SseFrameStream),
}

pub struct StreamFactory;

impl StreamFactory {
    /// Fetch `request` (with the fallback policy) and classify the response body.
    pub async fn open(
        executor: &HttpExecutor,
        request: &ProviderRequest,
        cancel: Option<CancelHandle>,
        expected_hint: &str,
    ) -> Result<OpenedStream, LlmError> {
        let response = executor
            .fetch_with_fallback(request, true, cancel.as_ref())
            .await?;

        let ct = content_type(&response);
        if is_json_content_type(&ct) {
            tracing::debug!(target: "siumai::stream", label = %request.label, content_type = %ct, "buffered JSON body on a streaming call");
            let json = read_json_body(response).await?;
            return Ok(OpenedStream::Json {
                json,
                content_type: ct,
            });
        }

        let response = assert_sse_response(response, &request.label, expected_hint).await?;
        let cfg = SseJsonStreamConfig::new(request.label.clone())
            .with_idle_timeout(executor.config().stream_idle_timeout);
        let ctx = HttpRequestContext {
            label: request.label.clone(),
            url: request.url.clone(),
            stream: true,
        };
        let frames = SseFrameStream::from_response(response, cfg)
            .with_cancel(cancel)
            .with_interceptors(executor.interceptors().to_vec(), ctx);
        Ok(OpenedStream::Sse(frames))
    }

    /// Drive `converter` over `frames`. Nothing is read until the stream is polled.
    pub fn chat_stream<C>(mut frames: SseFrameStream, mut converter: C) -> ChatChunkStream
    where
        C: ChatFrameConverter + 'static,
    {
        Box::pin(try_stream! {
            while let Some(frame) = frames.next_frame().await? {
                for chunk in converter.convert_frame(frame)? {
                    yield chunk;
                }
            }
            for chunk in converter.finish(frames.stats())? {
                yield chunk;
            }
        })
    }

    /// Chunks of a buffered JSON body, replayed as a stream.
    pub fn chat_stream_from_json<C>(
        json: serde_json::Value,
        mut converter: C,
    ) -> Result<ChatChunkStream, LlmError>
    where
        C: ChatFrameConverter + 'static,
    {
        let chunks = converter.convert_json(json)?;
        Ok(Box::pin(futures::stream::iter(chunks.into_iter().map(Ok::<ChatChunk, LlmError>))))
    }

    /// Drive a text converter; fails with an empty-result error when no delta
    /// was produced.
    pub fn text_stream<C>(
        mut frames: SseFrameStream,
        mut converter: C,
        label: String,
    ) -> TextDeltaStream
    where
        C: TextFrameConverter + 'static,
    {
        Box::pin(try_stream! {
            let mut emitted = 0u64;
            while let Some(frame) = frames.next_frame().await? {
                for delta in converter.convert_frame(frame)? {
                    if delta.is_empty() {
                        continue;
                    }
                    emitted += 1;
                    yield delta;
                }
            }
            if emitted == 0 {
                let stats = frames.stats();
                Err(LlmError::EmptyResult {
                    label,
                    data_events: stats.data_events,
                    parsed_chunks: stats.parsed_chunks,
                })?;
            }
        })
    }
}

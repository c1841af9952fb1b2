//! Fetch with request-shape fallback
//!
//! A call is attempted at most twice: first with the body as given, then, only
//! if the upstream rejected the request shape (HTTP 400/422), once more with a
//! reduced body. Transport failures and every other status propagate at once.
//! Once a response is returned the stream belongs to the caller; nothing here
//! retries mid-stream.

use crate::error::LlmError;
use crate::execution::http::config::HttpConfig;
use crate::execution::http::interceptor::{HttpInterceptor, HttpRequestContext};
use crate::execution::http::response::{ERROR_PREVIEW_CHARS, describe_body};
use crate::utils::cancel::CancelHandle;
use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderValue};
use std::sync::Arc;

/// Label suffix of the reduced-body attempt.
pub const FALLBACK_LABEL_SUFFIX: &str = ":minimal-defaults";

/// A fully built provider request plus its reduced fallback body.
#[derive(Debug, Clone)]
pub struct ProviderRequest {
    pub label: String,
    pub url: String,
    pub headers: HeaderMap,
    pub body: serde_json::Value,
    /// Body used when the first attempt is rejected; `None` disables the fallback
    pub fallback_body: Option<serde_json::Value>,
}

impl ProviderRequest {
    pub fn new(label: impl Into<String>, url: impl Into<String>, body: serde_json::Value) -> Self {
        Self {
            label: label.into(),
            url: url.into(),
            headers: HeaderMap::new(),
            body,
            fallback_body: None,
        }
    }

    pub fn with_headers(mut self, headers: HeaderMap) -> Self {
        self.headers = headers;
        self
    }

    pub fn with_fallback_body(mut self, body: serde_json::Value) -> Self {
        self.fallback_body = Some(body);
        self
    }

    /// The ordered, fixed attempt list.
    pub fn attempts(&self) -> Vec<FetchAttempt<'_>> {
        let mut attempts = vec![FetchAttempt {
            label: self.label.clone(),
            body: &self.body,
        }];
        if let Some(body) = &self.fallback_body {
            attempts.push(FetchAttempt {
                label: format!("{}{FALLBACK_LABEL_SUFFIX}", self.label),
                body,
            });
        }
        attempts
    }
}

/// One labeled attempt.
#[derive(Debug, Clone)]
pub struct FetchAttempt<'a> {
    pub label: String,
    pub body: &'a serde_json::Value,
}

/// Sends provider requests with the fallback policy applied.
#[derive(Clone)]
pub struct HttpExecutor {
    client: reqwest::Client,
    config: HttpConfig,
    interceptors: Vec<Arc<dyn HttpInterceptor>>,
}

impl HttpExecutor {
    pub fn new(config: HttpConfig) -> Result<Self, LlmError> {
        let client = config.build_client()?;
        Ok(Self::with_client(client, config))
    }

    /// Reuse an existing client (connection pooling stays the caller's concern).
    pub fn with_client(client: reqwest::Client, config: HttpConfig) -> Self {
        Self {
            client,
            config,
            interceptors: Vec::new(),
        }
    }

    pub fn with_interceptor(mut self, interceptor: Arc<dyn HttpInterceptor>) -> Self {
        self.interceptors.push(interceptor);
        self
    }

    pub fn config(&self) -> &HttpConfig {
        &self.config
    }

    pub fn interceptors(&self) -> &[Arc<dyn HttpInterceptor>] {
        &self.interceptors
    }

    /// Execute `request`, falling back once to the reduced body on a 400/422.
    pub async fn fetch_with_fallback(
        &self,
        request: &ProviderRequest,
        stream: bool,
        cancel: Option<&CancelHandle>,
    ) -> Result<reqwest::Response, LlmError> {
        let attempts = request.attempts();
        let total = attempts.len();
        let mut last_err = None;

        for (i, attempt) in attempts.into_iter().enumerate() {
            let ctx = HttpRequestContext {
                label: attempt.label.clone(),
                url: request.url.clone(),
                stream,
            };
            tracing::debug!(target: "siumai::http", label = %ctx.label, attempt = i + 1, total, "starting attempt");

            let result = match cancel {
                Some(cancel) => {
                    tokio::select! {
                        biased;
                        _ = cancel.cancelled() => Err(LlmError::Aborted(format!("{} request cancelled", ctx.label))),
                        r = self.fetch_ok(&ctx, &request.headers, attempt.body) => r,
                    }
                }
                None => self.fetch_ok(&ctx, &request.headers, attempt.body).await,
            };

            match result {
                Ok(response) => return Ok(response),
                Err(err) => {
                    let has_next = i + 1 < total;
                    if !err.is_request_shape_rejected() || !has_next {
                        for it in &self.interceptors {
                            it.on_error(&ctx, &err);
                        }
                        return Err(err);
                    }
                    tracing::debug!(target: "siumai::http", label = %ctx.label, status = ?err.status_code(), "fallback: retry with reduced request body");
                    for it in &self.interceptors {
                        it.on_fallback(&ctx, &err, i + 1);
                    }
                    last_err = Some(err);
                }
            }
        }

        Err(last_err
            .unwrap_or_else(|| LlmError::HttpError(format!("{} failed", request.label))))
    }

    /// One POST; non-success statuses are classified into errors.
    async fn fetch_ok(
        &self,
        ctx: &HttpRequestContext,
        headers: &HeaderMap,
        body: &serde_json::Value,
    ) -> Result<reqwest::Response, LlmError> {
        let mut headers = headers.clone();
        if !headers.contains_key(CONTENT_TYPE) {
            headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        }

        let mut builder = self.client.post(&ctx.url).headers(headers).json(body);
        for it in &self.interceptors {
            builder = it.on_before_send(ctx, builder, body)?;
        }

        let response = builder.send().await.map_err(|e| match LlmError::from(e) {
            LlmError::TimeoutError(m) => LlmError::TimeoutError(format!("{}: {m}", ctx.label)),
            LlmError::ConnectionError(m) => LlmError::ConnectionError(format!("{}: {m}", ctx.label)),
            other => LlmError::HttpError(format!("{}: {other}", ctx.label)),
        })?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let detail = describe_body(&text, ERROR_PREVIEW_CHARS);
            let message = format!("{} HTTP {}: {detail}", ctx.label, status.as_u16());
            let mut err = LlmError::from_status(status.as_u16(), message);
            if let LlmError::ApiError { details, .. } = &mut err {
                *details = serde_json::from_str(&text).ok();
            }
            return Err(err);
        }

        for it in &self.interceptors {
            it.on_response(ctx, &response)?;
        }
        Ok(response)
    }
}

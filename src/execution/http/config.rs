//! HTTP configuration
//!
//! Timeouts bound response acquisition (`timeout`, `connect_timeout`) and the
//! streaming read (`stream_idle_timeout`). A timeout while streaming is fatal.

use crate::error::LlmError;
use std::time::Duration;

#[derive(Debug, Clone, Default)]
pub struct HttpConfig {
    /// Total request timeout, applied by the HTTP client
    pub timeout: Option<Duration>,
    /// Connection establishment timeout
    pub connect_timeout: Option<Duration>,
    /// Maximum wait for the next SSE frame once streaming
    pub stream_idle_timeout: Option<Duration>,
    pub user_agent: Option<String>,
}

impl HttpConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    pub fn with_stream_idle_timeout(mut self, timeout: Duration) -> Self {
        self.stream_idle_timeout = Some(timeout);
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    /// Build a `reqwest::Client` honoring this configuration.
    pub fn build_client(&self) -> Result<reqwest::Client, LlmError> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = self.timeout {
            builder = builder.timeout(timeout);
        }
        if let Some(timeout) = self.connect_timeout {
            builder = builder.connect_timeout(timeout);
        }
        if let Some(ua) = &self.user_agent {
            builder = builder.user_agent(ua.clone());
        }
        builder
            .build()
            .map_err(|e| LlmError::ConfigurationError(format!("Failed to build HTTP client: {e}")))
    }
}

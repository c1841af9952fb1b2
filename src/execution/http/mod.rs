//! HTTP execution: configuration, fetch-with-fallback, interceptors and
//! response shape checks.

pub mod config;
pub mod fetch;
pub mod interceptor;
pub mod response;

pub use config::HttpConfig;
pub use fetch::{FALLBACK_LABEL_SUFFIX, FetchAttempt, HttpExecutor, ProviderRequest};
pub use interceptor::{HttpInterceptor, HttpRequestContext, LoggingInterceptor};

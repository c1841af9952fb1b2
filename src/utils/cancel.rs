//! Cancellation utilities
//!
//! The abort signal handed to a streaming call. Cancelling wakes a pull that is
//! waiting for network bytes, so the stream ends promptly with
//! [`LlmError::Aborted`](crate::error::LlmError::Aborted).

use tokio_util::sync::CancellationToken;

/// A handle that can be used to request cancellation.
#[derive(Clone, Debug, Default)]
pub struct CancelHandle {
    token: CancellationToken,
}

impl CancelHandle {
    /// Request cancellation. Streams observing this handle stop at their next
    /// suspension point; dropping them releases the HTTP connection.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Check if cancellation was requested.
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// A future that resolves once [`cancel`](Self::cancel) has been called.
    pub fn cancelled(&self) -> tokio_util::sync::WaitForCancellationFuture<'_> {
        self.token.cancelled()
    }
}

/// Create a standalone cancel handle that can be shared across tasks.
pub fn new_cancel_handle() -> CancelHandle {
    CancelHandle::default()
}

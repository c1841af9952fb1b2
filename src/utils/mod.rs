//! Utility Module
//!
//! Cancellation handles and helpers for reading loosely-typed upstream JSON.

pub mod cancel;
pub mod json;

pub use cancel::{CancelHandle, new_cancel_handle};

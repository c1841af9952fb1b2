//! Execution layer

pub mod http;

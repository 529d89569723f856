//! Outbound HTTP utilities.

pub mod retry;

pub use retry::{send_with_retry, RetryError, RetryPolicy};

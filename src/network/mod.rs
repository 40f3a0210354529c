//! HTTP networking module
//!
//! Provides the resilient transport used by every backend client:
//! request/response model, retry policy, error classification and the
//! client that ties them together.

mod client;
mod error;
mod normalizer;
mod request;
mod retry;

pub use client::{LastCall, TransportClient};
pub use error::{ErrorCause, ErrorKind, ErrorRecord, TransportError};
pub use normalizer::{render_log_line, ErrorNormalizer, ErrorSchema, MessageTemplate, RawFailure};
pub use request::{HttpMethod, Request, Response};
pub use retry::{RetryCondition, RetryPolicy};

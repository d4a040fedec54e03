//! Retry and backoff policy.
//!
//! Classifies segment failures (timeouts, resets, throttling, 5xx) and decides
//! exponential backoff so the segmented and sequential paths share one policy.

mod classify;
mod error;
mod policy;
mod run;

pub use classify::{classify, classify_curl_error, classify_http_status};
pub use error::SegmentError;
pub use policy::{ErrorKind, RetryDecision, RetryPolicy};
pub use run::run_with_retry;

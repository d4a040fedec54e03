//! Retry loop: run a transfer attempt until success or the policy says stop.

use std::time::Duration;

use super::classify;
use super::error::SegmentError;
use super::policy::{RetryDecision, RetryPolicy};
use crate::control::CancelToken;

/// Runs `attempt` until it succeeds, fails permanently, or the retry budget is
/// spent. Cancellation is checked before every attempt and during backoff.
/// `on_retry(failures, &error, delay)` is called before each backoff sleep.
/// Returns the number of attempts made alongside the outcome.
pub fn run_with_retry<F, R>(
    policy: &RetryPolicy,
    cancel: &CancelToken,
    mut on_retry: R,
    mut attempt: F,
) -> (u32, Result<(), SegmentError>)
where
    F: FnMut() -> Result<(), SegmentError>,
    R: FnMut(u32, &SegmentError, Duration),
{
    let mut failures = 0u32;
    loop {
        if cancel.is_cancelled() {
            return (failures, Err(SegmentError::Cancelled));
        }
        match attempt() {
            Ok(()) => return (failures + 1, Ok(())),
            Err(e) => {
                failures += 1;
                let kind = classify::classify(&e);
                match policy.decide(failures, kind) {
                    RetryDecision::NoRetry => return (failures, Err(e)),
                    RetryDecision::RetryAfter(d) => {
                        on_retry(failures, &e, d);
                        if !cancel.sleep(d) {
                            return (failures, Err(SegmentError::Cancelled));
                        }
                    }
                }
            }
        }
    }
}

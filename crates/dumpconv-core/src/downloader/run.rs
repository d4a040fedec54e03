//! Bounded worker pool that drives segment transfers.

use std::collections::VecDeque;
use std::sync::atomic::AtomicU64;
use std::sync::mpsc;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use crate::control::CancelToken;
use crate::fetch_head::NetOptions;
use crate::progress::ProgressAggregator;
use crate::retry::{run_with_retry, RetryPolicy, SegmentError};
use crate::segmenter::{SegmentState, TransferSegment};
use crate::storage::StorageWriter;

use super::result::DownloadError;
use super::segment;

enum WorkerEvent {
    Started(usize),
    Retrying {
        index: usize,
        failures: u32,
        delay: Duration,
        error: String,
    },
    Finished {
        index: usize,
        attempts: u32,
        result: Result<(), SegmentError>,
    },
}

/// Everything a worker needs; cloned once per thread.
#[derive(Clone)]
pub(super) struct SegmentJob {
    pub url: String,
    pub net: NetOptions,
    pub policy: RetryPolicy,
    pub storage: StorageWriter,
    pub progress: Arc<ProgressAggregator>,
}

/// Download every segment with `workers` threads pulling from a shared queue.
///
/// Segment states in `segments` are updated as events arrive. The first fatal
/// error stops the remaining workers through a child of `cancel`; the caller's
/// token is left untouched.
pub(super) fn run_segments(
    job: &SegmentJob,
    segments: &mut [TransferSegment],
    workers: usize,
    cancel: &CancelToken,
) -> Result<(), DownloadError> {
    let work: Arc<Mutex<VecDeque<TransferSegment>>> =
        Arc::new(Mutex::new(segments.iter().copied().collect()));
    let stop = cancel.child();
    let (tx, rx) = mpsc::channel();
    let num_workers = workers.max(1).min(segments.len());

    let mut handles = Vec::with_capacity(num_workers);
    for _ in 0..num_workers {
        let work = Arc::clone(&work);
        let tx = tx.clone();
        let stop = stop.clone();
        let job = job.clone();
        handles.push(std::thread::spawn(move || loop {
            if stop.is_cancelled() {
                break;
            }
            let next = work
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .pop_front();
            let Some(seg) = next else {
                break;
            };
            let _ = tx.send(WorkerEvent::Started(seg.index));
            let written = AtomicU64::new(0);
            let (attempts, result) = run_with_retry(
                &job.policy,
                &stop,
                |failures, e, delay| {
                    let _ = tx.send(WorkerEvent::Retrying {
                        index: seg.index,
                        failures,
                        delay,
                        error: e.to_string(),
                    });
                },
                || {
                    segment::fetch_segment(
                        &job.url,
                        &job.net,
                        &seg,
                        &written,
                        &job.storage,
                        &job.progress,
                        &stop,
                    )
                },
            );
            let _ = tx.send(WorkerEvent::Finished {
                index: seg.index,
                attempts,
                result,
            });
        }));
    }
    drop(tx);

    let mut first_error: Option<DownloadError> = None;
    // Ends once every worker has exited and dropped its sender.
    for event in rx {
        match event {
            WorkerEvent::Started(index) => {
                if let Some(s) = segments.get_mut(index) {
                    s.state = SegmentState::InFlight;
                }
                tracing::debug!(segment = index, "segment started");
            }
            WorkerEvent::Retrying {
                index,
                failures,
                delay,
                error,
            } => {
                if let Some(s) = segments.get_mut(index) {
                    s.retries = failures;
                }
                tracing::warn!(
                    segment = index,
                    attempt = failures,
                    delay_ms = delay.as_millis() as u64,
                    error = %error,
                    "segment transfer failed, retrying"
                );
            }
            WorkerEvent::Finished {
                index,
                attempts,
                result,
            } => {
                let Some(s) = segments.get_mut(index) else {
                    continue;
                };
                s.retries = attempts.saturating_sub(1);
                match result {
                    Ok(()) => {
                        s.state = SegmentState::Complete;
                        tracing::debug!(segment = index, attempts, "segment complete");
                    }
                    Err(e) => {
                        s.state = SegmentState::Failed;
                        if first_error.is_none() {
                            let err = if cancel.is_cancelled() {
                                DownloadError::Cancelled
                            } else {
                                super::transfer_error(index, attempts, e)
                            };
                            if !matches!(err, DownloadError::Cancelled) {
                                tracing::warn!(segment = index, error = %err, "segment failed, stopping workers");
                            }
                            first_error = Some(err);
                            stop.cancel();
                        }
                    }
                }
            }
        }
    }

    for h in handles {
        if h.join().is_err() && first_error.is_none() {
            first_error = Some(DownloadError::Internal("segment worker panicked".into()));
        }
    }
    if let Some(e) = first_error {
        return Err(e);
    }
    if segments.iter().all(|s| s.state == SegmentState::Complete) {
        Ok(())
    } else if cancel.is_cancelled() {
        Err(DownloadError::Cancelled)
    } else {
        Err(DownloadError::Internal(
            "segment workers exited with work outstanding".into(),
        ))
    }
}

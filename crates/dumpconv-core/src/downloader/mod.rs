//! Segmented parallel downloader with sequential fallback.
//!
//! `download` probes the resource, picks a strategy once, and returns a
//! `DownloadResult`. Segmented transfers split the file with
//! `plan_segments`, preallocate `<dest>.part`, and let a fixed pool of worker
//! threads fetch byte ranges with per-segment retry. Servers without range
//! support (or that ignore the `Range` header) are read as a single stream.

mod result;
mod run;
mod segment;
mod single;

use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use crate::config::DumpConfig;
use crate::control::CancelToken;
use crate::fetch_head::{self, NetOptions, RemoteResource};
use crate::progress::ProgressAggregator;
use crate::retry::{classify, run_with_retry, ErrorKind, RetryPolicy, SegmentError};
use crate::segmenter::plan_segments;
use crate::storage::{self, StorageWriterBuilder};

pub use result::{DownloadError, DownloadResult, DownloadStatus, Strategy};

/// Knobs for one download call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DownloadOptions {
    /// Number of byte ranges (and worker threads) for segmented transfers.
    pub segment_count: usize,
    pub retry: RetryPolicy,
    pub net: NetOptions,
}

impl Default for DownloadOptions {
    fn default() -> Self {
        Self::from(&DumpConfig::default())
    }
}

impl From<&DumpConfig> for DownloadOptions {
    fn from(cfg: &DumpConfig) -> Self {
        Self {
            segment_count: cfg.segment_count.max(1),
            retry: RetryPolicy::from(&cfg.retry_config()),
            net: NetOptions::from(cfg),
        }
    }
}

/// Probe `url` and download it to `dest`.
///
/// Blocking. `progress` receives every byte written; use one aggregator per
/// download. Cancelling `cancel` stops all transfers and yields
/// `DownloadStatus::Cancelled` with the partial temp file kept on disk.
pub fn download(
    url: &str,
    dest: &Path,
    options: &DownloadOptions,
    progress: &Arc<ProgressAggregator>,
    cancel: &CancelToken,
) -> DownloadResult {
    let started = Instant::now();
    if cancel.is_cancelled() {
        return finish(url, dest, None, Err(DownloadError::Cancelled), started);
    }
    match fetch_head::probe(url, &options.net) {
        Ok(resource) => download_from(&resource, dest, options, progress, cancel, started),
        Err(e) => finish(url, dest, None, Err(e.into()), started),
    }
}

/// Download a resource whose capabilities are already known (skips the probe).
pub fn download_resource(
    resource: &RemoteResource,
    dest: &Path,
    options: &DownloadOptions,
    progress: &Arc<ProgressAggregator>,
    cancel: &CancelToken,
) -> DownloadResult {
    download_from(resource, dest, options, progress, cancel, Instant::now())
}

fn download_from(
    resource: &RemoteResource,
    dest: &Path,
    options: &DownloadOptions,
    progress: &Arc<ProgressAggregator>,
    cancel: &CancelToken,
    started: Instant,
) -> DownloadResult {
    progress.set_expected(resource.total_size);
    let base = progress.total();

    let segmented_size = resource
        .total_size
        .filter(|&n| n > 0 && resource.supports_ranges);
    let Some(total) = segmented_size else {
        tracing::info!(url = %resource.url, size = ?resource.total_size, "downloading as a single stream");
        let outcome = download_sequential(resource, dest, options, progress, cancel, 0);
        return finish(&resource.url, dest, Some(Strategy::Sequential), outcome, started);
    };

    tracing::info!(
        url = %resource.url,
        size = total,
        segments = options.segment_count,
        "starting segmented download"
    );
    match download_segmented(resource, dest, total, options, progress, cancel) {
        Err(DownloadError::RangeIgnored) => {
            tracing::warn!(url = %resource.url, "server ignored range request, falling back to a single stream");
            let reported = progress.total().saturating_sub(base);
            let outcome = download_sequential(resource, dest, options, progress, cancel, reported);
            finish(&resource.url, dest, Some(Strategy::Sequential), outcome, started)
        }
        outcome => finish(&resource.url, dest, Some(Strategy::Segmented), outcome, started),
    }
}

fn download_segmented(
    resource: &RemoteResource,
    dest: &Path,
    total: u64,
    options: &DownloadOptions,
    progress: &Arc<ProgressAggregator>,
    cancel: &CancelToken,
) -> Result<u64, DownloadError> {
    let temp = storage::temp_path(dest);
    let mut builder = StorageWriterBuilder::create(&temp).map_err(DownloadError::Storage)?;
    builder.preallocate(total).map_err(DownloadError::Storage)?;
    let writer = builder.build();

    let mut segments = plan_segments(total, options.segment_count.max(1));
    let job = run::SegmentJob {
        url: resource.url.clone(),
        net: options.net,
        policy: options.retry,
        storage: writer.clone(),
        progress: Arc::clone(progress),
    };

    match run::run_segments(&job, &mut segments, options.segment_count, cancel) {
        Ok(()) => {
            drop(job);
            writer.sync().map_err(DownloadError::Storage)?;
            writer.finalize(dest).map_err(DownloadError::Storage)?;
            Ok(total)
        }
        Err(DownloadError::Cancelled) => Err(DownloadError::Cancelled),
        Err(e) => {
            drop(job);
            writer.discard();
            Err(e)
        }
    }
}

fn download_sequential(
    resource: &RemoteResource,
    dest: &Path,
    options: &DownloadOptions,
    progress: &Arc<ProgressAggregator>,
    cancel: &CancelToken,
    already_reported: u64,
) -> Result<u64, DownloadError> {
    let temp = storage::temp_path(dest);
    let writer = StorageWriterBuilder::create(&temp)
        .map_err(DownloadError::Storage)?
        .build();

    let mut high_water = already_reported;
    let mut received = 0u64;
    let (attempts, res) = run_with_retry(
        &options.retry,
        cancel,
        |failures, e, delay| {
            tracing::warn!(
                url = %resource.url,
                attempt = failures,
                delay_ms = delay.as_millis() as u64,
                error = %e,
                "stream transfer failed, retrying from the start"
            );
        },
        || {
            received = single::fetch_sequential(
                &resource.url,
                &options.net,
                &writer,
                progress,
                &mut high_water,
                cancel,
            )?;
            Ok(())
        },
    );

    match res {
        Ok(()) => {}
        Err(SegmentError::Cancelled) => return Err(DownloadError::Cancelled),
        Err(e) => {
            writer.discard();
            return Err(transfer_error(0, attempts, e));
        }
    }

    match resource.total_size {
        Some(expected) if expected != received => {
            writer.discard();
            return Err(DownloadError::SizeMismatch { expected, received });
        }
        Some(_) => {}
        None => tracing::info!(url = %resource.url, bytes = received, "no size hint, accepting received length"),
    }

    writer.truncate(received).map_err(DownloadError::Storage)?;
    writer.sync().map_err(DownloadError::Storage)?;
    writer.finalize(dest).map_err(DownloadError::Storage)?;
    Ok(received)
}

/// Map the final error of a transfer (after retries) onto a download error.
fn transfer_error(index: usize, attempts: u32, e: SegmentError) -> DownloadError {
    match e {
        SegmentError::Cancelled => DownloadError::Cancelled,
        SegmentError::RangeIgnored => DownloadError::RangeIgnored,
        SegmentError::Storage(io) => DownloadError::Storage(
            anyhow::Error::new(io).context(format!("writing segment {}", index)),
        ),
        e => match classify(&e) {
            ErrorKind::Other => {
                DownloadError::PermanentNetwork(format!("segment {}: {}", index, e))
            }
            _ => DownloadError::SegmentExhausted {
                index,
                attempts,
                last: e.to_string(),
            },
        },
    }
}

fn finish(
    url: &str,
    dest: &Path,
    strategy: Option<Strategy>,
    outcome: Result<u64, DownloadError>,
    started: Instant,
) -> DownloadResult {
    let elapsed = started.elapsed();
    let (bytes, status) = match outcome {
        Ok(bytes) => {
            tracing::info!(url, path = %dest.display(), bytes, elapsed_ms = elapsed.as_millis() as u64, "download complete");
            (bytes, DownloadStatus::Complete)
        }
        Err(DownloadError::Cancelled) => {
            let temp = storage::temp_path(dest);
            let partial_path = temp.exists().then_some(temp);
            tracing::info!(url, partial = ?partial_path, "download cancelled");
            (0, DownloadStatus::Cancelled { partial_path })
        }
        Err(e) => {
            let failure = e.to_failure();
            tracing::warn!(url, reason = %failure.reason, error = %failure.message, "download failed");
            (0, DownloadStatus::Failed(failure))
        }
    };
    DownloadResult {
        url: url.to_string(),
        local_path: dest.to_path_buf(),
        bytes,
        strategy,
        status,
        elapsed,
    }
}

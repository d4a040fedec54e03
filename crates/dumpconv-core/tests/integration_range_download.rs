//! Integration test: local HTTP server with Range support, segmented and
//! sequential downloads, retry after dropped connections, cancellation.

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::range_server::{self, RangeServerOptions};
use dumpconv_core::control::CancelToken;
use dumpconv_core::downloader::{download, DownloadOptions, DownloadStatus, Strategy};
use dumpconv_core::outcome::FailureReason;
use dumpconv_core::progress::ProgressAggregator;
use dumpconv_core::retry::RetryPolicy;
use dumpconv_core::storage;
use tempfile::tempdir;

fn fast_options(segments: usize) -> DownloadOptions {
    DownloadOptions {
        segment_count: segments,
        retry: RetryPolicy {
            max_retries: 3,
            base_delay: Duration::from_millis(10),
            max_delay: Duration::from_millis(50),
        },
        ..DownloadOptions::default()
    }
}

#[test]
fn multi_segment_download_completes_and_file_matches() {
    let body = common::payload(64 * 1024 + 7);
    let server = range_server::start(body.clone());
    let dir = tempdir().unwrap();
    let dest = dir.path().join("dump.bin");
    let progress = Arc::new(ProgressAggregator::new());

    let result = download(&server.url, &dest, &fast_options(4), &progress, &CancelToken::new());

    assert_eq!(result.status, DownloadStatus::Complete, "{:?}", result.failure());
    assert_eq!(result.strategy, Some(Strategy::Segmented));
    assert_eq!(result.bytes, body.len() as u64);
    assert_eq!(std::fs::read(&dest).unwrap(), body);
    assert!(!storage::temp_path(&dest).exists(), "temp file promoted");
    assert_eq!(server.stats.ranged_gets(), 4);
    assert_eq!(progress.total(), body.len() as u64);
}

#[test]
fn dropped_connections_are_retried_and_match_single_stream() {
    let body = common::payload(96 * 1024);
    let flaky = range_server::start_with_options(
        body.clone(),
        RangeServerOptions {
            reset_first_n: 2,
            ..RangeServerOptions::default()
        },
    );
    let plain = range_server::start_with_options(
        body.clone(),
        RangeServerOptions {
            support_ranges: false,
            ..RangeServerOptions::default()
        },
    );
    let dir = tempdir().unwrap();
    let segmented = dir.path().join("segmented.bin");
    let single = dir.path().join("single.bin");
    let progress = Arc::new(ProgressAggregator::new());

    let a = download(&flaky.url, &segmented, &fast_options(4), &progress, &CancelToken::new());
    let b = download(
        &plain.url,
        &single,
        &fast_options(4),
        &Arc::new(ProgressAggregator::new()),
        &CancelToken::new(),
    );

    assert!(a.is_complete(), "{:?}", a.failure());
    assert!(b.is_complete(), "{:?}", b.failure());
    assert_eq!(b.strategy, Some(Strategy::Sequential));
    assert_eq!(flaky.stats.resets(), 2);
    assert!(flaky.stats.ranged_gets() >= 6, "resets trigger extra range requests");
    assert_eq!(std::fs::read(&segmented).unwrap(), std::fs::read(&single).unwrap());
    // Bytes written before a reset are not counted twice.
    assert_eq!(progress.total(), body.len() as u64);
}

#[test]
fn head_blocked_falls_back_to_range_probe_and_completes() {
    let body = common::payload(32 * 1024);
    let server = range_server::start_with_options(
        body.clone(),
        RangeServerOptions {
            head_allowed: false,
            ..RangeServerOptions::default()
        },
    );
    let dir = tempdir().unwrap();
    let dest = dir.path().join("dump.bin");

    let result = download(
        &server.url,
        &dest,
        &fast_options(3),
        &Arc::new(ProgressAggregator::new()),
        &CancelToken::new(),
    );

    assert!(result.is_complete(), "{:?}", result.failure());
    assert_eq!(result.strategy, Some(Strategy::Segmented));
    assert_eq!(std::fs::read(&dest).unwrap(), body);
}

#[test]
fn no_range_server_falls_back_to_single_stream_get() {
    let body = common::payload(32 * 1024);
    let server = range_server::start_with_options(
        body.clone(),
        RangeServerOptions {
            support_ranges: false,
            ..RangeServerOptions::default()
        },
    );
    let dir = tempdir().unwrap();
    let dest = dir.path().join("dump.bin");
    let progress = Arc::new(ProgressAggregator::new());

    let result = download(&server.url, &dest, &fast_options(4), &progress, &CancelToken::new());

    assert!(result.is_complete(), "{:?}", result.failure());
    assert_eq!(result.strategy, Some(Strategy::Sequential));
    assert_eq!(server.stats.ranged_gets(), 0);
    assert_eq!(std::fs::read(&dest).unwrap(), body);
    assert_eq!(progress.total(), body.len() as u64);
}

#[test]
fn ignored_range_header_falls_back_to_single_stream() {
    let body = common::payload(48 * 1024);
    let server = range_server::start_with_options(
        body.clone(),
        RangeServerOptions {
            ignore_range: true,
            ..RangeServerOptions::default()
        },
    );
    let dir = tempdir().unwrap();
    let dest = dir.path().join("dump.bin");
    let progress = Arc::new(ProgressAggregator::new());

    let result = download(&server.url, &dest, &fast_options(4), &progress, &CancelToken::new());

    assert!(result.is_complete(), "{:?}", result.failure());
    assert_eq!(result.strategy, Some(Strategy::Sequential));
    assert_eq!(std::fs::read(&dest).unwrap(), body);
    assert_eq!(progress.total(), body.len() as u64);
}

#[test]
fn exhausted_segment_fails_and_discards_temp_file() {
    let body = common::payload(40 * 1024);
    let server = range_server::start_with_options(
        body,
        RangeServerOptions {
            fail_range_start: Some(0),
            ..RangeServerOptions::default()
        },
    );
    let dir = tempdir().unwrap();
    let dest = dir.path().join("dump.bin");
    let mut options = fast_options(4);
    options.retry.max_retries = 1;

    let result = download(
        &server.url,
        &dest,
        &options,
        &Arc::new(ProgressAggregator::new()),
        &CancelToken::new(),
    );

    let failure = result.failure().expect("download should fail");
    assert_eq!(failure.reason, FailureReason::SegmentExhausted);
    assert!(failure.message.contains("segment 0"), "{}", failure.message);
    assert!(!dest.exists());
    assert!(!storage::temp_path(&dest).exists());
}

#[test]
fn unreachable_server_is_resource_unavailable() {
    let dir = tempdir().unwrap();
    let dest = dir.path().join("dump.bin");
    // Port 9 (discard) is closed on test hosts.
    let result = download(
        "http://127.0.0.1:9/dump.bin",
        &dest,
        &fast_options(2),
        &Arc::new(ProgressAggregator::new()),
        &CancelToken::new(),
    );
    assert_eq!(
        result.failure().map(|f| f.reason),
        Some(FailureReason::ResourceUnavailable)
    );
    assert!(result.strategy.is_none());
    assert!(!dest.exists());
}

#[test]
fn cancel_stops_workers_and_keeps_partial_file() {
    let body = common::payload(512 * 1024);
    let server = range_server::start_with_options(
        body,
        RangeServerOptions {
            chunk_delay: Some(Duration::from_millis(20)),
            ..RangeServerOptions::default()
        },
    );
    let dir = tempdir().unwrap();
    let dest = dir.path().join("dump.bin");
    let cancel = CancelToken::new();
    let canceller = {
        let cancel = cancel.clone();
        std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(200));
            cancel.cancel();
        })
    };

    let result = download(
        &server.url,
        &dest,
        &fast_options(2),
        &Arc::new(ProgressAggregator::new()),
        &cancel,
    );
    canceller.join().unwrap();

    let partial = storage::temp_path(&dest);
    assert_eq!(
        result.status,
        DownloadStatus::Cancelled {
            partial_path: Some(partial.clone())
        }
    );
    assert!(partial.exists());
    assert!(!dest.exists());
}

#[test]
fn sequential_length_differing_from_size_hint_is_size_mismatch() {
    let body = common::payload(20 * 1024);
    let server = range_server::start_with_options(
        body.clone(),
        RangeServerOptions {
            support_ranges: false,
            head_length: Some(body.len() as u64 + 100),
            ..RangeServerOptions::default()
        },
    );
    let dir = tempdir().unwrap();
    let dest = dir.path().join("dump.bin");

    let result = download(
        &server.url,
        &dest,
        &fast_options(4),
        &Arc::new(ProgressAggregator::new()),
        &CancelToken::new(),
    );

    assert_eq!(result.strategy, Some(Strategy::Sequential));
    let failure = result.failure().expect("size mismatch should fail");
    assert_eq!(failure.reason, FailureReason::SizeMismatch);
    assert!(!dest.exists());
    assert!(!storage::temp_path(&dest).exists());
}

#[test]
fn sequential_without_size_hint_accepts_received_length() {
    let body = common::payload(20 * 1024 + 3);
    let server = range_server::start_with_options(
        body.clone(),
        RangeServerOptions {
            support_ranges: false,
            omit_length: true,
            ..RangeServerOptions::default()
        },
    );
    let dir = tempdir().unwrap();
    let dest = dir.path().join("dump.bin");
    let progress = Arc::new(ProgressAggregator::new());

    let result = download(&server.url, &dest, &fast_options(4), &progress, &CancelToken::new());

    assert!(result.is_complete(), "{:?}", result.failure());
    assert_eq!(result.strategy, Some(Strategy::Sequential));
    assert_eq!(result.bytes, body.len() as u64);
    assert_eq!(std::fs::read(&dest).unwrap(), body);
    assert_eq!(progress.snapshot().expected, None);
    assert_eq!(progress.total(), body.len() as u64);
}

//! Progress aggregation for downloads (bytes) and conversions (rows).
//!
//! Writers call `add` from any thread; it is a single atomic add. Readers call
//! `snapshot` on their own cadence; the rate is computed over a sliding window
//! of timestamped samples recorded at snapshot time, so bursty segment
//! completions do not make the reported rate jump around.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

/// Default sliding window for rate computation.
pub const DEFAULT_RATE_WINDOW: Duration = Duration::from_secs(5);

const MAX_SAMPLES: usize = 256;
const NO_EXPECTED: u64 = u64::MAX;

#[derive(Debug)]
pub struct ProgressAggregator {
    total: AtomicU64,
    expected: AtomicU64,
    started: Instant,
    window: Duration,
    samples: Mutex<VecDeque<(Instant, u64)>>,
}

impl Default for ProgressAggregator {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressAggregator {
    pub fn new() -> Self {
        Self::with_window(DEFAULT_RATE_WINDOW)
    }

    pub fn with_window(window: Duration) -> Self {
        let started = Instant::now();
        let mut samples = VecDeque::with_capacity(16);
        samples.push_back((started, 0));
        Self {
            total: AtomicU64::new(0),
            expected: AtomicU64::new(NO_EXPECTED),
            started,
            window: window.max(Duration::from_millis(100)),
            samples: Mutex::new(samples),
        }
    }

    /// Record `delta` more units (bytes or rows).
    pub fn add(&self, delta: u64) {
        if delta > 0 {
            self.total.fetch_add(delta, Ordering::AcqRel);
        }
    }

    /// Current total without touching the rate window.
    pub fn total(&self) -> u64 {
        self.total.load(Ordering::Acquire)
    }

    /// Set (or clear) the expected final total used for fraction/ETA.
    pub fn set_expected(&self, expected: Option<u64>) {
        self.expected
            .store(expected.unwrap_or(NO_EXPECTED), Ordering::Release);
    }

    pub fn snapshot(&self) -> ProgressSnapshot {
        let now = Instant::now();
        let total = self.total.load(Ordering::Acquire);
        let elapsed = now.duration_since(self.started);

        let mut samples = self.samples.lock().unwrap_or_else(PoisonError::into_inner);
        samples.push_back((now, total));
        while samples.len() > 2 {
            let oldest = samples[0].0;
            if now.duration_since(oldest) > self.window || samples.len() > MAX_SAMPLES {
                samples.pop_front();
            } else {
                break;
            }
        }
        let (t0, b0) = samples[0];
        drop(samples);

        let span = now.duration_since(t0).as_secs_f64();
        let rate = if span > 0.0 && total >= b0 {
            (total - b0) as f64 / span
        } else if elapsed.as_secs_f64() > 0.0 {
            total as f64 / elapsed.as_secs_f64()
        } else {
            0.0
        };

        let expected = match self.expected.load(Ordering::Acquire) {
            NO_EXPECTED => None,
            n => Some(n),
        };

        ProgressSnapshot {
            total,
            expected,
            rate,
            elapsed,
        }
    }
}

/// Point-in-time view of an aggregator.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProgressSnapshot {
    /// Units recorded so far.
    pub total: u64,
    /// Expected final total, if known.
    pub expected: Option<u64>,
    /// Units per second over the sliding window.
    pub rate: f64,
    /// Time since the aggregator was created.
    pub elapsed: Duration,
}

impl ProgressSnapshot {
    /// Fraction complete in [0.0, 1.0], if the expected total is known.
    pub fn fraction(&self) -> Option<f64> {
        let expected = self.expected?;
        if expected == 0 {
            return Some(1.0);
        }
        Some((self.total as f64 / expected as f64).min(1.0))
    }

    /// Estimated time remaining (None if the total or rate is unknown).
    pub fn eta(&self) -> Option<Duration> {
        let remaining = self.expected?.saturating_sub(self.total);
        if remaining == 0 {
            return Some(Duration::ZERO);
        }
        if self.rate <= 0.0 {
            return None;
        }
        Some(Duration::from_secs_f64(remaining as f64 / self.rate))
    }
}

//! Download outcome types.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use crate::fetch_head::ProbeError;
use crate::outcome::{Failure, FailureReason};

/// How the bytes were fetched. Chosen once per download from the probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// Parallel byte-range GETs into a preallocated file.
    Segmented,
    /// One GET streamed from offset 0.
    Sequential,
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Strategy::Segmented => f.write_str("segmented"),
            Strategy::Sequential => f.write_str("sequential"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DownloadStatus {
    Complete,
    /// Stopped by the cancel token. The partial temp file, if any, is kept.
    Cancelled { partial_path: Option<PathBuf> },
    Failed(Failure),
}

/// Terminal outcome of one `download` call. Never mutated after creation.
#[derive(Debug, Clone)]
pub struct DownloadResult {
    pub url: String,
    pub local_path: PathBuf,
    /// Bytes in the destination file (0 unless complete).
    pub bytes: u64,
    /// None when the download never got past the probe.
    pub strategy: Option<Strategy>,
    pub status: DownloadStatus,
    pub elapsed: Duration,
}

impl DownloadResult {
    pub fn is_complete(&self) -> bool {
        matches!(self.status, DownloadStatus::Complete)
    }

    pub fn failure(&self) -> Option<&Failure> {
        match &self.status {
            DownloadStatus::Failed(f) => Some(f),
            _ => None,
        }
    }
}

/// Internal download errors. Each maps onto a `FailureReason`.
#[derive(Debug, thiserror::Error)]
pub enum DownloadError {
    #[error(transparent)]
    Probe(#[from] ProbeError),
    #[error("segment {index} failed after {attempts} attempts: {last}")]
    SegmentExhausted {
        index: usize,
        attempts: u32,
        last: String,
    },
    #[error("{0}")]
    PermanentNetwork(String),
    #[error("expected {expected} bytes, received {received}")]
    SizeMismatch { expected: u64, received: u64 },
    #[error("storage: {0:#}")]
    Storage(anyhow::Error),
    /// Server answered a range request with the full body. Triggers the
    /// sequential fallback; never surfaced.
    #[error("server ignored range request")]
    RangeIgnored,
    #[error("download cancelled")]
    Cancelled,
    #[error("{0}")]
    Internal(String),
}

impl DownloadError {
    pub fn reason(&self) -> FailureReason {
        match self {
            DownloadError::Probe(e) => e.reason(),
            DownloadError::SegmentExhausted { .. } => FailureReason::SegmentExhausted,
            DownloadError::PermanentNetwork(_) | DownloadError::RangeIgnored => {
                FailureReason::PermanentNetwork
            }
            DownloadError::SizeMismatch { .. } => FailureReason::SizeMismatch,
            DownloadError::Storage(_) => FailureReason::Storage,
            DownloadError::Cancelled | DownloadError::Internal(_) => FailureReason::InvalidState,
        }
    }

    pub fn to_failure(&self) -> Failure {
        Failure::new(self.reason(), self.to_string())
    }
}

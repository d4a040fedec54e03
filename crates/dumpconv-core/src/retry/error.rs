//! Transfer error type used for retry classification.

use std::fmt;

/// Error returned by one transfer attempt (a segment or the sequential stream).
/// Kept separate from the public download errors so the retry loop can classify
/// it before the failure is surfaced.
#[derive(Debug)]
pub enum SegmentError {
    /// Curl reported an error (timeout, connection reset, DNS, ...).
    Curl(curl::Error),
    /// HTTP response had an unexpected status.
    Http(u32),
    /// Server answered a range request with the whole body (200).
    RangeIgnored,
    /// Transfer ended before the requested range was fully written.
    PartialTransfer { expected: u64, received: u64 },
    /// Server sent more bytes than the requested range.
    Overrun { expected: u64 },
    /// Local write failed (disk full, permission denied). Not retried.
    Storage(std::io::Error),
    /// The cancel token fired while the transfer was running.
    Cancelled,
}

impl fmt::Display for SegmentError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SegmentError::Curl(e) => write!(f, "{}", e),
            SegmentError::Http(code) => write!(f, "HTTP {}", code),
            SegmentError::RangeIgnored => write!(f, "server ignored the range request"),
            SegmentError::PartialTransfer { expected, received } => {
                write!(f, "partial transfer: expected {} bytes, got {}", expected, received)
            }
            SegmentError::Overrun { expected } => {
                write!(f, "server sent more than the {} requested bytes", expected)
            }
            SegmentError::Storage(e) => write!(f, "storage: {}", e),
            SegmentError::Cancelled => write!(f, "cancelled"),
        }
    }
}

impl std::error::Error for SegmentError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SegmentError::Curl(e) => Some(e),
            SegmentError::Storage(e) => Some(e),
            _ => None,
        }
    }
}

//! Terminal outcome vocabulary shared by downloads and conversions.

use std::fmt;

/// Machine-readable reason attached to a failed top-level operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureReason {
    /// The capability probe could not reach the resource.
    ResourceUnavailable,
    /// Non-retryable network or HTTP failure (404, malformed URL, ...).
    PermanentNetwork,
    /// One segment failed permanently after its retry budget.
    SegmentExhausted,
    /// Sequential download size disagreed with the size hint.
    SizeMismatch,
    /// Local file I/O failed while downloading.
    Storage,
    /// The record source could not be opened or read.
    SourceRead,
    /// The tabular sink rejected a write.
    SinkWrite,
    /// The operation was invoked in a state that does not allow it.
    InvalidState,
}

impl FailureReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureReason::ResourceUnavailable => "resource_unavailable",
            FailureReason::PermanentNetwork => "permanent_network",
            FailureReason::SegmentExhausted => "segment_exhausted",
            FailureReason::SizeMismatch => "size_mismatch",
            FailureReason::Storage => "storage",
            FailureReason::SourceRead => "source_read",
            FailureReason::SinkWrite => "sink_write",
            FailureReason::InvalidState => "invalid_state",
        }
    }
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A failure as reported to callers: reason code plus a human-readable message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Failure {
    pub reason: FailureReason,
    pub message: String,
}

impl Failure {
    pub fn new(reason: FailureReason, message: impl Into<String>) -> Self {
        Self {
            reason,
            message: message.into(),
        }
    }
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.reason, self.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failure_display_has_code_and_message() {
        let f = Failure::new(FailureReason::SegmentExhausted, "segment 3 failed after 6 attempts");
        assert_eq!(
            f.to_string(),
            "segment_exhausted: segment 3 failed after 6 attempts"
        );
    }
}

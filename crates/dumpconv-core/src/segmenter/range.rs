//! Transfer segment type and range planning.

/// Lifecycle of one segment inside a single download call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmentState {
    Pending,
    InFlight,
    Complete,
    Failed,
}

/// One byte range `[start, end)` of the remote resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferSegment {
    /// Position in the partition (0-based).
    pub index: usize,
    /// Start offset (inclusive).
    pub start: u64,
    /// End offset (exclusive).
    pub end: u64,
    pub state: SegmentState,
    /// Retries consumed so far.
    pub retries: u32,
}

impl TransferSegment {
    pub fn new(index: usize, start: u64, end: u64) -> Self {
        Self {
            index,
            start,
            end,
            state: SegmentState::Pending,
            retries: 0,
        }
    }

    /// Length of this segment in bytes.
    pub fn len(&self) -> u64 {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// curl range value (inclusive end) for the part of the segment that
    /// starts `already` bytes in: `start+already-(end-1)`.
    pub fn curl_range(&self, already: u64) -> String {
        let from = self.start.saturating_add(already).min(self.end.saturating_sub(1));
        format!("{}-{}", from, self.end.saturating_sub(1))
    }
}

/// Builds a segment plan for a given total size and segment count.
///
/// Every segment gets `total_size / count` bytes and the last one also
/// absorbs the remainder, so the partition is exact and gap-free. Never
/// produces empty segments; when `segment_count > total_size` fewer segments
/// are returned. Returns an empty vec if either input is 0.
pub fn plan_segments(total_size: u64, segment_count: usize) -> Vec<TransferSegment> {
    if total_size == 0 || segment_count == 0 {
        return Vec::new();
    }

    let segment_count = (segment_count as u64).min(total_size);
    let base = total_size / segment_count;

    (0..segment_count)
        .map(|i| {
            let start = i * base;
            let end = if i + 1 == segment_count {
                total_size
            } else {
                start + base
            };
            TransferSegment::new(i as usize, start, end)
        })
        .collect()
}

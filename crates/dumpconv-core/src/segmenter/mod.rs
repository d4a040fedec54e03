//! Range math and segment planning.
//!
//! Splits a resource into N contiguous byte ranges and tracks each segment's
//! transfer state while the downloader runs.

mod range;

pub use range::{plan_segments, SegmentState, TransferSegment};

//! One byte-range GET for a transfer segment.

use std::cell::Cell;
use std::str;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::control::CancelToken;
use crate::fetch_head::{parse_status_line, NetOptions};
use crate::progress::ProgressAggregator;
use crate::retry::SegmentError;
use crate::segmenter::TransferSegment;
use crate::storage::StorageWriter;

/// Fetch the unwritten tail of `segment` and write it at the segment's offsets.
///
/// `written` counts bytes of this segment already on disk and survives across
/// retry attempts, so a retry requests only `start + written ..= end - 1`.
/// Every chunk written is pushed to `progress`.
pub(super) fn fetch_segment(
    url: &str,
    net: &NetOptions,
    segment: &TransferSegment,
    written: &AtomicU64,
    storage: &StorageWriter,
    progress: &ProgressAggregator,
    cancel: &CancelToken,
) -> Result<(), SegmentError> {
    let len = segment.len();
    let already = written.load(Ordering::Acquire);
    if already >= len {
        return Ok(());
    }

    let mut easy = curl::easy::Easy::new();
    easy.url(url).map_err(SegmentError::Curl)?;
    net.apply(&mut easy).map_err(SegmentError::Curl)?;
    easy.range(&segment.curl_range(already))
        .map_err(SegmentError::Curl)?;
    easy.progress(true).map_err(SegmentError::Curl)?;

    let status = Cell::new(0u32);
    let mut abort: Option<SegmentError> = None;

    let performed = {
        let mut transfer = easy.transfer();
        transfer
            .header_function(|line| {
                if let Some(code) = str::from_utf8(line)
                    .ok()
                    .and_then(|s| parse_status_line(s.trim_end()))
                {
                    status.set(code);
                }
                true
            })
            .map_err(SegmentError::Curl)?;
        transfer
            .write_function(|data| {
                if cancel.is_cancelled() {
                    abort = Some(SegmentError::Cancelled);
                    return Ok(0);
                }
                match status.get() {
                    200 => {
                        abort = Some(SegmentError::RangeIgnored);
                        return Ok(0);
                    }
                    // Error body; the status is reported after perform.
                    s if s >= 300 => return Ok(data.len()),
                    _ => {}
                }
                let done = written.load(Ordering::Acquire);
                let n = data.len() as u64;
                if done + n > len {
                    abort = Some(SegmentError::Overrun { expected: len });
                    return Ok(0);
                }
                if let Err(e) = storage.write_at(segment.start + done, data) {
                    abort = Some(SegmentError::Storage(e));
                    return Ok(0);
                }
                written.fetch_add(n, Ordering::AcqRel);
                progress.add(n);
                Ok(data.len())
            })
            .map_err(SegmentError::Curl)?;
        transfer
            .progress_function(|_, _, _, _| !cancel.is_cancelled())
            .map_err(SegmentError::Curl)?;
        transfer.perform()
    };

    if let Some(e) = abort {
        return Err(e);
    }
    if let Err(e) = performed {
        if e.is_aborted_by_callback() && cancel.is_cancelled() {
            return Err(SegmentError::Cancelled);
        }
        return Err(SegmentError::Curl(e));
    }

    let code = easy.response_code().map_err(SegmentError::Curl)?;
    let received = written.load(Ordering::Acquire);
    if code == 416 && received >= len {
        return Ok(());
    }
    if !(200..300).contains(&code) {
        return Err(SegmentError::Http(code));
    }
    if received < len {
        return Err(SegmentError::PartialTransfer {
            expected: len,
            received,
        });
    }
    Ok(())
}

//! Single-stream GET, used when ranges are unavailable or ignored.

use std::cell::Cell;
use std::str;

use crate::control::CancelToken;
use crate::fetch_head::{parse_status_line, NetOptions};
use crate::progress::ProgressAggregator;
use crate::retry::SegmentError;
use crate::storage::StorageWriter;

/// One attempt: GET the whole body and write it from offset 0.
///
/// Each attempt starts over, so progress is only reported past `high_water`
/// (the furthest byte any earlier attempt reported). Returns bytes written.
pub(super) fn fetch_sequential(
    url: &str,
    net: &NetOptions,
    storage: &StorageWriter,
    progress: &ProgressAggregator,
    high_water: &mut u64,
    cancel: &CancelToken,
) -> Result<u64, SegmentError> {
    let mut easy = curl::easy::Easy::new();
    easy.url(url).map_err(SegmentError::Curl)?;
    net.apply(&mut easy).map_err(SegmentError::Curl)?;
    easy.progress(true).map_err(SegmentError::Curl)?;

    let status = Cell::new(0u32);
    let mut written = 0u64;
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
                if status.get() >= 300 {
                    return Ok(data.len());
                }
                if let Err(e) = storage.write_at(written, data) {
                    abort = Some(SegmentError::Storage(e));
                    return Ok(0);
                }
                written += data.len() as u64;
                if written > *high_water {
                    progress.add(written - *high_water);
                    *high_water = written;
                }
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
    if !(200..300).contains(&code) {
        return Err(SegmentError::Http(code));
    }
    Ok(written)
}

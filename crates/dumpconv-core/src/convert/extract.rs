//! Chunked extraction: pass 2 over the record stream.

use crate::control::CancelToken;
use crate::progress::ProgressAggregator;
use crate::source::{Record, RecordError};

use super::batch::RowBatch;
use super::schema::Schema;
use super::sink::TabularSink;
use super::ConvertError;

/// Counters filled by `extract`, valid even when it fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExtractReport {
    /// Rows handed to the sink.
    pub rows: u64,
    /// `write_batch` calls made.
    pub batches: u64,
    pub malformed: u64,
    /// Fields seen in this pass that the frozen schema does not contain.
    pub ignored_fields: u64,
}

/// Project every record onto `schema` and write the rows to `sink` in
/// batches of `batch_size`, preserving source order.
///
/// Writes the header first. Each flush adds its row count to `progress`, and
/// cancellation is checked before every flush. Sink errors are fatal; the
/// sink is not closed here.
pub fn extract<I, S>(
    records: I,
    schema: &Schema,
    sink: &mut S,
    batch_size: usize,
    progress: &ProgressAggregator,
    cancel: &CancelToken,
    report: &mut ExtractReport,
) -> Result<(), ConvertError>
where
    I: Iterator<Item = Result<Record, RecordError>>,
    S: TabularSink + ?Sized,
{
    cancel.check().map_err(|_| ConvertError::Cancelled)?;
    sink.write_header(schema)?;

    let mut batch = RowBatch::with_capacity(batch_size);
    for item in records {
        let record = match item {
            Ok(r) => r,
            Err(e) if !e.is_fatal() => {
                report.malformed += 1;
                continue;
            }
            Err(e) => return Err(ConvertError::Read(e)),
        };
        let (row, unknown) = schema.project(&record);
        if unknown > 0 {
            report.ignored_fields += unknown as u64;
        }
        batch.push(row);
        if batch.is_full() {
            flush(&mut batch, sink, progress, cancel, report)?;
        }
    }
    if !batch.is_empty() {
        flush(&mut batch, sink, progress, cancel, report)?;
    }

    if report.ignored_fields > 0 {
        tracing::warn!(
            ignored = report.ignored_fields,
            "fields absent from the discovered schema were dropped"
        );
    }
    Ok(())
}

fn flush<S: TabularSink + ?Sized>(
    batch: &mut RowBatch,
    sink: &mut S,
    progress: &ProgressAggregator,
    cancel: &CancelToken,
    report: &mut ExtractReport,
) -> Result<(), ConvertError> {
    cancel.check().map_err(|_| ConvertError::Cancelled)?;
    sink.write_batch(batch)?;
    let n = batch.len() as u64;
    report.rows += n;
    report.batches += 1;
    progress.add(n);
    batch.clear();
    Ok(())
}

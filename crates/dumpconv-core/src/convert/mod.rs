//! Two-pass streaming conversion of a record source into a table.
//!
//! Pass 1 (`discover_schema`) reads the whole source to learn the column set;
//! pass 2 (`extract`) reopens it and writes rows in bounded batches. Nothing
//! but the schema and one batch is held in memory.

mod batch;
mod extract;
mod schema;
mod sink;

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::config::DumpConfig;
use crate::control::CancelToken;
use crate::naming;
use crate::outcome::{Failure, FailureReason};
use crate::progress::ProgressAggregator;
use crate::source::{RecordError, RecordSource, SourceError, XmlDumpSource};
use crate::storage;

pub use batch::RowBatch;
pub use extract::{extract, ExtractReport};
pub use schema::{discover_schema, Discovery, Schema};
pub use sink::{CsvSink, SinkError, TabularSink};

#[derive(Debug, thiserror::Error)]
pub enum ConvertError {
    #[error(transparent)]
    Source(#[from] SourceError),
    #[error("reading records failed: {0}")]
    Read(RecordError),
    #[error(transparent)]
    Sink(#[from] SinkError),
    #[error("conversion cancelled")]
    Cancelled,
    #[error("{0}")]
    InvalidState(String),
}

impl ConvertError {
    pub fn reason(&self) -> FailureReason {
        match self {
            ConvertError::Source(_) | ConvertError::Read(_) => FailureReason::SourceRead,
            ConvertError::Sink(_) => FailureReason::SinkWrite,
            ConvertError::Cancelled | ConvertError::InvalidState(_) => FailureReason::InvalidState,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConvertOptions {
    /// Rows per sink flush.
    pub batch_size: usize,
}

impl Default for ConvertOptions {
    fn default() -> Self {
        Self::from(&DumpConfig::default())
    }
}

impl From<&DumpConfig> for ConvertOptions {
    fn from(cfg: &DumpConfig) -> Self {
        Self {
            batch_size: cfg.batch_size.max(1),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConverterState {
    Idle,
    DiscoveringSchema,
    Extracting,
    Done,
    Failed,
}

/// The pass that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Discovery,
    Extraction,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Discovery => f.write_str("schema discovery"),
            Stage::Extraction => f.write_str("extraction"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConversionStatus {
    Complete,
    /// Output is complete except for `skipped` malformed records.
    Partial { skipped: u64 },
    Cancelled,
    Failed(Failure),
}

#[derive(Debug, Clone)]
pub struct ConversionResult {
    pub rows: u64,
    pub columns: usize,
    pub malformed: u64,
    /// Final file on success; the retained `.part` file after a sink failure
    /// or cancellation; None when no output was created.
    pub output_path: Option<PathBuf>,
    pub status: ConversionStatus,
    pub failed_stage: Option<Stage>,
    pub elapsed: Duration,
}

impl ConversionResult {
    /// Complete or partial: the output file is in place.
    pub fn is_success(&self) -> bool {
        matches!(
            self.status,
            ConversionStatus::Complete | ConversionStatus::Partial { .. }
        )
    }

    pub fn failure(&self) -> Option<&Failure> {
        match &self.status {
            ConversionStatus::Failed(f) => Some(f),
            _ => None,
        }
    }
}

/// Single-use two-pass converter.
pub struct Converter<S: RecordSource> {
    source: S,
    options: ConvertOptions,
    state: ConverterState,
    progress: Arc<ProgressAggregator>,
    cancel: CancelToken,
}

impl<S: RecordSource> Converter<S> {
    pub fn new(source: S, options: ConvertOptions) -> Self {
        Self {
            source,
            options,
            state: ConverterState::Idle,
            progress: Arc::new(ProgressAggregator::new()),
            cancel: CancelToken::new(),
        }
    }

    /// Report extracted rows to `progress` (its expected total is set to the
    /// record count found by discovery).
    pub fn with_progress(mut self, progress: Arc<ProgressAggregator>) -> Self {
        self.progress = progress;
        self
    }

    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn state(&self) -> ConverterState {
        self.state
    }

    /// Convert the source into a CSV file at `dest`.
    ///
    /// Output goes to `<dest>.part` and is renamed once complete. A second
    /// call fails with `invalid_state`.
    pub fn run(&mut self, dest: &Path) -> ConversionResult {
        let started = Instant::now();
        let mut result = ConversionResult {
            rows: 0,
            columns: 0,
            malformed: 0,
            output_path: None,
            status: ConversionStatus::Complete,
            failed_stage: None,
            elapsed: Duration::ZERO,
        };

        if self.state != ConverterState::Idle {
            result.status = ConversionStatus::Failed(Failure::new(
                FailureReason::InvalidState,
                format!("converter already used (state {:?})", self.state),
            ));
            return result;
        }

        let name = self.source.describe();
        self.state = ConverterState::DiscoveringSchema;
        tracing::info!(source = %name, "schema discovery started");
        let discovery = match self
            .source
            .open()
            .map_err(ConvertError::from)
            .and_then(|records| discover_schema(records, &self.cancel))
        {
            Ok(d) => d,
            Err(e) => return self.fail(result, Stage::Discovery, e, started),
        };
        result.columns = discovery.schema.len();
        result.malformed = discovery.malformed;
        tracing::info!(
            source = %name,
            columns = discovery.schema.len(),
            records = discovery.records,
            malformed = discovery.malformed,
            "schema discovery finished"
        );

        self.state = ConverterState::Extracting;
        self.progress.set_expected(Some(discovery.records));
        let temp = storage::temp_path(dest);
        let mut sink = match CsvSink::create(&temp) {
            Ok(s) => s,
            Err(e) => return self.fail(result, Stage::Extraction, e.into(), started),
        };

        let mut report = ExtractReport::default();
        let outcome = self
            .source
            .open()
            .map_err(ConvertError::from)
            .and_then(|records| {
                extract(
                    records,
                    &discovery.schema,
                    &mut sink,
                    self.options.batch_size,
                    &self.progress,
                    &self.cancel,
                    &mut report,
                )
            })
            .and_then(|()| sink.close().map_err(ConvertError::from));
        drop(sink);
        result.rows = report.rows;
        result.malformed = report.malformed;
        if report.malformed != discovery.malformed {
            tracing::warn!(
                pass1 = discovery.malformed,
                pass2 = report.malformed,
                "malformed record counts differ between passes"
            );
        }

        if let Err(e) = outcome {
            // Partial output is kept on cancel or sink failure.
            if matches!(e, ConvertError::Cancelled | ConvertError::Sink(_)) && temp.exists() {
                result.output_path = Some(temp);
            } else {
                let _ = std::fs::remove_file(&temp);
            }
            return self.fail(result, Stage::Extraction, e, started);
        }

        if let Err(e) = storage::promote(&temp, dest) {
            result.output_path = Some(temp);
            let err = ConvertError::Sink(SinkError::Io {
                path: dest.display().to_string(),
                source: e,
            });
            return self.fail(result, Stage::Extraction, err, started);
        }

        self.state = ConverterState::Done;
        result.output_path = Some(dest.to_path_buf());
        result.status = match result.malformed {
            0 => ConversionStatus::Complete,
            skipped => ConversionStatus::Partial { skipped },
        };
        result.elapsed = started.elapsed();
        tracing::info!(
            source = %name,
            dest = %dest.display(),
            rows = result.rows,
            columns = result.columns,
            malformed = result.malformed,
            elapsed_ms = result.elapsed.as_millis() as u64,
            "conversion complete"
        );
        result
    }

    fn fail(
        &mut self,
        mut result: ConversionResult,
        stage: Stage,
        err: ConvertError,
        started: Instant,
    ) -> ConversionResult {
        self.state = ConverterState::Failed;
        result.failed_stage = Some(stage);
        result.elapsed = started.elapsed();
        result.status = match err {
            ConvertError::Cancelled => {
                tracing::info!(stage = %stage, "conversion cancelled");
                ConversionStatus::Cancelled
            }
            e => {
                let failure = Failure::new(e.reason(), format!("{} failed: {}", stage, e));
                tracing::warn!(reason = %failure.reason, error = %failure.message, "conversion failed");
                ConversionStatus::Failed(failure)
            }
        };
        result
    }
}

/// Convert an XML dump (plain or gzip) at `source_path` into CSV at `dest`.
///
/// The record element is inferred from Discogs-style file names
/// (`discogs_20240101_releases.xml.gz` → `release`); other files use the
/// children of the root element as records.
pub fn convert(source_path: &Path, dest: &Path, batch_size: usize) -> ConversionResult {
    let tag = naming::record_tag_for_path(source_path);
    let source = XmlDumpSource::new(source_path, tag);
    Converter::new(source, ConvertOptions { batch_size }).run(dest)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::Record;

    struct VecSource(Vec<Record>);

    impl RecordSource for VecSource {
        type Records = std::vec::IntoIter<Result<Record, RecordError>>;

        fn open(&self) -> Result<Self::Records, SourceError> {
            Ok(self.0.iter().cloned().map(Ok).collect::<Vec<_>>().into_iter())
        }

        fn describe(&self) -> String {
            "memory".into()
        }
    }

    fn scenario() -> VecSource {
        VecSource(vec![
            [("a", "1"), ("b", "2")].into_iter().collect(),
            [("b", "3"), ("c", "4")].into_iter().collect(),
            [("a", "5")].into_iter().collect(),
        ])
    }

    #[test]
    fn state_machine_and_second_run_is_invalid() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("out.csv");
        let mut conv = Converter::new(scenario(), ConvertOptions { batch_size: 2 });
        assert_eq!(conv.state(), ConverterState::Idle);

        let first = conv.run(&dest);
        assert_eq!(first.status, ConversionStatus::Complete);
        assert_eq!(conv.state(), ConverterState::Done);
        assert_eq!((first.rows, first.columns), (3, 3));
        assert_eq!(
            std::fs::read_to_string(&dest).unwrap(),
            "a,b,c\n1,2,\n,3,4\n5,,\n"
        );

        let second = conv.run(&dest);
        assert_eq!(
            second.failure().map(|f| f.reason),
            Some(FailureReason::InvalidState)
        );
        assert!(second.failed_stage.is_none());
    }

    #[test]
    fn progress_counts_rows() {
        let dir = tempfile::tempdir().unwrap();
        let progress = Arc::new(ProgressAggregator::new());
        let result = Converter::new(scenario(), ConvertOptions { batch_size: 2 })
            .with_progress(Arc::clone(&progress))
            .run(&dir.path().join("p.csv"));
        assert!(result.is_success());
        let snap = progress.snapshot();
        assert_eq!(snap.total, 3);
        assert_eq!(snap.expected, Some(3));
    }

    #[test]
    fn missing_source_fails_in_discovery_without_output() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("never.csv");
        let source = XmlDumpSource::new(dir.path().join("missing.xml"), None);
        let mut conv = Converter::new(source, ConvertOptions::default());
        let result = conv.run(&dest);
        assert_eq!(result.failed_stage, Some(Stage::Discovery));
        assert_eq!(
            result.failure().map(|f| f.reason),
            Some(FailureReason::SourceRead)
        );
        assert_eq!(conv.state(), ConverterState::Failed);
        assert!(result.output_path.is_none());
        assert!(!dest.exists());
        assert!(!storage::temp_path(&dest).exists());
    }

    #[test]
    fn cancelled_before_start() {
        let dir = tempfile::tempdir().unwrap();
        let cancel = CancelToken::new();
        cancel.cancel();
        let result = Converter::new(scenario(), ConvertOptions::default())
            .with_cancel(cancel)
            .run(&dir.path().join("c.csv"));
        assert_eq!(result.status, ConversionStatus::Cancelled);
        assert_eq!(result.failed_stage, Some(Stage::Discovery));
    }
}

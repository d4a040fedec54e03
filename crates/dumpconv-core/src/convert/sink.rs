//! Tabular sinks. `CsvSink` writes RFC 4180 CSV through the csv crate.

use std::fs::File;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use csv::WriterBuilder;

use super::batch::RowBatch;
use super::schema::Schema;

#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    #[error("csv encoding failed: {0}")]
    Csv(#[from] csv::Error),
    #[error("write to {path} failed: {source}")]
    Io {
        path: String,
        #[source]
        source: io::Error,
    },
    #[error("row has {got} values, header has {expected}")]
    Width { expected: usize, got: usize },
    #[error("sink already closed")]
    Closed,
}

/// Destination for converted rows: header once, then batches in order.
pub trait TabularSink {
    fn write_header(&mut self, schema: &Schema) -> Result<(), SinkError>;
    fn write_batch(&mut self, batch: &RowBatch) -> Result<(), SinkError>;
    /// Flush and make the written data durable.
    fn close(&mut self) -> Result<(), SinkError>;
}

/// CSV file sink. Each batch is encoded in memory and handed to the file with
/// a single `write_all`.
pub struct CsvSink {
    file: Option<File>,
    path: PathBuf,
    width: usize,
}

impl CsvSink {
    /// Create (or truncate) `path`, creating the parent directory if needed.
    pub fn create(path: &Path) -> Result<Self, SinkError> {
        let io_err = |source| SinkError::Io {
            path: path.display().to_string(),
            source,
        };
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(io_err)?;
            }
        }
        let file = File::create(path).map_err(io_err)?;
        Ok(Self {
            file: Some(file),
            path: path.to_path_buf(),
            width: 0,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_err(&self, source: io::Error) -> SinkError {
        SinkError::Io {
            path: self.path.display().to_string(),
            source,
        }
    }

    fn write_rows<'a, I>(&mut self, rows: I) -> Result<(), SinkError>
    where
        I: IntoIterator<Item = &'a [String]>,
    {
        let mut encoder = WriterBuilder::new().from_writer(Vec::with_capacity(64 * 1024));
        for row in rows {
            if row.len() != self.width {
                return Err(SinkError::Width {
                    expected: self.width,
                    got: row.len(),
                });
            }
            encoder.write_record(row)?;
        }
        let bytes = encoder
            .into_inner()
            .map_err(|e| self.io_err(io::Error::new(e.error().kind(), e.error().to_string())))?;
        let file = self.file.as_mut().ok_or(SinkError::Closed)?;
        if let Err(e) = file.write_all(&bytes) {
            return Err(self.io_err(e));
        }
        Ok(())
    }
}

impl TabularSink for CsvSink {
    fn write_header(&mut self, schema: &Schema) -> Result<(), SinkError> {
        self.width = schema.len();
        if schema.is_empty() {
            return Ok(());
        }
        self.write_rows(std::iter::once(schema.fields()))
    }

    fn write_batch(&mut self, batch: &RowBatch) -> Result<(), SinkError> {
        // A zero-column table has no CSV representation for its rows.
        if self.width == 0 {
            return Ok(());
        }
        self.write_rows(batch.rows().iter().map(Vec::as_slice))
    }

    fn close(&mut self) -> Result<(), SinkError> {
        let Some(mut file) = self.file.take() else {
            return Ok(());
        };
        file.flush().map_err(|e| self.io_err(e))?;
        file.sync_all().map_err(|e| self.io_err(e))?;
        Ok(())
    }
}

//! Record sources: decompression plus structural parsing.
//!
//! The converter reads its input twice, so a source is something that can be
//! reopened: `RecordSource::open` returns a fresh forward-only record stream
//! each time.

mod gzip;
mod record;
mod xml;

use std::io::BufRead;
use std::path::{Path, PathBuf};

pub use gzip::{decompress_to_file, open_decompressed, DecompressStatus};
pub use record::{FieldValue, Record};
pub use xml::{sanitize_text, RecordError, XmlRecords};

/// Failure to open a source for a pass.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("cannot open {}: {source}", path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// A reopenable stream of records.
pub trait RecordSource {
    type Records: Iterator<Item = Result<Record, RecordError>>;

    /// Start a new pass from the beginning of the source.
    fn open(&self) -> Result<Self::Records, SourceError>;

    /// Human-readable name for logs.
    fn describe(&self) -> String;
}

/// An XML dump on disk, optionally gzip-compressed.
#[derive(Debug, Clone)]
pub struct XmlDumpSource {
    path: PathBuf,
    record_tag: Option<String>,
}

impl XmlDumpSource {
    /// `record_tag` selects the record elements (`release`, `artist`, ...);
    /// None treats every child of the root element as a record.
    pub fn new(path: impl Into<PathBuf>, record_tag: Option<&str>) -> Self {
        Self {
            path: path.into(),
            record_tag: record_tag.map(str::to_string),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn record_tag(&self) -> Option<&str> {
        self.record_tag.as_deref()
    }
}

impl RecordSource for XmlDumpSource {
    type Records = XmlRecords<Box<dyn BufRead + Send>>;

    fn open(&self) -> Result<Self::Records, SourceError> {
        let reader = open_decompressed(&self.path)?;
        Ok(XmlRecords::new(reader, self.record_tag.as_deref()))
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn xml_dump_source_reopens_from_start() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("artists.xml");
        std::fs::write(&path, "<artists><artist><name>A</name></artist><artist><name>B</name></artist></artists>").unwrap();
        let source = XmlDumpSource::new(&path, Some("artist"));
        let first: Vec<_> = source.open().unwrap().map(Result::unwrap).collect();
        let second: Vec<_> = source.open().unwrap().map(Result::unwrap).collect();
        assert_eq!(first.len(), 2);
        assert_eq!(first, second);
    }
}

//! Schema discovery: pass 1 over the record stream.

use std::collections::HashMap;

use crate::control::CancelToken;
use crate::source::{Record, RecordError};

use super::ConvertError;

/// Cancellation is polled every this many records during discovery.
const CANCEL_CHECK_EVERY: u64 = 1024;

/// Ordered distinct field names in first-seen order. Defines column order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Schema {
    fields: Vec<String>,
    index: HashMap<String, usize>,
}

impl Schema {
    /// Build a schema from explicit column names. Duplicates are dropped.
    pub fn from_fields<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut schema = Schema::default();
        for f in fields {
            schema.observe_key(f.into());
        }
        schema
    }

    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn position(&self, field: &str) -> Option<usize> {
        self.index.get(field).copied()
    }

    fn observe_key(&mut self, key: String) {
        if !self.index.contains_key(&key) {
            self.index.insert(key.clone(), self.fields.len());
            self.fields.push(key);
        }
    }

    fn observe(&mut self, record: &Record) {
        for key in record.keys() {
            if !self.index.contains_key(key) {
                self.observe_key(key.to_string());
            }
        }
    }

    /// Project `record` onto this schema: one cell per column, absent fields
    /// as `""`. Returns the row and the number of fields the schema does not
    /// know about (those are dropped).
    pub fn project(&self, record: &Record) -> (Vec<String>, usize) {
        let mut row = vec![String::new(); self.fields.len()];
        let mut unknown = 0;
        for (key, value) in record.fields() {
            match self.index.get(key) {
                Some(&i) => row[i] = value.render(),
                None => unknown += 1,
            }
        }
        (row, unknown)
    }
}

/// Outcome of the discovery pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Discovery {
    pub schema: Schema,
    /// Well-formed records seen.
    pub records: u64,
    /// Records skipped as malformed.
    pub malformed: u64,
}

/// Consume `records` once and accumulate the union of field names.
///
/// Holds one record at a time; memory is bounded by the number of distinct
/// fields. Malformed records are skipped and counted. A fatal read error
/// aborts the pass.
pub fn discover_schema<I>(records: I, cancel: &CancelToken) -> Result<Discovery, ConvertError>
where
    I: Iterator<Item = Result<Record, RecordError>>,
{
    let mut schema = Schema::default();
    let mut seen = 0u64;
    let mut malformed = 0u64;

    for item in records {
        if (seen + malformed) % CANCEL_CHECK_EVERY == 0 {
            cancel.check().map_err(|_| ConvertError::Cancelled)?;
        }
        match item {
            Ok(record) => {
                schema.observe(&record);
                seen += 1;
            }
            Err(e) if !e.is_fatal() => {
                tracing::warn!(error = %e, "skipping malformed record");
                malformed += 1;
            }
            Err(e) => return Err(ConvertError::Read(e)),
        }
    }
    cancel.check().map_err(|_| ConvertError::Cancelled)?;

    tracing::debug!(columns = schema.len(), records = seen, malformed, "schema discovered");
    Ok(Discovery {
        schema,
        records: seen,
        malformed,
    })
}

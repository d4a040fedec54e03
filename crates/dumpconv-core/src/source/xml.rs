//! Streaming record parser over a quick-xml event stream.
//!
//! A record is either every element named `record_tag` (at any depth, so dumps
//! without a single root element work too) or, without a tag, every child of
//! the document root. Inside a record, element text and attributes become
//! fields keyed by their path below the record joined with `_`:
//!
//! ```text
//! <release id="7">               id            = 7
//!   <title>Stockholm</title>     title         = Stockholm
//!   <genres>
//!     <genre>House</genre>       genres_genre  = ["House","Techno"]
//!     <genre>Techno</genre>
//!   </genres>
//!   <image type="primary"/>      image_type    = primary
//! </release>
//! ```
//!
//! An element's text is collected up to its end tag, so text split by
//! comments or CDATA sections is one value. Attributes and child elements
//! share one key space: `<release id="1"><id>2</id>` yields `id = ["1","2"]`
//! (attribute first), the same as a repeated child element.

use std::borrow::Cow;
use std::io::BufRead;

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use super::record::Record;

/// Error yielded by the record stream.
#[derive(Debug, thiserror::Error)]
pub enum RecordError {
    /// The record is skipped; the stream continues.
    #[error("malformed record #{index}: {message}")]
    Malformed { index: u64, message: String },
    /// The document is not well-formed; the stream ends.
    #[error("XML error at byte {position}: {message}")]
    Syntax { position: u64, message: String },
    #[error("read failed: {0}")]
    Io(#[source] std::io::Error),
}

impl RecordError {
    /// Fatal errors end the stream; malformed records do not.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, RecordError::Malformed { .. })
    }
}

/// Lazy, forward-only iterator of records from an XML reader.
pub struct XmlRecords<R: BufRead> {
    reader: Reader<R>,
    buf: Vec<u8>,
    record_tag: Option<Vec<u8>>,
    /// Element depth relative to the document (root element = 1).
    depth: usize,
    /// Records started so far, used to number malformed ones.
    seen: u64,
    done: bool,
}

/// Per-record parse state.
struct Builder {
    record: Record,
    /// Record element name, used for text directly inside the record.
    name: String,
    /// Path of element names below the record element.
    path: Vec<String>,
    /// Text collected per open element; `texts[0]` is the record element.
    texts: Vec<String>,
    /// First problem found; the record is still consumed to its end tag.
    problem: Option<String>,
}

impl Builder {
    fn key(&self, leaf: Option<&str>) -> String {
        let mut parts: Vec<&str> = self.path.iter().map(String::as_str).collect();
        if let Some(leaf) = leaf {
            parts.push(leaf);
        }
        if parts.is_empty() {
            self.name.clone()
        } else {
            parts.join("_")
        }
    }

    fn attributes(&mut self, e: &BytesStart<'_>) {
        for attr in e.attributes() {
            let attr = match attr {
                Ok(a) => a,
                Err(err) => {
                    self.problem.get_or_insert_with(|| format!("bad attribute: {}", err));
                    continue;
                }
            };
            let name = match std::str::from_utf8(attr.key.as_ref()) {
                Ok(n) => n.to_string(),
                Err(_) => {
                    self.problem.get_or_insert_with(|| "attribute name is not UTF-8".into());
                    continue;
                }
            };
            let value = match attr.unescape_value() {
                Ok(v) => v.into_owned(),
                Err(_) => String::from_utf8_lossy(&attr.value).into_owned(),
            };
            let key = self.key(Some(&name));
            self.record.insert(key, sanitize_text(&value));
        }
    }

    fn open(&mut self, name: String) {
        self.path.push(name);
        self.texts.push(String::new());
    }

    fn append_text(&mut self, value: &str) {
        if let Some(buf) = self.texts.last_mut() {
            buf.push_str(value);
        }
    }

    /// Emit the innermost element's text as one value and close it. Returns
    /// false when the element closed was the record itself.
    fn close(&mut self) -> bool {
        let text = self.texts.pop().unwrap_or_default();
        let value = text.trim();
        if !value.is_empty() {
            let key = self.key(None);
            self.record.insert(key, sanitize_text(value));
        }
        self.path.pop().is_some()
    }
}

impl<R: BufRead> XmlRecords<R> {
    /// Records are the elements named `record_tag`, or the root's children
    /// when `record_tag` is None.
    pub fn new(reader: R, record_tag: Option<&str>) -> Self {
        let mut reader = Reader::from_reader(reader);
        reader.config_mut().trim_text(true);
        Self {
            reader,
            buf: Vec::with_capacity(8 * 1024),
            record_tag: record_tag.map(|t| t.as_bytes().to_vec()),
            depth: 0,
            seen: 0,
            done: false,
        }
    }

    fn syntax_error(&mut self, err: quick_xml::Error) -> RecordError {
        self.done = true;
        match err {
            quick_xml::Error::Io(io) => RecordError::Io(std::io::Error::new(io.kind(), io.to_string())),
            other => RecordError::Syntax {
                position: self.reader.error_position(),
                message: other.to_string(),
            },
        }
    }

    /// Read events until the current record's end tag. `builder` already holds
    /// the record element's own attributes.
    fn read_record(&mut self, mut builder: Builder) -> Result<Record, RecordError> {
        loop {
            self.buf.clear();
            let event = match self.reader.read_event_into(&mut self.buf) {
                Ok(ev) => ev,
                Err(e) => return Err(self.syntax_error(e)),
            };
            match event {
                Event::Start(e) => {
                    let name = element_name(&e, &mut builder.problem);
                    builder.open(name);
                    builder.attributes(&e);
                }
                Event::Empty(e) => {
                    let name = element_name(&e, &mut builder.problem);
                    builder.open(name);
                    builder.attributes(&e);
                    builder.close();
                }
                Event::Text(t) => {
                    let text = match t.unescape() {
                        Ok(s) => s,
                        Err(_) => Cow::Owned(String::from_utf8_lossy(&t).into_owned()),
                    };
                    builder.append_text(&text);
                }
                Event::CData(c) => {
                    let raw = c.into_inner();
                    match std::str::from_utf8(&raw) {
                        Ok(s) => builder.append_text(s),
                        Err(_) => {
                            builder
                                .problem
                                .get_or_insert_with(|| "CDATA is not UTF-8".into());
                        }
                    }
                }
                Event::End(_) => {
                    if !builder.close() {
                        break;
                    }
                }
                Event::Eof => {
                    self.done = true;
                    return Err(RecordError::Syntax {
                        position: self.reader.buffer_position(),
                        message: format!("unexpected end of input inside <{}>", builder.name),
                    });
                }
                _ => {}
            }
        }
        self.depth = self.depth.saturating_sub(1);

        match builder.problem {
            Some(message) => Err(RecordError::Malformed {
                index: self.seen,
                message,
            }),
            None => Ok(builder.record),
        }
    }
}

impl<R: BufRead> Iterator for XmlRecords<R> {
    type Item = Result<Record, RecordError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        loop {
            self.buf.clear();
            let event = match self.reader.read_event_into(&mut self.buf) {
                Ok(ev) => ev,
                Err(e) => return Some(Err(self.syntax_error(e))),
            };
            match event {
                Event::Start(e) => {
                    self.depth += 1;
                    if is_record_start(self.record_tag.as_deref(), self.depth, e.name().as_ref()) {
                        let mut builder = start_builder(&e);
                        builder.attributes(&e);
                        self.seen += 1;
                        return Some(self.read_record(builder));
                    }
                }
                Event::Empty(e) => {
                    if is_record_start(self.record_tag.as_deref(), self.depth + 1, e.name().as_ref()) {
                        let mut builder = start_builder(&e);
                        builder.attributes(&e);
                        self.seen += 1;
                        return Some(match builder.problem {
                            Some(message) => Err(RecordError::Malformed {
                                index: self.seen,
                                message,
                            }),
                            None => Ok(builder.record),
                        });
                    }
                }
                Event::End(_) => {
                    self.depth = self.depth.saturating_sub(1);
                }
                Event::Eof => {
                    self.done = true;
                    return None;
                }
                _ => {}
            }
        }
    }
}

/// `depth` is the element's own depth (root element = 1).
fn is_record_start(record_tag: Option<&[u8]>, depth: usize, name: &[u8]) -> bool {
    match record_tag {
        Some(tag) => tag == name,
        None => depth == 2,
    }
}

fn start_builder(e: &BytesStart<'_>) -> Builder {
    let mut problem = None;
    let name = element_name(e, &mut problem);
    Builder {
        record: Record::new(),
        name,
        path: Vec::new(),
        texts: vec![String::new()],
        problem,
    }
}

fn element_name(e: &BytesStart<'_>, problem: &mut Option<String>) -> String {
    match std::str::from_utf8(e.local_name().as_ref()) {
        Ok(n) => n.to_string(),
        Err(_) => {
            problem.get_or_insert_with(|| "element name is not UTF-8".into());
            String::from_utf8_lossy(e.local_name().as_ref()).into_owned()
        }
    }
}

/// Drop characters that are not allowed in XML 1.0 text (control characters
/// other than tab, newline and carriage return).
pub fn sanitize_text(s: &str) -> String {
    if !s.chars().any(is_forbidden) {
        return s.to_string();
    }
    s.chars().filter(|c| !is_forbidden(*c)).collect()
}

fn is_forbidden(c: char) -> bool {
    matches!(c, '\u{0}'..='\u{8}' | '\u{b}' | '\u{c}' | '\u{e}'..='\u{1f}' | '\u{fffe}' | '\u{ffff}')
}

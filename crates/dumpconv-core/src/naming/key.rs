//! Dump object keys: `data/2024/discogs_20240101_releases.xml.gz`.

use std::fmt;

/// Content type of a published dump file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DumpKind {
    Artists,
    Labels,
    Masters,
    Releases,
    Checksum,
    Unknown,
}

impl DumpKind {
    /// Classify by substring of the (lowercased) key. Checksum files mention
    /// no content type, so they are tested first.
    pub fn from_key(key: &str) -> Self {
        let lower = key.to_ascii_lowercase();
        if lower.contains("checksum") {
            DumpKind::Checksum
        } else if lower.contains("artist") {
            DumpKind::Artists
        } else if lower.contains("master") {
            DumpKind::Masters
        } else if lower.contains("label") {
            DumpKind::Labels
        } else if lower.contains("release") {
            DumpKind::Releases
        } else {
            DumpKind::Unknown
        }
    }

    /// Element name of one record in dumps of this kind.
    pub fn record_tag(&self) -> Option<&'static str> {
        match self {
            DumpKind::Artists => Some("artist"),
            DumpKind::Labels => Some("label"),
            DumpKind::Masters => Some("master"),
            DumpKind::Releases => Some("release"),
            DumpKind::Checksum | DumpKind::Unknown => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DumpKind::Artists => "artists",
            DumpKind::Labels => "labels",
            DumpKind::Masters => "masters",
            DumpKind::Releases => "releases",
            DumpKind::Checksum => "checksum",
            DumpKind::Unknown => "unknown",
        }
    }
}

impl fmt::Display for DumpKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Date and kind parsed from a dump key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DumpKey {
    /// (year, month, day) from the `discogs_YYYYMMDD_` stamp.
    pub date: (u16, u8, u8),
    pub kind: DumpKind,
}

impl DumpKey {
    /// Parse a key or file name containing `discogs_YYYYMMDD_`. Returns None
    /// when there is no valid date stamp.
    pub fn parse(key: &str) -> Option<Self> {
        let date = find_date_stamp(key)?;
        Some(Self {
            date,
            kind: DumpKind::from_key(key),
        })
    }

    /// `YYYY-MM`, the per-month folder dumps are filed under.
    pub fn month_folder(&self) -> String {
        format!("{:04}-{:02}", self.date.0, self.date.1)
    }
}

fn find_date_stamp(key: &str) -> Option<(u16, u8, u8)> {
    const PREFIX: &str = "discogs_";
    let mut rest = key;
    while let Some(pos) = rest.find(PREFIX) {
        let after = &rest[pos + PREFIX.len()..];
        if let Some(date) = parse_stamp(after) {
            return Some(date);
        }
        rest = after;
    }
    None
}

/// `YYYYMMDD_` at the start of `s`.
fn parse_stamp(s: &str) -> Option<(u16, u8, u8)> {
    let digits = s.get(..8)?;
    if !digits.bytes().all(|b| b.is_ascii_digit()) || s.as_bytes().get(8) != Some(&b'_') {
        return None;
    }
    let year: u16 = digits[..4].parse().ok()?;
    let month: u8 = digits[4..6].parse().ok()?;
    let day: u8 = digits[6..8].parse().ok()?;
    if !(1..=12).contains(&month) || !(1..=31).contains(&day) {
        return None;
    }
    Some((year, month, day))
}

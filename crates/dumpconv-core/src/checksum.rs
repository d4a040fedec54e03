//! SHA-256 verification of downloaded dumps against the publisher's
//! `CHECKSUM.txt` (`<hex digest>  <file name>` per line).
//!
//! Computed on demand after a download, never inline with the transfer.

use anyhow::{Context, Result};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;

const BUF_SIZE: usize = 64 * 1024;

/// Compute SHA-256 of a file and return the digest as lowercase hex.
pub fn sha256_path(path: &Path) -> Result<String> {
    let mut f = File::open(path).with_context(|| format!("open {}", path.display()))?;
    let mut hasher = Sha256::new();
    let mut buf = vec![0u8; BUF_SIZE];
    loop {
        let n = f
            .read(&mut buf)
            .with_context(|| format!("read {}", path.display()))?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hex::encode(hasher.finalize()))
}

/// File name → expected lowercase hex digest.
pub type ChecksumList = HashMap<String, String>;

/// Parse checksum list text. Lines that are blank or do not start with a
/// 64-character hex digest are ignored. A leading `*` (binary mode marker)
/// on the name is dropped.
pub fn parse_checksum_list(text: &str) -> ChecksumList {
    let mut out = ChecksumList::new();
    for line in text.lines() {
        let line = line.trim();
        let Some((digest, name)) = line.split_once(char::is_whitespace) else {
            continue;
        };
        if digest.len() != 64 || !digest.bytes().all(|b| b.is_ascii_hexdigit()) {
            continue;
        }
        let name = name.trim().trim_start_matches('*');
        if name.is_empty() {
            continue;
        }
        out.insert(name.to_string(), digest.to_ascii_lowercase());
    }
    out
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verification {
    Verified,
    Mismatch { expected: String, actual: String },
    /// The file's name does not appear in the list.
    NotListed,
}

/// Hash `path` and compare it with the entry for its file name in `list`.
pub fn verify_file(path: &Path, list: &ChecksumList) -> Result<Verification> {
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .with_context(|| format!("no file name in {}", path.display()))?;
    let Some(expected) = list.get(name) else {
        return Ok(Verification::NotListed);
    };
    let actual = sha256_path(path)?;
    tracing::debug!(file = name, %actual, "checksum computed");
    if actual == *expected {
        Ok(Verification::Verified)
    } else {
        Ok(Verification::Mismatch {
            expected: expected.clone(),
            actual,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const HELLO_SHA: &str = "5891b5b522d5df086d0ff0b110fbd9d21bb4fc7163af34d08286a2e846f6be03";

    #[test]
    fn sha256_path_empty_file() {
        let f = tempfile::NamedTempFile::new().unwrap();
        assert_eq!(
            sha256_path(f.path()).unwrap(),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn sha256_path_known_content() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(b"hello\n").unwrap();
        f.flush().unwrap();
        assert_eq!(sha256_path(f.path()).unwrap(), HELLO_SHA);
    }

    #[test]
    fn parse_list_skips_noise() {
        let text = format!(
            "{}  discogs_20240101_artists.xml.gz\n\nnot a checksum line\n{} *discogs_20240101_labels.xml.gz\n",
            HELLO_SHA,
            HELLO_SHA.to_uppercase()
        );
        let list = parse_checksum_list(&text);
        assert_eq!(list.len(), 2);
        assert_eq!(list["discogs_20240101_artists.xml.gz"], HELLO_SHA);
        assert_eq!(list["discogs_20240101_labels.xml.gz"], HELLO_SHA);
    }

    #[test]
    fn verify_outcomes() {
        let dir = tempfile::tempdir().unwrap();
        let good = dir.path().join("good.xml.gz");
        let bad = dir.path().join("bad.xml.gz");
        let other = dir.path().join("other.xml.gz");
        for p in [&good, &bad, &other] {
            std::fs::write(p, b"hello\n").unwrap();
        }
        let zeros = "0".repeat(64);
        let list = parse_checksum_list(&format!(
            "{HELLO_SHA}  good.xml.gz\n{zeros}  bad.xml.gz\n"
        ));

        assert_eq!(verify_file(&good, &list).unwrap(), Verification::Verified);
        assert_eq!(
            verify_file(&bad, &list).unwrap(),
            Verification::Mismatch {
                expected: zeros.clone(),
                actual: HELLO_SHA.to_string()
            }
        );
        assert_eq!(verify_file(&other, &list).unwrap(), Verification::NotListed);
    }
}

#![allow(dead_code)]

pub mod range_server;

use std::io::Write;
use std::path::Path;

/// Deterministic, non-repeating-at-segment-boundaries payload.
pub fn payload(len: usize) -> Vec<u8> {
    (0..len).map(|i| ((i * 31 + i / 251) % 256) as u8).collect()
}

/// Write `xml` to `path`, gzip-compressed.
pub fn write_gz(path: &Path, xml: &str) {
    let file = std::fs::File::create(path).unwrap();
    let mut enc = flate2::write::GzEncoder::new(file, flate2::Compression::default());
    enc.write_all(xml.as_bytes()).unwrap();
    enc.finish().unwrap();
}

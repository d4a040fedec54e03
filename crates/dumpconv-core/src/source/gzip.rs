//! Decompression stage: transparent gzip reading and gzip-to-file extraction.

use std::fs::File;
use std::io::{self, BufRead, BufReader, Read, Write};
use std::path::Path;

use anyhow::Context;
use flate2::read::GzDecoder;

use crate::control::CancelToken;
use crate::progress::ProgressAggregator;
use crate::storage;

use super::SourceError;

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];
const BUF_SIZE: usize = 1 << 20;

/// Open `path` for reading, decompressing on the fly when it starts with the
/// gzip magic bytes. Plain files are returned buffered as-is.
pub fn open_decompressed(path: &Path) -> Result<Box<dyn BufRead + Send>, SourceError> {
    let file = File::open(path).map_err(|source| SourceError::Open {
        path: path.to_path_buf(),
        source,
    })?;
    let mut reader = BufReader::with_capacity(BUF_SIZE, file);
    let head = reader.fill_buf().map_err(|source| SourceError::Open {
        path: path.to_path_buf(),
        source,
    })?;
    if head.starts_with(&GZIP_MAGIC) {
        tracing::debug!(path = %path.display(), "gzip source detected");
        Ok(Box::new(BufReader::with_capacity(
            BUF_SIZE,
            GzDecoder::new(reader),
        )))
    } else {
        Ok(Box::new(reader))
    }
}

/// Counts bytes read from the inner reader into a progress aggregator.
struct CountingReader<'a, R> {
    inner: R,
    progress: &'a ProgressAggregator,
}

impl<R: Read> Read for CountingReader<'_, R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.progress.add(n as u64);
        Ok(n)
    }
}

/// Copy until EOF. Returns None if `cancel` fired first.
fn copy_until_cancelled<R: Read, W: Write>(
    reader: &mut R,
    writer: &mut W,
    cancel: &CancelToken,
) -> io::Result<Option<u64>> {
    let mut buf = vec![0u8; BUF_SIZE];
    let mut total = 0u64;
    loop {
        if cancel.is_cancelled() {
            return Ok(None);
        }
        let n = reader.read(&mut buf)?;
        if n == 0 {
            return Ok(Some(total));
        }
        writer.write_all(&buf[..n])?;
        total += n as u64;
    }
}

/// Outcome of `decompress_to_file`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecompressStatus {
    Complete { bytes_out: u64 },
    Cancelled,
}

/// Decompress the gzip file `src` into `dest` through `<dest>.part`.
///
/// `progress` counts compressed bytes consumed, so its expected total is the
/// size of `src`. On cancel the temp file is removed.
pub fn decompress_to_file(
    src: &Path,
    dest: &Path,
    progress: &ProgressAggregator,
    cancel: &CancelToken,
) -> anyhow::Result<DecompressStatus> {
    let input = File::open(src).with_context(|| format!("open {}", src.display()))?;
    let compressed_len = input.metadata().map(|m| m.len()).ok();
    progress.set_expected(compressed_len);

    let temp = storage::temp_path(dest);
    let mut out = File::create(&temp).with_context(|| format!("create {}", temp.display()))?;
    let mut decoder = GzDecoder::new(CountingReader {
        inner: BufReader::with_capacity(BUF_SIZE, input),
        progress,
    });

    let copied = copy_until_cancelled(&mut decoder, &mut out, cancel)
        .with_context(|| format!("decompress {} to {}", src.display(), temp.display()));

    match copied {
        Ok(Some(bytes_out)) => {
            out.sync_all().context("sync decompressed file")?;
            drop(out);
            storage::promote(&temp, dest)
                .with_context(|| format!("rename {} to {}", temp.display(), dest.display()))?;
            tracing::info!(src = %src.display(), dest = %dest.display(), bytes_out, "decompressed");
            Ok(DecompressStatus::Complete { bytes_out })
        }
        Ok(None) => {
            drop(out);
            let _ = std::fs::remove_file(&temp);
            tracing::info!(src = %src.display(), "decompression cancelled");
            Ok(DecompressStatus::Cancelled)
        }
        Err(e) => {
            drop(out);
            let _ = std::fs::remove_file(&temp);
            Err(e)
        }
    }
}

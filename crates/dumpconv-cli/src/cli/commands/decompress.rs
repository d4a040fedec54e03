//! `dumpconv decompress <file.gz>`.

use anyhow::{bail, Context, Result};
use dumpconv_core::config::DumpConfig;
use dumpconv_core::control::CancelToken;
use dumpconv_core::progress::ProgressAggregator;
use dumpconv_core::source::{decompress_to_file, DecompressStatus};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crate::cli::progress::{ProgressTicker, Unit};

/// `x.xml.gz` → `x.xml`; anything else gets `.out` appended.
pub(crate) fn default_output(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    match name.strip_suffix(".gz") {
        Some(stem) if !stem.is_empty() => path.with_file_name(stem),
        _ => path.with_file_name(format!("{}.out", name)),
    }
}

pub async fn run_decompress(
    cfg: &DumpConfig,
    path: &Path,
    out: Option<PathBuf>,
    cancel: &CancelToken,
) -> Result<()> {
    let dest = out.unwrap_or_else(|| default_output(path));
    println!("Decompressing {} -> {}", path.display(), dest.display());

    let progress = Arc::new(ProgressAggregator::with_window(Duration::from_secs(
        cfg.progress_window_secs,
    )));
    let ticker = ProgressTicker::spawn(Arc::clone(&progress), Unit::Bytes);
    let status = tokio::task::spawn_blocking({
        let src = path.to_path_buf();
        let dest = dest.clone();
        let progress = Arc::clone(&progress);
        let cancel = cancel.clone();
        move || decompress_to_file(&src, &dest, &progress, &cancel)
    })
    .await
    .context("decompress task join")?;
    ticker.finish().await;

    match status? {
        DecompressStatus::Complete { bytes_out } => {
            println!("Wrote {} bytes to {}", bytes_out, dest.display());
            Ok(())
        }
        DecompressStatus::Cancelled => bail!("decompression cancelled"),
    }
}

//! `dumpconv download <url>` – segmented download with progress.

use anyhow::{bail, Context, Result};
use dumpconv_core::config::DumpConfig;
use dumpconv_core::control::CancelToken;
use dumpconv_core::downloader::{self, DownloadOptions, DownloadResult, DownloadStatus};
use dumpconv_core::naming;
use dumpconv_core::progress::ProgressAggregator;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crate::cli::progress::{ProgressTicker, Unit};
use crate::cli::DownloadArgs;

/// Used when neither `--dir` nor `download_dir` is set.
const DEFAULT_BASE_DIR: &str = "Datasets";

/// Destination for `url`: `--out` as given, else `<base>/<YYYY-MM>/<file>`.
pub(crate) fn destination(url: &str, args: &DownloadArgs, cfg: &DumpConfig) -> PathBuf {
    if let Some(out) = &args.out {
        return out.clone();
    }
    let base = args
        .dir
        .clone()
        .or_else(|| cfg.download_dir.clone())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_BASE_DIR));
    naming::local_path_for(url, &base)
}

/// Download `url` and return the completed result; cancellation and failures
/// are errors.
pub async fn run_download(
    cfg: &DumpConfig,
    url: &str,
    args: &DownloadArgs,
    cancel: &CancelToken,
) -> Result<DownloadResult> {
    let cfg = args.apply(cfg);
    let dest = destination(url, args, &cfg);
    let options = DownloadOptions::from(&cfg);
    let progress = Arc::new(ProgressAggregator::with_window(Duration::from_secs(
        cfg.progress_window_secs,
    )));
    println!("Downloading {} -> {}", url, dest.display());

    let ticker = ProgressTicker::spawn(Arc::clone(&progress), Unit::Bytes);
    let result = tokio::task::spawn_blocking({
        let url = url.to_string();
        let dest = dest.clone();
        let progress = Arc::clone(&progress);
        let cancel = cancel.clone();
        move || downloader::download(&url, &dest, &options, &progress, &cancel)
    })
    .await
    .context("download task join")?;
    ticker.finish().await;

    report(&result, &dest)?;
    Ok(result)
}

fn report(result: &DownloadResult, dest: &Path) -> Result<()> {
    match &result.status {
        DownloadStatus::Complete => {
            let strategy = result
                .strategy
                .map(|s| s.to_string())
                .unwrap_or_default();
            println!(
                "Saved {} ({} bytes, {}, {:.1}s)",
                dest.display(),
                result.bytes,
                strategy,
                result.elapsed.as_secs_f64()
            );
            Ok(())
        }
        DownloadStatus::Cancelled { partial_path } => match partial_path {
            Some(p) => bail!("download cancelled; partial data kept at {}", p.display()),
            None => bail!("download cancelled"),
        },
        DownloadStatus::Failed(failure) => bail!("download failed: {}", failure),
    }
}

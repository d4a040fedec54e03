//! `dumpconv convert <source>` – two-pass XML to CSV conversion.

use anyhow::{bail, Context, Result};
use dumpconv_core::config::DumpConfig;
use dumpconv_core::control::CancelToken;
use dumpconv_core::convert::{ConversionResult, ConversionStatus, ConvertOptions, Converter};
use dumpconv_core::naming;
use dumpconv_core::progress::ProgressAggregator;
use dumpconv_core::source::XmlDumpSource;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crate::cli::progress::{ProgressTicker, Unit};

pub async fn run_convert(
    cfg: &DumpConfig,
    source: &Path,
    out: Option<PathBuf>,
    record_tag: Option<String>,
    batch_size: usize,
    cancel: &CancelToken,
) -> Result<ConversionResult> {
    let dest = out.unwrap_or_else(|| naming::csv_path_for(source));
    let tag = record_tag.or_else(|| naming::record_tag_for_path(source).map(String::from));
    match &tag {
        Some(t) => println!("Converting {} -> {} (record <{}>)", source.display(), dest.display(), t),
        None => println!("Converting {} -> {}", source.display(), dest.display()),
    }

    let progress = Arc::new(ProgressAggregator::with_window(Duration::from_secs(
        cfg.progress_window_secs,
    )));
    let ticker = ProgressTicker::spawn(Arc::clone(&progress), Unit::Rows);
    let result = tokio::task::spawn_blocking({
        let source = XmlDumpSource::new(source, tag.as_deref());
        let dest = dest.clone();
        let progress = Arc::clone(&progress);
        let cancel = cancel.clone();
        move || {
            Converter::new(source, ConvertOptions { batch_size })
                .with_progress(progress)
                .with_cancel(cancel)
                .run(&dest)
        }
    })
    .await
    .context("convert task join")?;
    ticker.finish().await;

    match &result.status {
        ConversionStatus::Complete => {}
        ConversionStatus::Partial { skipped } => {
            println!("Skipped {} malformed record(s)", skipped);
        }
        ConversionStatus::Cancelled => match &result.output_path {
            Some(p) => bail!("conversion cancelled; partial output kept at {}", p.display()),
            None => bail!("conversion cancelled"),
        },
        ConversionStatus::Failed(failure) => bail!("conversion failed: {}", failure),
    }
    println!(
        "Wrote {} rows x {} columns to {} ({:.1}s)",
        result.rows,
        result.columns,
        dest.display(),
        result.elapsed.as_secs_f64()
    );
    Ok(result)
}

//! `dumpconv fetch <url>` – download, then convert when the dump kind has records.

use anyhow::Result;
use dumpconv_core::config::DumpConfig;
use dumpconv_core::control::CancelToken;
use dumpconv_core::naming::{self, DumpKind};

use super::{run_convert, run_download};
use crate::cli::DownloadArgs;

pub async fn run_fetch(
    cfg: &DumpConfig,
    url: &str,
    args: &DownloadArgs,
    batch_size: usize,
    cancel: &CancelToken,
) -> Result<()> {
    let downloaded = run_download(cfg, url, args, cancel).await?;
    let kind = DumpKind::from_key(&naming::derive_filename(url));
    let Some(tag) = kind.record_tag() else {
        tracing::info!(url, kind = %kind, "no records to convert");
        println!("Not a record dump ({}); skipping conversion", kind);
        return Ok(());
    };
    run_convert(
        cfg,
        &downloaded.local_path,
        None,
        Some(tag.to_string()),
        batch_size,
        cancel,
    )
    .await?;
    Ok(())
}

//! CLI for the dumpconv downloader and converter.

mod commands;
mod progress;

use anyhow::Result;
use clap::{Parser, Subcommand};
use dumpconv_core::config::{self, DumpConfig};
use dumpconv_core::control::CancelToken;
use std::path::PathBuf;

use commands::{run_convert, run_decompress, run_download, run_fetch, run_ls, run_verify};

/// Top-level CLI for dumpconv.
#[derive(Debug, Parser)]
#[command(name = "dumpconv")]
#[command(about = "Segmented dump downloader and streaming XML to CSV converter", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: CliCommand,
}

/// Flags shared by commands that download.
#[derive(Debug, Clone, Default, clap::Args)]
pub struct DownloadArgs {
    /// Write to this exact path.
    #[arg(long, short = 'o', value_name = "PATH", conflicts_with = "dir")]
    pub out: Option<PathBuf>,
    /// Base directory; files land in `<DIR>/<YYYY-MM>/` (default: config `download_dir` or `Datasets`).
    #[arg(long, value_name = "DIR")]
    pub dir: Option<PathBuf>,
    /// Parallel byte-range segments (overrides config).
    #[arg(long, value_name = "N")]
    pub segments: Option<usize>,
    /// Retries per segment after the first attempt (overrides config).
    #[arg(long, value_name = "N")]
    pub retries: Option<u32>,
}

impl DownloadArgs {
    /// Config with per-invocation overrides applied.
    pub fn apply(&self, cfg: &DumpConfig) -> DumpConfig {
        let mut cfg = cfg.clone();
        if let Some(n) = self.segments {
            cfg.segment_count = n.max(1);
        }
        if let Some(n) = self.retries {
            let mut retry = cfg.retry_config();
            retry.max_retries = n;
            cfg.retry = Some(retry);
        }
        cfg
    }
}

#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// Download a dump file with parallel range requests.
    Download {
        /// Direct HTTP/HTTPS URL to download.
        url: String,
        #[command(flatten)]
        args: DownloadArgs,
    },

    /// Convert an XML dump (plain or .gz) to CSV.
    Convert {
        /// Path to the XML or XML.gz file.
        source: PathBuf,
        /// Output CSV path (default: next to the source, `.csv`).
        #[arg(long, short = 'o', value_name = "PATH")]
        out: Option<PathBuf>,
        /// Element that makes one record (default: inferred from the file name,
        /// else children of the root).
        #[arg(long, value_name = "TAG")]
        record_tag: Option<String>,
        /// Rows per write batch (overrides config).
        #[arg(long, value_name = "N")]
        batch_size: Option<usize>,
    },

    /// Download a dump, then convert it to CSV.
    Fetch {
        url: String,
        #[command(flatten)]
        args: DownloadArgs,
        /// Rows per write batch (overrides config).
        #[arg(long, value_name = "N")]
        batch_size: Option<usize>,
    },

    /// Decompress a .gz file to disk.
    Decompress {
        path: PathBuf,
        /// Output path (default: the input without `.gz`).
        #[arg(long, short = 'o', value_name = "PATH")]
        out: Option<PathBuf>,
    },

    /// List dumps in the bucket.
    Ls {
        /// Key prefix, e.g. `data/2024/`.
        #[arg(default_value = "data/")]
        prefix: String,
        #[arg(long, value_name = "URL", default_value = dumpconv_core::listing::DEFAULT_BASE_URL)]
        base_url: String,
    },

    /// Verify a file against a CHECKSUM.txt list.
    Verify {
        path: PathBuf,
        #[arg(long, value_name = "FILE")]
        checksums: PathBuf,
    },
}

impl CliCommand {
    pub async fn run_from_args() -> Result<()> {
        let cli = Cli::parse();
        let cfg = config::load_or_init()?;
        tracing::debug!("loaded config: {:?}", cfg);
        let cancel = cancel_on_ctrl_c();

        match cli.command {
            CliCommand::Download { url, args } => {
                run_download(&cfg, &url, &args, &cancel).await?;
            }
            CliCommand::Convert {
                source,
                out,
                record_tag,
                batch_size,
            } => {
                let batch_size = batch_size.unwrap_or(cfg.batch_size);
                run_convert(&cfg, &source, out, record_tag, batch_size, &cancel).await?;
            }
            CliCommand::Fetch {
                url,
                args,
                batch_size,
            } => {
                let batch_size = batch_size.unwrap_or(cfg.batch_size);
                run_fetch(&cfg, &url, &args, batch_size, &cancel).await?;
            }
            CliCommand::Decompress { path, out } => {
                run_decompress(&cfg, &path, out, &cancel).await?;
            }
            CliCommand::Ls { prefix, base_url } => run_ls(&cfg, &base_url, &prefix).await?,
            CliCommand::Verify { path, checksums } => run_verify(&path, &checksums).await?,
        }

        Ok(())
    }
}

/// Token cancelled on the first Ctrl-C.
fn cancel_on_ctrl_c() -> CancelToken {
    let cancel = CancelToken::new();
    let token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("\ninterrupted, stopping...");
            tracing::info!("ctrl-c received, cancelling");
            token.cancel();
        }
    });
    cancel
}

#[cfg(test)]
mod tests;

//! `dumpconv verify <file> --checksums CHECKSUM.txt`.

use anyhow::{bail, Context, Result};
use dumpconv_core::checksum::{self, Verification};
use std::path::Path;

pub async fn run_verify(path: &Path, checksums: &Path) -> Result<()> {
    let text = std::fs::read_to_string(checksums)
        .with_context(|| format!("read checksum list {}", checksums.display()))?;
    let list = checksum::parse_checksum_list(&text);
    let verification = tokio::task::spawn_blocking({
        let path = path.to_path_buf();
        move || checksum::verify_file(&path, &list)
    })
    .await
    .context("verify task join")??;

    match verification {
        Verification::Verified => {
            println!("OK  {}", path.display());
            Ok(())
        }
        Verification::Mismatch { expected, actual } => {
            bail!("{}: checksum mismatch (expected {}, got {})", path.display(), expected, actual)
        }
        Verification::NotListed => {
            bail!("{} is not listed in {}", path.display(), checksums.display())
        }
    }
}

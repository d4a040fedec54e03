//! `dumpconv ls [prefix]` – list dumps in the bucket.

use anyhow::{Context, Result};
use dumpconv_core::config::DumpConfig;
use dumpconv_core::fetch_head::NetOptions;
use dumpconv_core::listing::{self, human_size, Listing};

fn print_listing(listing: &Listing) {
    for dir in &listing.directories {
        println!("  {:>8}  {}", "DIR", dir);
    }
    for obj in &listing.objects {
        println!(
            "  {:>8}  {:<10}  {}  {}",
            human_size(obj.size),
            obj.kind.as_str(),
            obj.last_modified,
            obj.key
        );
    }
    if listing.truncated {
        println!("  (listing truncated)");
    }
}

pub async fn run_ls(cfg: &DumpConfig, base_url: &str, prefix: &str) -> Result<()> {
    let net = NetOptions::from(cfg);
    let listing = tokio::task::spawn_blocking({
        let base_url = base_url.to_string();
        let prefix = prefix.to_string();
        move || listing::fetch_listing(&base_url, &prefix, Some("/"), &net)
    })
    .await
    .context("listing task join")?
    .with_context(|| format!("list {}{}", base_url, prefix))?;

    if listing.directories.is_empty() && listing.objects.is_empty() {
        println!("Nothing under {}", prefix);
        return Ok(());
    }
    print_listing(&listing);
    Ok(())
}

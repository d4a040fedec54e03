//! Destination file lifecycle.
//!
//! Downloads and conversions write into `<dest>.part`, then rename onto the
//! destination once the content is complete, so a partial file never sits at
//! the final path. Segmented downloads preallocate the temp file and write
//! each segment at its own offset with `pwrite`.

mod builder;
mod writer;

use std::path::{Path, PathBuf};

pub use builder::StorageWriterBuilder;
pub use writer::StorageWriter;

/// Temporary file suffix used before the final rename.
pub const TEMP_SUFFIX: &str = ".part";

/// Path for the temp file: appends `.part` to the final path
/// (`releases.xml.gz` → `releases.xml.gz.part`).
pub fn temp_path(final_path: &Path) -> PathBuf {
    let mut o = final_path.as_os_str().to_owned();
    o.push(TEMP_SUFFIX);
    PathBuf::from(o)
}

/// Rename `temp` onto `final_path`, creating the parent directory if needed.
pub fn promote(temp: &Path, final_path: &Path) -> std::io::Result<()> {
    if let Some(parent) = final_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    std::fs::rename(temp, final_path)
}

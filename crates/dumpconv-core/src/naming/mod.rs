//! Local naming and placement of dump files.
//!
//! Dumps are published as `data/<year>/discogs_<YYYYMMDD>_<kind>.xml.gz`.
//! Locally they are filed under a per-month folder (`2024-01/`), and the dump
//! kind decides which XML element is one record.

mod key;
mod path;
mod sanitize;

use std::path::{Path, PathBuf};

pub use key::{DumpKey, DumpKind};
pub use path::filename_from_url_path;
pub use sanitize::sanitize_filename;

/// Fallback when a URL yields no usable file name.
const DEFAULT_FILENAME: &str = "download.bin";

/// Safe local file name for `url`.
pub fn derive_filename(url: &str) -> String {
    let sanitized = filename_from_url_path(url)
        .map(|raw| sanitize_filename(&raw))
        .unwrap_or_default();
    if sanitized.is_empty() {
        DEFAULT_FILENAME.to_string()
    } else {
        sanitized
    }
}

/// Where a download of `url` lands under `base_dir`: `base/<YYYY-MM>/<file>`
/// for dated dump keys, `base/<file>` otherwise.
pub fn local_path_for(url: &str, base_dir: &Path) -> PathBuf {
    let file = derive_filename(url);
    match DumpKey::parse(&file) {
        Some(key) => base_dir.join(key.month_folder()).join(file),
        None => base_dir.join(file),
    }
}

/// Record element for a dump file, judged by its file name.
pub fn record_tag_for_path(path: &Path) -> Option<&'static str> {
    let name = path.file_name()?.to_str()?;
    DumpKey::parse(name)?.kind.record_tag()
}

/// CSV path next to a dump: strips `.gz` and `.xml`, appends `.csv`.
pub fn csv_path_for(source: &Path) -> PathBuf {
    let name = source
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "output".to_string());
    let stem = name.strip_suffix(".gz").unwrap_or(&name);
    let stem = stem.strip_suffix(".xml").unwrap_or(stem);
    source.with_file_name(format!("{}.csv", stem))
}

#[cfg(test)]
mod tests {
    use super::*;

    const RELEASES: &str = "https://discogs-data-dumps.s3.us-west-2.amazonaws.com/data/2024/discogs_20240101_releases.xml.gz";

    #[test]
    fn dated_dump_goes_to_month_folder() {
        assert_eq!(
            local_path_for(RELEASES, Path::new("/data/Datasets")),
            PathBuf::from("/data/Datasets/2024-01/discogs_20240101_releases.xml.gz")
        );
    }

    #[test]
    fn undated_file_goes_to_base() {
        assert_eq!(
            local_path_for("https://example.com/files/readme.txt", Path::new("base")),
            PathBuf::from("base/readme.txt")
        );
        assert_eq!(
            local_path_for("https://example.com/", Path::new("base")),
            PathBuf::from("base/download.bin")
        );
    }

    #[test]
    fn record_tag_from_file_name() {
        assert_eq!(
            record_tag_for_path(Path::new("/x/discogs_20240101_masters.xml.gz")),
            Some("master")
        );
        assert_eq!(record_tag_for_path(Path::new("/x/custom.xml")), None);
    }

    #[test]
    fn csv_path_strips_extensions() {
        assert_eq!(
            csv_path_for(Path::new("/d/discogs_20240101_labels.xml.gz")),
            PathBuf::from("/d/discogs_20240101_labels.csv")
        );
        assert_eq!(csv_path_for(Path::new("data.xml")), PathBuf::from("data.csv"));
    }
}

//! Dump bucket listing (S3 `ListBucketResult` XML).
//!
//! `fetch_listing` asks the bucket for one prefix, optionally grouped by a
//! delimiter, and follows `IsTruncated` pages until the listing is complete.

use serde::Deserialize;

use crate::fetch_head::NetOptions;
use crate::naming::DumpKind;
use crate::outcome::FailureReason;

/// Public bucket the dumps are published to.
pub const DEFAULT_BASE_URL: &str = "https://discogs-data-dumps.s3.us-west-2.amazonaws.com/";

/// Guard against a bucket that keeps answering `IsTruncated` forever.
const MAX_PAGES: usize = 1000;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ListBucketResult {
    #[serde(default)]
    is_truncated: bool,
    #[serde(default)]
    next_marker: Option<String>,
    #[serde(default)]
    contents: Vec<RawObject>,
    #[serde(default)]
    common_prefixes: Vec<RawPrefix>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct RawObject {
    key: String,
    #[serde(default)]
    size: u64,
    #[serde(default)]
    last_modified: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct RawPrefix {
    prefix: String,
}

/// One object in the bucket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DumpObject {
    pub key: String,
    pub size: u64,
    pub last_modified: String,
    pub kind: DumpKind,
}

impl DumpObject {
    pub fn url(&self, base_url: &str) -> String {
        format!("{}/{}", base_url.trim_end_matches('/'), self.key)
    }
}

/// Parsed listing: sub-"directories" (common prefixes) and objects.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Listing {
    pub directories: Vec<String>,
    pub objects: Vec<DumpObject>,
    pub truncated: bool,
    /// Marker for the next page when truncated.
    pub next_marker: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum ListingError {
    #[error("invalid listing URL: {0}")]
    Url(#[from] url::ParseError),
    #[error("listing request failed: {0}")]
    Curl(#[from] curl::Error),
    #[error("listing request returned HTTP {0}")]
    Http(u32),
    #[error("listing is not valid XML: {0}")]
    Parse(#[from] quick_xml::DeError),
}

impl ListingError {
    pub fn reason(&self) -> FailureReason {
        match self {
            ListingError::Url(_) | ListingError::Parse(_) => FailureReason::PermanentNetwork,
            ListingError::Http(code) if (400..500).contains(code) => {
                FailureReason::PermanentNetwork
            }
            _ => FailureReason::ResourceUnavailable,
        }
    }
}

/// Decode one listing page.
pub fn parse_listing(xml: &str) -> Result<Listing, ListingError> {
    let raw: ListBucketResult = quick_xml::de::from_str(xml)?;
    let next_marker = match raw.next_marker.filter(|m| !m.is_empty()) {
        Some(m) => Some(m),
        None if raw.is_truncated => raw.contents.last().map(|o| o.key.clone()),
        None => None,
    };
    Ok(Listing {
        directories: raw.common_prefixes.into_iter().map(|p| p.prefix).collect(),
        objects: raw
            .contents
            .into_iter()
            .map(|o| DumpObject {
                kind: DumpKind::from_key(&o.key),
                key: o.key,
                size: o.size,
                last_modified: o.last_modified,
            })
            .collect(),
        truncated: raw.is_truncated,
        next_marker,
    })
}

/// Build the listing URL: `base?prefix=..&delimiter=..&marker=..`.
pub fn listing_url(
    base_url: &str,
    prefix: &str,
    delimiter: Option<&str>,
    marker: Option<&str>,
) -> Result<String, ListingError> {
    let mut url = url::Url::parse(base_url)?;
    {
        let mut q = url.query_pairs_mut();
        q.append_pair("prefix", prefix);
        if let Some(d) = delimiter {
            q.append_pair("delimiter", d);
        }
        if let Some(m) = marker {
            q.append_pair("marker", m);
        }
    }
    Ok(url.into())
}

/// List `prefix` in the bucket at `base_url`, following pagination.
///
/// Blocking; call from `spawn_blocking` in async code.
pub fn fetch_listing(
    base_url: &str,
    prefix: &str,
    delimiter: Option<&str>,
    net: &NetOptions,
) -> Result<Listing, ListingError> {
    let mut all = Listing::default();
    let mut marker: Option<String> = None;

    for _ in 0..MAX_PAGES {
        let url = listing_url(base_url, prefix, delimiter, marker.as_deref())?;
        tracing::debug!(%url, "fetching listing page");
        let body = get_text(&url, net)?;
        let page = parse_listing(&body)?;
        all.directories.extend(page.directories);
        all.objects.extend(page.objects);
        match page.next_marker {
            Some(next) if page.truncated => marker = Some(next),
            _ => return Ok(all),
        }
    }
    all.truncated = true;
    all.next_marker = marker;
    tracing::warn!(prefix, pages = MAX_PAGES, "listing still truncated, stopping");
    Ok(all)
}

fn get_text(url: &str, net: &NetOptions) -> Result<String, ListingError> {
    let mut body = Vec::new();
    let mut easy = curl::easy::Easy::new();
    easy.url(url)?;
    net.apply(&mut easy)?;
    {
        let mut transfer = easy.transfer();
        transfer.write_function(|data| {
            body.extend_from_slice(data);
            Ok(data.len())
        })?;
        transfer.perform()?;
    }
    let code = easy.response_code()?;
    if !(200..300).contains(&code) {
        return Err(ListingError::Http(code));
    }
    Ok(String::from_utf8_lossy(&body).into_owned())
}

/// Size with integer division into B, KB, MB or GB (`1536` → `"1 KB"`).
pub fn human_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;
    if bytes < KB {
        format!("{} B", bytes)
    } else if bytes < MB {
        format!("{} KB", bytes / KB)
    } else if bytes < GB {
        format!("{} MB", bytes / MB)
    } else {
        format!("{} GB", bytes / GB)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<ListBucketResult xmlns="http://s3.amazonaws.com/doc/2006-03-01/">
  <Name>discogs-data-dumps</Name>
  <Prefix>data/2024/</Prefix>
  <Marker></Marker>
  <MaxKeys>1000</MaxKeys>
  <IsTruncated>false</IsTruncated>
  <Contents>
    <Key>data/2024/discogs_20240101_CHECKSUM.txt</Key>
    <LastModified>2024-01-02T03:04:05.000Z</LastModified>
    <ETag>"abc"</ETag>
    <Size>402</Size>
    <StorageClass>STANDARD</StorageClass>
  </Contents>
  <Contents>
    <Key>data/2024/discogs_20240101_releases.xml.gz</Key>
    <LastModified>2024-01-02T03:04:05.000Z</LastModified>
    <ETag>"def"</ETag>
    <Size>11811160064</Size>
    <StorageClass>STANDARD</StorageClass>
  </Contents>
</ListBucketResult>"#;

    #[test]
    fn parse_objects_with_kinds() {
        let l = parse_listing(PAGE).unwrap();
        assert!(!l.truncated);
        assert!(l.next_marker.is_none());
        assert_eq!(l.objects.len(), 2);
        assert_eq!(l.objects[0].kind, DumpKind::Checksum);
        assert_eq!(l.objects[1].kind, DumpKind::Releases);
        assert_eq!(l.objects[1].size, 11_811_160_064);
        assert_eq!(
            l.objects[1].url(DEFAULT_BASE_URL),
            "https://discogs-data-dumps.s3.us-west-2.amazonaws.com/data/2024/discogs_20240101_releases.xml.gz"
        );
    }

    #[test]
    fn parse_common_prefixes() {
        let xml = r#"<ListBucketResult>
          <IsTruncated>false</IsTruncated>
          <CommonPrefixes><Prefix>data/2008/</Prefix></CommonPrefixes>
          <CommonPrefixes><Prefix>data/2009/</Prefix></CommonPrefixes>
        </ListBucketResult>"#;
        let l = parse_listing(xml).unwrap();
        assert_eq!(l.directories, vec!["data/2008/", "data/2009/"]);
        assert!(l.objects.is_empty());
    }

    #[test]
    fn truncated_page_uses_last_key_as_marker() {
        let xml = PAGE.replace("<IsTruncated>false", "<IsTruncated>true");
        let l = parse_listing(&xml).unwrap();
        assert!(l.truncated);
        assert_eq!(
            l.next_marker.as_deref(),
            Some("data/2024/discogs_20240101_releases.xml.gz")
        );
    }

    #[test]
    fn garbage_is_parse_error() {
        let err = parse_listing("<ListBucketResult><Contents>").unwrap_err();
        assert_eq!(err.reason(), FailureReason::PermanentNetwork);
    }

    #[test]
    fn listing_url_encodes_query() {
        let url = listing_url(DEFAULT_BASE_URL, "data/", Some("/"), None).unwrap();
        assert_eq!(
            url,
            "https://discogs-data-dumps.s3.us-west-2.amazonaws.com/?prefix=data%2F&delimiter=%2F"
        );
    }

    #[test]
    fn human_sizes() {
        assert_eq!(human_size(0), "0 B");
        assert_eq!(human_size(1023), "1023 B");
        assert_eq!(human_size(1536), "1 KB");
        assert_eq!(human_size(5 * 1024 * 1024 + 1), "5 MB");
        assert_eq!(human_size(11_811_160_064), "11 GB");
    }
}

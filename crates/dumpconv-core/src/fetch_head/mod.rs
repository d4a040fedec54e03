//! Capability probe: size and range support of a remote resource.
//!
//! Sends a HEAD request through libcurl and reads `Content-Length` and
//! `Accept-Ranges`. Some hosts reject HEAD (405, 403 on signed URLs), so a
//! failed HEAD is followed by a ranged GET for `bytes=0-0`: a `206` with
//! `Content-Range: bytes 0-0/N` confirms both ranges and size, a `200` means
//! the server streams the whole body and ranges are unsupported.

mod parse;

use std::str;
use std::time::Duration;

use crate::config::DumpConfig;
use crate::outcome::{Failure, FailureReason};

pub use parse::{parse_content_range_total, parse_status_line, ParsedHeaders};

/// Facts about a remote resource, resolved once by `probe`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteResource {
    pub url: String,
    /// Total size in bytes, if the server reported one.
    pub total_size: Option<u64>,
    /// True when byte ranges are confirmed to work.
    pub supports_ranges: bool,
}

impl RemoteResource {
    /// A resource with no capability information; downloads of it are sequential.
    pub fn unprobed(url: &str) -> Self {
        Self {
            url: url.to_string(),
            total_size: None,
            supports_ranges: false,
        }
    }
}

/// Per-request network settings shared by the probe, the downloader and the
/// listing fetcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NetOptions {
    pub connect_timeout: Duration,
    /// Transfers below this many bytes/s for `low_speed_time` abort with a
    /// timeout, which the retry policy treats as transient.
    pub low_speed_limit: u32,
    pub low_speed_time: Duration,
}

impl Default for NetOptions {
    fn default() -> Self {
        Self::from(&DumpConfig::default())
    }
}

impl From<&DumpConfig> for NetOptions {
    fn from(cfg: &DumpConfig) -> Self {
        Self {
            connect_timeout: Duration::from_secs(cfg.connect_timeout_secs),
            low_speed_limit: cfg.low_speed_limit_bytes,
            low_speed_time: Duration::from_secs(cfg.low_speed_time_secs),
        }
    }
}

impl NetOptions {
    /// Apply redirects, timeouts and the user agent to a curl handle.
    pub fn apply(&self, easy: &mut curl::easy::Easy) -> Result<(), curl::Error> {
        easy.follow_location(true)?;
        easy.max_redirections(10)?;
        easy.connect_timeout(self.connect_timeout)?;
        easy.low_speed_limit(self.low_speed_limit)?;
        easy.low_speed_time(self.low_speed_time)?;
        easy.useragent(concat!("dumpconv/", env!("CARGO_PKG_VERSION")))?;
        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ProbeError {
    #[error("invalid URL {url}: {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: curl::Error,
    },
    #[error("{url} unavailable ({message})")]
    Unavailable { url: String, message: String },
}

impl ProbeError {
    pub fn reason(&self) -> FailureReason {
        match self {
            ProbeError::InvalidUrl { .. } => FailureReason::PermanentNetwork,
            ProbeError::Unavailable { .. } => FailureReason::ResourceUnavailable,
        }
    }

    pub fn to_failure(&self) -> Failure {
        Failure::new(self.reason(), self.to_string())
    }
}

/// Resolve size and range support for `url`.
///
/// Blocking; call from a worker thread or `spawn_blocking` in async code.
pub fn probe(url: &str, net: &NetOptions) -> Result<RemoteResource, ProbeError> {
    url::Url::parse(url).map_err(|e| ProbeError::Unavailable {
        url: url.to_string(),
        message: format!("malformed URL: {}", e),
    })?;

    let head_err = match head(url, net) {
        Ok(resource) => {
            tracing::debug!(
                url,
                total_size = ?resource.total_size,
                supports_ranges = resource.supports_ranges,
                "HEAD probe"
            );
            return Ok(resource);
        }
        Err(ProbeError::InvalidUrl { url, source }) => {
            return Err(ProbeError::InvalidUrl { url, source })
        }
        Err(e) => e,
    };

    tracing::warn!(url, error = %head_err, "HEAD probe failed, trying ranged GET");
    match range_probe(url, net) {
        Ok(resource) => {
            tracing::debug!(
                url,
                total_size = ?resource.total_size,
                supports_ranges = resource.supports_ranges,
                "ranged GET probe"
            );
            Ok(resource)
        }
        Err(get_err) => Err(ProbeError::Unavailable {
            url: url.to_string(),
            message: format!("HEAD: {}; GET bytes=0-0: {}", describe(&head_err), describe(&get_err)),
        }),
    }
}

fn describe(e: &ProbeError) -> String {
    match e {
        ProbeError::Unavailable { message, .. } => message.clone(),
        other => other.to_string(),
    }
}

fn new_handle(url: &str, net: &NetOptions) -> Result<curl::easy::Easy, ProbeError> {
    let mut easy = curl::easy::Easy::new();
    easy.url(url).map_err(|source| ProbeError::InvalidUrl {
        url: url.to_string(),
        source,
    })?;
    net.apply(&mut easy).map_err(|e| unavailable(url, e))?;
    Ok(easy)
}

fn unavailable(url: &str, e: impl std::fmt::Display) -> ProbeError {
    ProbeError::Unavailable {
        url: url.to_string(),
        message: e.to_string(),
    }
}

fn head(url: &str, net: &NetOptions) -> Result<RemoteResource, ProbeError> {
    let mut lines: Vec<String> = Vec::new();
    let mut easy = new_handle(url, net)?;
    easy.nobody(true).map_err(|e| unavailable(url, e))?;
    {
        let mut transfer = easy.transfer();
        transfer
            .header_function(|data| {
                if let Ok(s) = str::from_utf8(data) {
                    lines.push(s.trim_end().to_string());
                }
                true
            })
            .map_err(|e| unavailable(url, e))?;
        transfer.perform().map_err(|e| unavailable(url, e))?;
    }

    let code = easy.response_code().map_err(|e| unavailable(url, e))?;
    if !(200..300).contains(&code) {
        return Err(unavailable(url, format!("HTTP {}", code)));
    }

    let parsed = parse::parse_headers(&lines);
    Ok(RemoteResource {
        url: url.to_string(),
        total_size: parsed.content_length,
        supports_ranges: parsed.accept_ranges && parsed.content_length.is_some_and(|n| n > 0),
    })
}

fn range_probe(url: &str, net: &NetOptions) -> Result<RemoteResource, ProbeError> {
    let mut lines: Vec<String> = Vec::new();
    let mut easy = new_handle(url, net)?;
    easy.range("0-0").map_err(|e| unavailable(url, e))?;
    {
        let mut transfer = easy.transfer();
        transfer
            .header_function(|data| {
                if let Ok(s) = str::from_utf8(data) {
                    lines.push(s.trim_end().to_string());
                }
                true
            })
            .map_err(|e| unavailable(url, e))?;
        // Only the headers matter. Returning a short count aborts the body
        // with a write error, which is expected here.
        transfer
            .write_function(|data| Ok(if data.len() <= 1 { data.len() } else { 0 }))
            .map_err(|e| unavailable(url, e))?;
        if let Err(e) = transfer.perform() {
            if !e.is_write_error() {
                return Err(unavailable(url, e));
            }
        }
    }

    let code = easy.response_code().map_err(|e| unavailable(url, e))?;
    let parsed = parse::parse_headers(&lines);
    match code {
        206 => Ok(RemoteResource {
            url: url.to_string(),
            supports_ranges: parsed.content_range_total.is_some(),
            total_size: parsed.content_range_total,
        }),
        200..=299 => Ok(RemoteResource {
            url: url.to_string(),
            total_size: parsed.content_length,
            supports_ranges: false,
        }),
        other => Err(unavailable(url, format!("HTTP {}", other))),
    }
}

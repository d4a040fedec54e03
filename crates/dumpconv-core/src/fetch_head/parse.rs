//! Parse HTTP response header lines collected by curl.

/// Headers relevant to the probe, taken from the final response only.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedHeaders {
    pub status: Option<u32>,
    pub content_length: Option<u64>,
    pub accept_ranges: bool,
    /// `N` from `Content-Range: bytes a-b/N`.
    pub content_range_total: Option<u64>,
}

/// Parse collected header lines. curl reports every response in a redirect
/// chain, so a status line resets what was seen so far.
pub(crate) fn parse_headers(lines: &[String]) -> ParsedHeaders {
    let mut out = ParsedHeaders::default();

    for line in lines {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if let Some(code) = parse_status_line(line) {
            out = ParsedHeaders {
                status: Some(code),
                ..ParsedHeaders::default()
            };
            continue;
        }
        let Some((name, value)) = line.split_once(':') else {
            continue;
        };
        let name = name.trim();
        let value = value.trim();
        if name.eq_ignore_ascii_case("content-length") {
            out.content_length = value.parse::<u64>().ok();
        } else if name.eq_ignore_ascii_case("accept-ranges") {
            out.accept_ranges = value.eq_ignore_ascii_case("bytes");
        } else if name.eq_ignore_ascii_case("content-range") {
            out.content_range_total = parse_content_range_total(value);
        }
    }

    out
}

/// Status code from a line like `HTTP/1.1 206 Partial Content` or `HTTP/2 200`.
pub fn parse_status_line(line: &str) -> Option<u32> {
    let rest = line.strip_prefix("HTTP/")?;
    let mut parts = rest.split_whitespace();
    parts.next()?;
    parts.next()?.parse().ok()
}

/// Total length from a `Content-Range` value (`bytes 0-0/12345`).
/// Returns None for an unknown total (`*`).
pub fn parse_content_range_total(value: &str) -> Option<u64> {
    let rest = value.trim().strip_prefix("bytes")?.trim_start();
    let (_, total) = rest.split_once('/')?;
    total.trim().parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lines(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn content_length_and_ranges() {
        let r = parse_headers(&lines(&[
            "HTTP/1.1 200 OK",
            "Content-Length: 12345",
            "Accept-Ranges: bytes",
        ]));
        assert_eq!(r.status, Some(200));
        assert_eq!(r.content_length, Some(12345));
        assert!(r.accept_ranges);
        assert!(r.content_range_total.is_none());
    }

    #[test]
    fn accept_ranges_none() {
        let r = parse_headers(&lines(&["Content-Length: 999", "Accept-Ranges: none"]));
        assert_eq!(r.content_length, Some(999));
        assert!(!r.accept_ranges);
    }

    #[test]
    fn redirect_chain_keeps_last_response() {
        let r = parse_headers(&lines(&[
            "HTTP/1.1 302 Found",
            "Location: https://cdn.example/x",
            "Content-Length: 0",
            "",
            "HTTP/2 200",
            "content-length: 77",
            "accept-ranges: bytes",
        ]));
        assert_eq!(r.status, Some(200));
        assert_eq!(r.content_length, Some(77));
        assert!(r.accept_ranges);
    }

    #[test]
    fn content_range_total() {
        assert_eq!(parse_content_range_total("bytes 0-0/4096"), Some(4096));
        assert_eq!(parse_content_range_total("bytes 10-19/20"), Some(20));
        assert_eq!(parse_content_range_total("bytes 0-0/*"), None);
        assert_eq!(parse_content_range_total("items 0-0/5"), None);

        let r = parse_headers(&lines(&["HTTP/1.1 206 Partial Content", "Content-Range: bytes 0-0/512"]));
        assert_eq!(r.status, Some(206));
        assert_eq!(r.content_range_total, Some(512));
    }

    #[test]
    fn status_line_forms() {
        assert_eq!(parse_status_line("HTTP/1.1 405 Method Not Allowed"), Some(405));
        assert_eq!(parse_status_line("HTTP/2 200"), Some(200));
        assert_eq!(parse_status_line("Content-Length: 5"), None);
    }
}

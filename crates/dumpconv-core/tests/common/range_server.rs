//! Minimal HTTP/1.1 server that supports HEAD and Range GET for integration tests.
//!
//! Serves a single static body, one request per connection. Fault injection
//! knobs simulate servers that block HEAD, ignore `Range`, drop connections
//! mid-body, or keep failing one segment.

use std::io::{Read, Write};
use std::net::{Shutdown, TcpListener, TcpStream};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

#[derive(Debug, Clone, Copy)]
pub struct RangeServerOptions {
    /// If false, HEAD returns 405 (simulates servers that block HEAD).
    pub head_allowed: bool,
    /// If false, GET ignores Range and no `Accept-Ranges` header is sent.
    pub support_ranges: bool,
    /// Advertise `Accept-Ranges: bytes` on HEAD but answer every GET with 200
    /// and the full body.
    pub ignore_range: bool,
    /// The first N ranged GETs send half their slice and then drop the connection.
    pub reset_first_n: usize,
    /// Ranged GETs starting at this offset always get 500.
    pub fail_range_start: Option<u64>,
    /// Pause between 4 KiB chunks of every body.
    pub chunk_delay: Option<Duration>,
    /// Content-Length advertised on HEAD instead of the real body length.
    pub head_length: Option<u64>,
    /// Send no Content-Length at all; full bodies end when the connection closes.
    pub omit_length: bool,
}

impl Default for RangeServerOptions {
    fn default() -> Self {
        Self {
            head_allowed: true,
            support_ranges: true,
            ignore_range: false,
            reset_first_n: 0,
            fail_range_start: None,
            chunk_delay: None,
            head_length: None,
            omit_length: false,
        }
    }
}

/// Request counters, shared with the server threads.
#[derive(Debug, Default)]
pub struct ServerStats {
    pub heads: AtomicUsize,
    pub ranged_gets: AtomicUsize,
    pub full_gets: AtomicUsize,
    pub resets: AtomicUsize,
}

impl ServerStats {
    pub fn ranged_gets(&self) -> usize {
        self.ranged_gets.load(Ordering::SeqCst)
    }

    pub fn full_gets(&self) -> usize {
        self.full_gets.load(Ordering::SeqCst)
    }

    pub fn resets(&self) -> usize {
        self.resets.load(Ordering::SeqCst)
    }
}

pub struct RangeServer {
    /// Base URL, e.g. "http://127.0.0.1:12345/dump.bin".
    pub url: String,
    pub stats: Arc<ServerStats>,
}

/// Starts a server in a background thread serving `body`. The server runs
/// until the process exits.
pub fn start(body: Vec<u8>) -> RangeServer {
    start_with_options(body, RangeServerOptions::default())
}

pub fn start_with_options(body: Vec<u8>, opts: RangeServerOptions) -> RangeServer {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let port = listener.local_addr().unwrap().port();
    let body = Arc::new(body);
    let stats = Arc::new(ServerStats::default());
    let server_stats = Arc::clone(&stats);
    thread::spawn(move || {
        for stream in listener.incoming().flatten() {
            let body = Arc::clone(&body);
            let stats = Arc::clone(&server_stats);
            thread::spawn(move || handle(stream, &body, opts, &stats));
        }
    });
    RangeServer {
        url: format!("http://127.0.0.1:{}/dump.bin", port),
        stats,
    }
}

fn handle(mut stream: TcpStream, body: &[u8], opts: RangeServerOptions, stats: &ServerStats) {
    let _ = stream.set_read_timeout(Some(Duration::from_secs(2)));
    let _ = stream.set_write_timeout(Some(Duration::from_secs(5)));
    let mut buf = [0u8; 8192];
    let n = match stream.read(&mut buf) {
        Ok(0) | Err(_) => return,
        Ok(n) => n,
    };
    let request = match std::str::from_utf8(&buf[..n]) {
        Ok(s) => s,
        Err(_) => return,
    };
    let (method, range) = parse_request(request);
    let total = body.len() as u64;
    let accept_ranges = if opts.support_ranges || opts.ignore_range {
        "Accept-Ranges: bytes\r\n"
    } else {
        ""
    };

    if method.eq_ignore_ascii_case("HEAD") {
        stats.heads.fetch_add(1, Ordering::SeqCst);
        if !opts.head_allowed {
            let _ = stream.write_all(
                b"HTTP/1.1 405 Method Not Allowed\r\nContent-Length: 0\r\nConnection: close\r\n\r\n",
            );
            return;
        }
        let response = format!(
            "HTTP/1.1 200 OK\r\n{}{}Connection: close\r\n\r\n",
            length_header(opts.head_length.unwrap_or(total), opts.omit_length),
            accept_ranges
        );
        let _ = stream.write_all(response.as_bytes());
        return;
    }
    if !method.eq_ignore_ascii_case("GET") {
        let _ = stream.write_all(b"HTTP/1.1 405 Method Not Allowed\r\nConnection: close\r\n\r\n");
        return;
    }

    let range = range.filter(|_| opts.support_ranges && !opts.ignore_range);
    let Some((start, end_incl)) = range else {
        stats.full_gets.fetch_add(1, Ordering::SeqCst);
        let head = format!(
            "HTTP/1.1 200 OK\r\n{}{}Connection: close\r\n\r\n",
            length_header(total, opts.omit_length),
            accept_ranges
        );
        send(&mut stream, head, body, opts.chunk_delay);
        return;
    };

    let seen = stats.ranged_gets.fetch_add(1, Ordering::SeqCst);
    if opts.fail_range_start == Some(start) {
        let _ = stream.write_all(
            b"HTTP/1.1 500 Internal Server Error\r\nContent-Length: 0\r\nConnection: close\r\n\r\n",
        );
        return;
    }
    let end_incl = end_incl.min(total.saturating_sub(1));
    if start >= total || start > end_incl {
        let head = format!(
            "HTTP/1.1 416 Range Not Satisfiable\r\nContent-Range: bytes */{}\r\nContent-Length: 0\r\nConnection: close\r\n\r\n",
            total
        );
        let _ = stream.write_all(head.as_bytes());
        return;
    }
    let slice = &body[start as usize..=end_incl as usize];
    let head = format!(
        "HTTP/1.1 206 Partial Content\r\nContent-Length: {}\r\nContent-Range: bytes {}-{}/{}\r\n{}Connection: close\r\n\r\n",
        slice.len(),
        start,
        end_incl,
        total,
        accept_ranges
    );
    if seen < opts.reset_first_n {
        stats.resets.fetch_add(1, Ordering::SeqCst);
        let _ = stream.write_all(head.as_bytes());
        let _ = stream.write_all(&slice[..slice.len() / 2]);
        let _ = stream.flush();
        let _ = stream.shutdown(Shutdown::Both);
        return;
    }
    send(&mut stream, head, slice, opts.chunk_delay);
}

fn length_header(len: u64, omit: bool) -> String {
    if omit {
        String::new()
    } else {
        format!("Content-Length: {}\r\n", len)
    }
}

fn send(stream: &mut TcpStream, head: String, body: &[u8], delay: Option<Duration>) {
    if stream.write_all(head.as_bytes()).is_err() {
        return;
    }
    match delay {
        None => {
            let _ = stream.write_all(body);
        }
        Some(delay) => {
            for chunk in body.chunks(4096) {
                if stream.write_all(chunk).is_err() {
                    return;
                }
                thread::sleep(delay);
            }
        }
    }
}

/// Returns (method, optional (start, end_inclusive) for Range: bytes=X-Y).
fn parse_request(request: &str) -> (&str, Option<(u64, u64)>) {
    let mut method = "";
    let mut range = None;
    for line in request.lines() {
        let line = line.trim();
        if line.is_empty() {
            break;
        }
        if method.is_empty() {
            method = line.split_whitespace().next().unwrap_or("");
            continue;
        }
        if let Some((name, value)) = line.split_once(':') {
            if !name.trim().eq_ignore_ascii_case("range") {
                continue;
            }
            let value = value.trim();
            if let Some(part) = value.strip_prefix("bytes=") {
                if let Some((a, b)) = part.split_once('-') {
                    let start = a.trim().parse::<u64>().unwrap_or(0);
                    let end = b.trim();
                    let end_incl = if end.is_empty() {
                        u64::MAX
                    } else {
                        end.parse::<u64>().unwrap_or(0)
                    };
                    range = Some((start, end_incl));
                }
            }
        }
    }
    (method, range)
}

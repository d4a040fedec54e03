//! Tests for ls, verify, decompress and the progress line.

use super::parse;
use crate::cli::commands::decompress::default_output;
use crate::cli::progress::{format_line, Unit};
use crate::cli::{Cli, CliCommand};
use clap::Parser;
use dumpconv_core::listing::DEFAULT_BASE_URL;
use dumpconv_core::progress::ProgressSnapshot;
use std::path::Path;
use std::time::Duration;

#[test]
fn cli_parse_ls_defaults() {
    match parse(&["dumpconv", "ls"]) {
        CliCommand::Ls { prefix, base_url } => {
            assert_eq!(prefix, "data/");
            assert_eq!(base_url, DEFAULT_BASE_URL);
        }
        _ => panic!("expected Ls"),
    }
}

#[test]
fn cli_parse_ls_prefix() {
    match parse(&["dumpconv", "ls", "data/2024/", "--base-url", "http://localhost/"]) {
        CliCommand::Ls { prefix, base_url } => {
            assert_eq!(prefix, "data/2024/");
            assert_eq!(base_url, "http://localhost/");
        }
        _ => panic!("expected Ls with prefix"),
    }
}

#[test]
fn cli_parse_verify_requires_checksums() {
    assert!(Cli::try_parse_from(["dumpconv", "verify", "f.gz"]).is_err());
    match parse(&["dumpconv", "verify", "f.gz", "--checksums", "CHECKSUM.txt"]) {
        CliCommand::Verify { path, checksums } => {
            assert_eq!(path, Path::new("f.gz"));
            assert_eq!(checksums, Path::new("CHECKSUM.txt"));
        }
        _ => panic!("expected Verify"),
    }
}

#[test]
fn cli_parse_decompress() {
    match parse(&["dumpconv", "decompress", "a.xml.gz"]) {
        CliCommand::Decompress { path, out } => {
            assert_eq!(path, Path::new("a.xml.gz"));
            assert!(out.is_none());
        }
        _ => panic!("expected Decompress"),
    }
}

#[test]
fn decompress_default_output_strips_gz() {
    assert_eq!(default_output(Path::new("/d/a.xml.gz")), Path::new("/d/a.xml"));
    assert_eq!(default_output(Path::new("raw")), Path::new("raw.out"));
}

#[test]
fn unknown_subcommand_is_rejected() {
    assert!(Cli::try_parse_from(["dumpconv", "add", "x"]).is_err());
}

#[test]
fn progress_line_formats() {
    let snap = ProgressSnapshot {
        total: 512 * 1024,
        expected: Some(1024 * 1024),
        rate: 256.0 * 1024.0,
        elapsed: Duration::from_secs(2),
    };
    assert_eq!(
        format_line(&snap, Unit::Bytes),
        "\r  0.5 / 1.0 MiB (50.0%)  0.25 MiB/s  ETA 2s  "
    );

    let rows = ProgressSnapshot {
        total: 10,
        expected: None,
        rate: 5.0,
        elapsed: Duration::from_secs(2),
    };
    assert_eq!(
        format_line(&rows, Unit::Rows),
        "\r  10 / ? rows (?)  5 rows/s  ETA ?  "
    );
}

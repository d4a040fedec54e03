pub mod config;
pub mod logging;

// Shared vocabulary
pub mod control;
pub mod outcome;
pub mod progress;

// Download path
pub mod checksum;
pub mod downloader;
pub mod fetch_head;
pub mod listing;
pub mod naming;
pub mod retry;
pub mod segmenter;
pub mod storage;

// Conversion path
pub mod convert;
pub mod source;

//! CLI command handlers, one file per command.

mod convert;
pub(crate) mod decompress;
pub(crate) mod download;
mod fetch;
mod ls;
mod verify;

pub use convert::run_convert;
pub use decompress::run_decompress;
pub use download::run_download;
pub use fetch::run_fetch;
pub use ls::run_ls;
pub use verify::run_verify;

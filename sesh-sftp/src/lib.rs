#![doc = concat!(
    "[![crates.io](https://img.shields.io/crates/v/", env!("CARGO_PKG_NAME"), ")](https://crates.io/crates/", env!("CARGO_PKG_NAME"), ")",
    " ",
    "[![docs.rs](https://img.shields.io/docsrs/", env!("CARGO_PKG_NAME"), ")](https://docs.rs/", env!("CARGO_PKG_NAME"), ")",
    " ",
    "![license](https://img.shields.io/crates/l/", env!("CARGO_PKG_NAME"), ")"
)]
#![doc = ""]
#![doc = env!("CARGO_PKG_DESCRIPTION")]
//!
//! The client runs over any pair of asynchronous byte streams,
//! typically the reader and writer halves of a `subsystem sftp`
//! channel from [`sesh-connect`].

#![cfg_attr(docsrs, feature(doc_cfg))]
#![warn(
    missing_docs,
    clippy::unwrap_used,
    clippy::panic,
    clippy::unimplemented,
    clippy::todo,
    clippy::undocumented_unsafe_blocks
)]
#![forbid(unsafe_code)]

/// The SFTP protocol version this client implements and negotiates.
pub const VERSION: u32 = 3;

/// The default chunk size of the file stream adapters, in bytes.
const DEFAULT_CHUNK_SIZE: u32 = 32768;

mod error;
pub use error::{Error, Result};

pub mod wire;

mod client;
pub use client::{Config, CopyMode, OpenMode, SftpClient};

mod dir;
pub use dir::ReadDir;

mod file;
pub use file::{Reader, Writer};

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

#![cfg_attr(docsrs, feature(doc_cfg))]
#![warn(
    missing_docs,
    clippy::unwrap_used,
    clippy::unimplemented,
    clippy::todo,
    clippy::undocumented_unsafe_blocks
)]
#![forbid(unsafe_code)]

use sesh::{side::Side, Pipe, Session};

const SERVICE_NAME: &str = "ssh-connection";

/// The range of message numbers owned by the `ssh-connection` service.
const CLAIM: std::ops::RangeInclusive<u8> = 80..=127;

mod error;
pub use error::{Error, Result};

mod interest;
pub(crate) use interest::Interest;

mod poller;

pub mod channel;
pub mod channel_open;
pub mod global_request;

mod connect;
pub use connect::Connect;

/// The `ssh-connection` service, requestable from a client
/// session or handleable on a server session.
#[derive(Debug, Clone, Copy)]
pub struct Service {
    /// Initial per-channel window size, in bytes.
    pub window_size: u32,

    /// Maximum per-channel packet size, in bytes.
    pub max_packet: u32,
}

impl Default for Service {
    fn default() -> Self {
        Self {
            window_size: 0x200000, // 2MiB
            max_packet: 0x8000,    // 32KiB
        }
    }
}

impl sesh::service::Request for Service {
    type Err = Error;
    type Ok<I: Pipe, S: Side> = Connect<I, S>;

    const SERVICE_NAME: &'static str = SERVICE_NAME;
    const CLAIM: std::ops::RangeInclusive<u8> = CLAIM;

    async fn on_accept<I: Pipe, S: Side>(
        self,
        session: Session<I, S>,
    ) -> Result<Self::Ok<I, S>> {
        Ok(Connect::new(session, self))
    }
}

impl sesh::service::Handler for Service {
    type Err = Error;
    type Ok<I: Pipe, S: Side> = Connect<I, S>;

    const SERVICE_NAME: &'static str = SERVICE_NAME;
    const CLAIM: std::ops::RangeInclusive<u8> = CLAIM;

    async fn on_request<I: Pipe, S: Side>(
        self,
        session: Session<I, S>,
    ) -> Result<Self::Ok<I, S>> {
        Ok(Connect::new(session, self))
    }
}

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
    clippy::todo,
    clippy::unwrap_used,
    clippy::unimplemented,
    clippy::undocumented_unsafe_blocks
)]
#![forbid(unsafe_code)]

/// Maximum size for the decompressed _payload_ of a packet,
/// as mandated by the [RFC 4253](https://datatracker.ietf.org/doc/html/rfc4253#section-6.1).
pub const PAYLOAD_MAX_SIZE: usize = 32768;

/// Maximum size for a whole packet, MAC excluded,
/// as mandated by the [RFC 4253](https://datatracker.ietf.org/doc/html/rfc4253#section-6.1).
pub const PACKET_MAX_SIZE: usize = 35000;

/// Minimum size for a whole packet, coincidentally this is
/// the largest block cipher's block-size.
pub const PACKET_MIN_SIZE: usize = 16;

/// Minimum length announced in the `packet_length` field:
/// one `padding_length` byte plus the four mandatory padding bytes.
pub const PACKET_MIN_LENGTH: usize = 5;

mod error;
pub use error::Error;

mod id;
pub use id::Id;

mod packet;
pub use packet::{IntoPacket, Mac, OpeningCipher, Packet, SealingCipher};

pub mod arch;
pub mod connect;
pub mod cryptography;
pub mod kex;
pub mod trans;
pub mod userauth;

#[doc(no_inline)]
pub use binrw;

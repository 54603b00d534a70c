//! Exchange-hash structures for the SSH's **key-exchange** part of the protocol,
//! as defined in the [RFC 4253](https://datatracker.ietf.org/doc/html/rfc4253#section-8),
//! [RFC 5656](https://datatracker.ietf.org/doc/html/rfc5656#section-4) and
//! [RFC 4419](https://datatracker.ietf.org/doc/html/rfc4419#section-3).

use binrw::binwrite;

use crate::arch;

macro_rules! hash {
    ($name:ident) => {
        impl $name {
            /// Produce the exchange hash with the specified digest algorithm.
            #[cfg(feature = "digest")]
            #[cfg_attr(docsrs, doc(cfg(feature = "digest")))]
            pub fn hash<D: digest::Digest>(&self) -> digest::Output<D> {
                use binrw::BinWrite;

                let mut buffer = std::io::Cursor::new(Vec::new());
                self.write(&mut buffer)
                    .expect("exchange hash structures serialize infallibly to memory");

                D::digest(buffer.into_inner())
            }
        }
    };
}

/// The exchange hash for the classic _Diffie-Hellman_ key-exchange,
/// computed as the hash of the concatenation of the following.
///
/// see <https://datatracker.ietf.org/doc/html/rfc4253#section-8>.
#[binwrite]
#[derive(Debug, Clone)]
#[bw(big)]
pub struct Dh {
    /// Client's identification string (`\r` and `\n` excluded).
    pub v_c: arch::Bytes,

    /// Server's identification string (`\r` and `\n` excluded).
    pub v_s: arch::Bytes,

    /// Payload of the client's `SSH_MSG_KEXINIT` message.
    pub i_c: arch::Bytes,

    /// Payload of the server's `SSH_MSG_KEXINIT` message.
    pub i_s: arch::Bytes,

    /// Server's public host key.
    pub k_s: arch::Bytes,

    /// Client's ephemeral public value.
    pub e: arch::MpInt,

    /// Server's ephemeral public value.
    pub f: arch::MpInt,

    /// Computed shared secret.
    pub k: arch::MpInt,
}

hash!(Dh);

/// The exchange hash for ECDH key-exchanges, computed as the
/// hash of the concatenation of the following.
///
/// see <https://datatracker.ietf.org/doc/html/rfc5656#section-4>.
#[binwrite]
#[derive(Debug, Clone)]
#[bw(big)]
pub struct Ecdh {
    /// Client's identification string (`\r` and `\n` excluded).
    pub v_c: arch::Bytes,

    /// Server's identification string (`\r` and `\n` excluded).
    pub v_s: arch::Bytes,

    /// Payload of the client's `SSH_MSG_KEXINIT` message.
    pub i_c: arch::Bytes,

    /// Payload of the server's `SSH_MSG_KEXINIT` message.
    pub i_s: arch::Bytes,

    /// Server's public host key.
    pub k_s: arch::Bytes,

    /// Client's ephemeral public key octet string.
    pub q_c: arch::Bytes,

    /// Server's ephemeral public key octet string.
    pub q_s: arch::Bytes,

    /// Computed shared secret.
    pub k: arch::MpInt,
}

hash!(Ecdh);

/// The exchange hash for the _Diffie-Hellman group exchange_,
/// computed as the hash of the concatenation of the following.
///
/// see <https://datatracker.ietf.org/doc/html/rfc4419#section-3>.
#[binwrite]
#[derive(Debug, Clone)]
#[bw(big)]
pub struct DhGex {
    /// Client's identification string (`\r` and `\n` excluded).
    pub v_c: arch::Bytes,

    /// Server's identification string (`\r` and `\n` excluded).
    pub v_s: arch::Bytes,

    /// Payload of the client's `SSH_MSG_KEXINIT` message.
    pub i_c: arch::Bytes,

    /// Payload of the server's `SSH_MSG_KEXINIT` message.
    pub i_s: arch::Bytes,

    /// Server's public host key.
    pub k_s: arch::Bytes,

    /// Minimal acceptable group size, in bits.
    pub min: u32,

    /// Preferred group size, in bits.
    pub n: u32,

    /// Maximal acceptable group size, in bits.
    pub max: u32,

    /// The safe prime of the selected group.
    pub p: arch::MpInt,

    /// The generator for the subgroup.
    pub g: arch::MpInt,

    /// Client's ephemeral public value.
    pub e: arch::MpInt,

    /// Server's ephemeral public value.
    pub f: arch::MpInt,

    /// Computed shared secret.
    pub k: arch::MpInt,
}

hash!(DhGex);

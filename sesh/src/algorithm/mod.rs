//! Supported algorithms for **compression**, **encryption**, **integrity**,
//! **key-exchange** and **host keys**, with their negotiation mechanics.

mod cipher;
pub use cipher::{Cipher, CipherState};

mod compress;
pub use compress::Compress;

mod hmac;
pub use hmac::Hmac;

pub(crate) mod kex;
pub use kex::Kex;

pub(crate) mod key;
pub use key::Key;

mod registry;
pub use registry::Registry;

use sesh_wire::{arch::NameList, trans::KexInit};

use crate::{Error, Result};

/// The set of algorithms enabled for a session, in preference order.
#[derive(Debug, Clone)]
pub struct Algorithms {
    /// Enabled algorithms for _key-exchange_.
    pub kexs: Registry<Kex>,

    /// Enabled algorithms for _encryption & decryption_.
    pub ciphers: Registry<Cipher>,

    /// Enabled algorithms for _hmac_.
    pub macs: Registry<Hmac>,

    /// Enabled algorithms for _compression_.
    pub compressions: Registry<Compress>,
}

impl Default for Algorithms {
    fn default() -> Self {
        Self {
            kexs: Registry::new([
                Kex::Curve25519Sha256,
                Kex::Curve25519Sha256Libssh,
                Kex::EcdhSha2Nistp256,
                Kex::EcdhSha2Nistp384,
                Kex::EcdhSha2Nistp521,
                Kex::DiffieHellmanGroupExchangeSha256,
                Kex::DiffieHellmanGroup14Sha1,
                Kex::DiffieHellmanGroup1Sha1,
            ]),
            ciphers: Registry::new([
                Cipher::Aes256Ctr,
                Cipher::Aes192Ctr,
                Cipher::Aes128Ctr,
                Cipher::Aes256Cbc,
                Cipher::Aes192Cbc,
                Cipher::Aes128Cbc,
            ]),
            macs: Registry::new([
                Hmac::HmacSha512Etm,
                Hmac::HmacSha256Etm,
                Hmac::HmacSha512,
                Hmac::HmacSha256,
                Hmac::HmacSha1Etm,
                Hmac::HmacSha1,
                Hmac::HmacSha196,
                Hmac::HmacMd5,
                Hmac::HmacMd596,
            ]),
            compressions: Registry::new([Compress::None, Compress::ZlibOpenssh, Compress::Zlib]),
        }
    }
}

/// The negotiated algorithms for both directions of a session.
#[derive(Debug)]
pub(crate) struct Negotiated {
    pub client_cipher: Cipher,
    pub server_cipher: Cipher,
    pub client_hmac: Hmac,
    pub server_hmac: Hmac,
    pub client_compress: Compress,
    pub server_compress: Compress,
}

impl Negotiated {
    /// Pick the directional algorithms from the two `SSH_MSG_KEXINIT`
    /// messages: for every slot, the first entry of the client's list
    /// that also appears in the server's list.
    pub fn negociate(algorithms: &Algorithms, i_c: &KexInit, i_s: &KexInit) -> Result<Self> {
        fn slot<T: Clone + AsRef<str> + std::str::FromStr>(
            registry: &Registry<T>,
            clientlist: &NameList,
            serverlist: &NameList,
            err: fn() -> Error,
        ) -> Result<T> {
            clientlist
                .preferred_in(serverlist)
                .and_then(|name| registry.resolve(name))
                .ok_or_else(err)
        }

        Ok(Self {
            client_cipher: slot(
                &algorithms.ciphers,
                &i_c.encryption_algorithms_client_to_server,
                &i_s.encryption_algorithms_client_to_server,
                || Error::NoCommonCipher,
            )?,
            server_cipher: slot(
                &algorithms.ciphers,
                &i_c.encryption_algorithms_server_to_client,
                &i_s.encryption_algorithms_server_to_client,
                || Error::NoCommonCipher,
            )?,
            client_hmac: slot(
                &algorithms.macs,
                &i_c.mac_algorithms_client_to_server,
                &i_s.mac_algorithms_client_to_server,
                || Error::NoCommonHmac,
            )?,
            server_hmac: slot(
                &algorithms.macs,
                &i_c.mac_algorithms_server_to_client,
                &i_s.mac_algorithms_server_to_client,
                || Error::NoCommonHmac,
            )?,
            client_compress: slot(
                &algorithms.compressions,
                &i_c.compression_algorithms_client_to_server,
                &i_s.compression_algorithms_client_to_server,
                || Error::NoCommonCompression,
            )?,
            server_compress: slot(
                &algorithms.compressions,
                &i_c.compression_algorithms_server_to_client,
                &i_s.compression_algorithms_server_to_client,
                || Error::NoCommonCompression,
            )?,
        })
    }
}

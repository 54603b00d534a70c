use digest::{Digest, FixedOutputReset};
use securefmt::Debug;
use sesh_wire::{arch::MpInt, Mac};

use crate::algorithm::Cipher;

/// The derived key material for one direction of the transport.
///
/// see <https://datatracker.ietf.org/doc/html/rfc4253#section-7.2>.
#[derive(Debug, Default)]
pub struct Keys {
    /// Cipher _initialization vector_.
    #[sensitive]
    pub iv: Vec<u8>,

    /// Cipher _key_.
    #[sensitive]
    pub key: Vec<u8>,

    /// Hmac _key_.
    #[sensitive]
    pub hmac: Vec<u8>,
}

impl Keys {
    /// Derive the client-to-server key material from the exchange products.
    pub fn as_client<D: Digest + FixedOutputReset>(
        secret: &MpInt,
        hash: &[u8],
        session_id: &[u8],
        cipher: &Cipher,
        hmac: &impl Mac,
    ) -> Self {
        Self {
            iv: Self::derive::<D>(secret, hash, b'A', session_id, cipher.iv_size()),
            key: Self::derive::<D>(secret, hash, b'C', session_id, cipher.key_size()),
            hmac: Self::derive::<D>(secret, hash, b'E', session_id, hmac.size()),
        }
    }

    /// Derive the server-to-client key material from the exchange products.
    pub fn as_server<D: Digest + FixedOutputReset>(
        secret: &MpInt,
        hash: &[u8],
        session_id: &[u8],
        cipher: &Cipher,
        hmac: &impl Mac,
    ) -> Self {
        Self {
            iv: Self::derive::<D>(secret, hash, b'B', session_id, cipher.iv_size()),
            key: Self::derive::<D>(secret, hash, b'D', session_id, cipher.key_size()),
            hmac: Self::derive::<D>(secret, hash, b'F', session_id, hmac.size()),
        }
    }

    fn derive<D: Digest + FixedOutputReset>(
        secret: &MpInt,
        hash: &[u8],
        kind: u8,
        session_id: &[u8],
        size: usize,
    ) -> Vec<u8> {
        let mut key = Vec::with_capacity(size);

        let mut hasher = D::new()
            .chain_update((secret.len() as u32).to_be_bytes())
            .chain_update(secret)
            .chain_update(hash)
            .chain_update([kind])
            .chain_update(session_id);

        key.extend_from_slice(&hasher.finalize_reset());

        while key.len() < size {
            hasher = hasher
                .chain_update((secret.len() as u32).to_be_bytes())
                .chain_update(secret)
                .chain_update(hash)
                .chain_update(&key);

            key.extend_from_slice(&hasher.finalize_reset());
        }

        key.truncate(size);
        key
    }
}

use digest::{Digest, FixedOutputReset};
use sesh_wire::{arch::MpInt, trans::KexInit, Id};
use ssh_key::PrivateKey;
use strum::{AsRefStr, EnumString};

use crate::{
    stream::{Buffered, Keys, Stream, Transport, TransportPair},
    Result,
};

use super::{Algorithms, Negotiated};

mod dh;
mod ecdh;

/// The callback verifying the server's host key on the client side.
pub(crate) type Verify<'v> = dyn Fn(&ssh_key::PublicKey) -> Result<()> + Send + Sync + 'v;

/// SSH key-exchange algorithms.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Eq, EnumString, AsRefStr)]
#[strum(serialize_all = "kebab-case")]
pub enum Kex {
    /// Curve25519 ECDH with sha-2-256 digest.
    Curve25519Sha256,

    /// Curve25519 ECDH with sha-2-256 digest (pre-RFC 8731).
    #[strum(serialize = "curve25519-sha256@libssh.org")]
    Curve25519Sha256Libssh,

    /// NIST P-256 ECDH with sha-2-256 digest.
    EcdhSha2Nistp256,

    /// NIST P-384 ECDH with sha-2-384 digest.
    EcdhSha2Nistp384,

    /// NIST P-521 ECDH with sha-2-512 digest.
    EcdhSha2Nistp521,

    /// Diffie-Hellman group negotiation with sha-2-256 digest.
    DiffieHellmanGroupExchangeSha256,

    /// Diffie-Hellman with the 2048-bit MODP group and sha-1 digest.
    DiffieHellmanGroup14Sha1,

    /// Diffie-Hellman with the 1024-bit Oakley group and sha-1 digest.
    DiffieHellmanGroup1Sha1,
}

impl Kex {
    pub(crate) async fn as_client(
        &self,
        stream: &mut Stream<impl Buffered>,
        v_c: &Id,
        v_s: &Id,
        i_c: &KexInit,
        i_s: &KexInit,
        algorithms: &Algorithms,
        verify: &Verify<'_>,
    ) -> Result<TransportPair> {
        let negotiated = Negotiated::negociate(algorithms, i_c, i_s)?;

        let (client_keys, server_keys) = match self {
            Self::Curve25519Sha256 | Self::Curve25519Sha256Libssh => {
                ecdh::curve25519_client::<sha2::Sha256>(stream, v_c, v_s, i_c, i_s, &negotiated, verify)
                    .await?
            }
            Self::EcdhSha2Nistp256 => {
                ecdh::nistp256_client::<sha2::Sha256>(stream, v_c, v_s, i_c, i_s, &negotiated, verify)
                    .await?
            }
            Self::EcdhSha2Nistp384 => {
                ecdh::nistp384_client::<sha2::Sha384>(stream, v_c, v_s, i_c, i_s, &negotiated, verify)
                    .await?
            }
            Self::EcdhSha2Nistp521 => {
                ecdh::nistp521_client::<sha2::Sha512>(stream, v_c, v_s, i_c, i_s, &negotiated, verify)
                    .await?
            }
            Self::DiffieHellmanGroupExchangeSha256 => {
                dh::gex_client::<sha2::Sha256>(stream, v_c, v_s, i_c, i_s, &negotiated, verify)
                    .await?
            }
            Self::DiffieHellmanGroup14Sha1 => {
                dh::group_client::<sha1::Sha1>(
                    stream,
                    v_c,
                    v_s,
                    i_c,
                    i_s,
                    &negotiated,
                    verify,
                    &dh::GROUP14_P,
                )
                .await?
            }
            Self::DiffieHellmanGroup1Sha1 => {
                dh::group_client::<sha1::Sha1>(
                    stream,
                    v_c,
                    v_s,
                    i_c,
                    i_s,
                    &negotiated,
                    verify,
                    &dh::GROUP1_P,
                )
                .await?
            }
        };

        Ok(pair(negotiated, client_keys, server_keys, Side::Client))
    }

    pub(crate) async fn as_server(
        &self,
        stream: &mut Stream<impl Buffered>,
        v_c: &Id,
        v_s: &Id,
        i_c: &KexInit,
        i_s: &KexInit,
        algorithms: &Algorithms,
        key: &PrivateKey,
    ) -> Result<TransportPair> {
        let negotiated = Negotiated::negociate(algorithms, i_c, i_s)?;

        let (client_keys, server_keys) = match self {
            Self::Curve25519Sha256 | Self::Curve25519Sha256Libssh => {
                ecdh::curve25519_server::<sha2::Sha256>(stream, v_c, v_s, i_c, i_s, &negotiated, key)
                    .await?
            }
            Self::EcdhSha2Nistp256 => {
                ecdh::nistp256_server::<sha2::Sha256>(stream, v_c, v_s, i_c, i_s, &negotiated, key)
                    .await?
            }
            Self::EcdhSha2Nistp384 => {
                ecdh::nistp384_server::<sha2::Sha384>(stream, v_c, v_s, i_c, i_s, &negotiated, key)
                    .await?
            }
            Self::EcdhSha2Nistp521 => {
                ecdh::nistp521_server::<sha2::Sha512>(stream, v_c, v_s, i_c, i_s, &negotiated, key)
                    .await?
            }
            Self::DiffieHellmanGroupExchangeSha256 => {
                dh::gex_server::<sha2::Sha256>(stream, v_c, v_s, i_c, i_s, &negotiated, key).await?
            }
            Self::DiffieHellmanGroup14Sha1 => {
                dh::group_server::<sha1::Sha1>(
                    stream,
                    v_c,
                    v_s,
                    i_c,
                    i_s,
                    &negotiated,
                    key,
                    &dh::GROUP14_P,
                )
                .await?
            }
            Self::DiffieHellmanGroup1Sha1 => {
                dh::group_server::<sha1::Sha1>(
                    stream,
                    v_c,
                    v_s,
                    i_c,
                    i_s,
                    &negotiated,
                    key,
                    &dh::GROUP1_P,
                )
                .await?
            }
        };

        Ok(pair(negotiated, client_keys, server_keys, Side::Server))
    }
}

enum Side {
    Client,
    Server,
}

/// Assemble the transport pair: the client-to-server algorithms drive
/// `tx` on the client and `rx` on the server, and symmetrically.
fn pair(negotiated: Negotiated, client_keys: Keys, server_keys: Keys, side: Side) -> TransportPair {
    let Negotiated {
        client_cipher,
        server_cipher,
        client_hmac,
        server_hmac,
        client_compress,
        server_compress,
    } = negotiated;

    let client = Transport {
        chain: client_keys,
        state: None,
        cipher: client_cipher,
        hmac: client_hmac,
        compress: client_compress,
    };
    let server = Transport {
        chain: server_keys,
        state: None,
        cipher: server_cipher,
        hmac: server_hmac,
        compress: server_compress,
    };

    match side {
        Side::Client => TransportPair {
            tx: client,
            rx: server,
        },
        Side::Server => TransportPair {
            tx: server,
            rx: client,
        },
    }
}

/// Derive both directions of key material once the session
/// identifier has been pinned on the stream.
fn derive<D: Digest + FixedOutputReset>(
    stream: &mut Stream<impl Buffered>,
    secret: &MpInt,
    hash: &[u8],
    negotiated: &Negotiated,
) -> (Keys, Keys) {
    let session_id = stream.with_session(hash).to_vec();

    (
        Keys::as_client::<D>(
            secret,
            hash,
            &session_id,
            &negotiated.client_cipher,
            &negotiated.client_hmac,
        ),
        Keys::as_server::<D>(
            secret,
            hash,
            &session_id,
            &negotiated.server_cipher,
            &negotiated.server_hmac,
        ),
    )
}

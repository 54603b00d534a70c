//! Client-[`Side`] implementation of the _session_.

use std::{sync::Arc, time::Duration};

use rand::RngCore;
use sesh_wire::{arch::NameList, trans::KexInit, Id};

use super::Side;
use crate::{
    algorithm::{self, Algorithms, Kex, Key},
    stream::{Buffered, RekeyThresholds, Stream, TransportPair},
    Error, Result,
};

/// The decision point for accepting a server's host key.
///
/// The connected endpoint is provided so implementations can key
/// their known-host records by `(hostname, port)`.
pub trait HostKeyVerifier: Send + Sync {
    /// Whether the `key` is acceptable for the given endpoint.
    fn accept(&self, hostname: &str, port: u16, key: &ssh_key::PublicKey) -> bool;
}

impl<F> HostKeyVerifier for F
where
    F: Fn(&str, u16, &ssh_key::PublicKey) -> bool + Send + Sync,
{
    fn accept(&self, hostname: &str, port: u16, key: &ssh_key::PublicKey) -> bool {
        (self)(hostname, port, key)
    }
}

/// The default [`HostKeyVerifier`], rejecting every key.
#[derive(Debug, Clone, Copy)]
pub struct Strict;

impl HostKeyVerifier for Strict {
    fn accept(&self, _: &str, _: u16, _: &ssh_key::PublicKey) -> bool {
        false
    }
}

/// A _client_-side session configuration.
#[derive(Clone)]
pub struct Client {
    /// [`Id`] for this _client_ session.
    pub id: Id,

    /// The endpoint this session connects to, handed to the verifier.
    pub hostname: String,

    /// The port this session connects to, handed to the verifier.
    pub port: u16,

    /// Timeout for sending and receiving packets.
    pub timeout: Duration,

    /// Interval between liveness probes, zero disables them.
    pub heartbeat: Duration,

    /// Thresholds triggering a key re-exchange.
    pub rekey: RekeyThresholds,

    /// The host key verification policy, strict by default.
    pub verifier: Arc<dyn HostKeyVerifier>,

    /// Acceptable algorithms for _server host key signatures_.
    pub keys: Vec<Key>,

    /// The algorithms enabled for this _client_ session.
    pub algorithms: Algorithms,
}

impl Default for Client {
    fn default() -> Self {
        Self {
            id: Id::v2(
                concat!(
                    env!("CARGO_PKG_NAME"),
                    "@client:",
                    env!("CARGO_PKG_VERSION")
                ),
                None::<&str>,
            ),
            hostname: Default::default(),
            port: 22,
            timeout: Duration::from_secs(120),
            heartbeat: Duration::ZERO,
            rekey: Default::default(),
            verifier: Arc::new(Strict),
            keys: vec![
                Key::Ed25519,
                Key::Ecdsa {
                    curve: ssh_key::EcdsaCurve::NistP521,
                },
                Key::Ecdsa {
                    curve: ssh_key::EcdsaCurve::NistP384,
                },
                Key::Ecdsa {
                    curve: ssh_key::EcdsaCurve::NistP256,
                },
                Key::Rsa {
                    hash: Some(ssh_key::HashAlg::Sha512),
                },
                Key::Rsa {
                    hash: Some(ssh_key::HashAlg::Sha256),
                },
                Key::Rsa { hash: None },
                Key::Dsa,
            ],
            algorithms: Default::default(),
        }
    }
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("id", &self.id)
            .field("hostname", &self.hostname)
            .field("port", &self.port)
            .field("algorithms", &self.algorithms)
            .finish_non_exhaustive()
    }
}

impl Side for Client {
    fn id(&self) -> &Id {
        &self.id
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }

    fn heartbeat(&self) -> Duration {
        self.heartbeat
    }

    fn rekey(&self) -> RekeyThresholds {
        self.rekey
    }

    fn kexinit(&self) -> KexInit {
        let mut cookie = [0u8; 16];
        rand::thread_rng().fill_bytes(&mut cookie);

        KexInit {
            cookie,
            kex_algorithms: self.algorithms.kexs.names().collect(),
            server_host_key_algorithms: NameList::from_iter(&self.keys),
            encryption_algorithms_client_to_server: self.algorithms.ciphers.names().collect(),
            encryption_algorithms_server_to_client: self.algorithms.ciphers.names().collect(),
            mac_algorithms_client_to_server: self.algorithms.macs.names().collect(),
            mac_algorithms_server_to_client: self.algorithms.macs.names().collect(),
            compression_algorithms_client_to_server: self
                .algorithms
                .compressions
                .names()
                .collect(),
            compression_algorithms_server_to_client: self
                .algorithms
                .compressions
                .names()
                .collect(),
            languages_client_to_server: Default::default(),
            languages_server_to_client: Default::default(),
            first_kex_packet_follows: false.into(),
        }
    }

    async fn exchange(
        &self,
        stream: &mut Stream<impl Buffered>,
        kexinit: &KexInit,
        peerkexinit: &KexInit,
        peer_id: &Id,
    ) -> Result<TransportPair> {
        let kex: Kex = kexinit
            .kex_algorithms
            .preferred_in(&peerkexinit.kex_algorithms)
            .and_then(|name| self.algorithms.kexs.resolve(name))
            .ok_or(Error::NoCommonKex)?;

        // Ensure the negotiation converges on the host key algorithm too.
        algorithm::key::negociate(kexinit, peerkexinit)?;

        let verify = |key: &ssh_key::PublicKey| {
            if self.verifier.accept(&self.hostname, self.port, key) {
                Ok(())
            } else {
                Err(Error::HostKeyRejected)
            }
        };

        kex.as_client(
            stream,
            self.id(),
            peer_id,
            kexinit,
            peerkexinit,
            &self.algorithms,
            &verify,
        )
        .await
    }
}

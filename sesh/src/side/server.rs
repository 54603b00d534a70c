//! Server-[`Side`] implementation of the _session_.

use std::time::Duration;

use rand::RngCore;
use sesh_wire::{arch::NameList, trans::KexInit, Id};

use super::Side;
use crate::{
    algorithm::{self, Algorithms, Kex},
    stream::{Buffered, RekeyThresholds, Stream, TransportPair},
    Error, Result,
};

#[doc(no_inline)]
pub use ssh_key::PrivateKey;

/// A _server_-side session configuration.
#[derive(Debug, Clone)]
pub struct Server {
    /// [`Id`] for this _server_ session.
    pub id: Id,

    /// Timeout for sending and receiving packets.
    pub timeout: Duration,

    /// Interval between liveness probes, zero disables them.
    pub heartbeat: Duration,

    /// Thresholds triggering a key re-exchange.
    pub rekey: RekeyThresholds,

    /// Server keys for the key-exchange signature.
    pub keys: Vec<PrivateKey>,

    /// The algorithms enabled for this _server_ session.
    pub algorithms: Algorithms,
}

impl Default for Server {
    fn default() -> Self {
        Self {
            id: Id::v2(
                concat!(
                    env!("CARGO_PKG_NAME"),
                    "@server:",
                    env!("CARGO_PKG_VERSION")
                ),
                None::<&str>,
            ),
            timeout: Duration::from_secs(120),
            heartbeat: Duration::ZERO,
            rekey: Default::default(),
            keys: Default::default(),
            algorithms: Default::default(),
        }
    }
}

impl Side for Server {
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
            server_host_key_algorithms: NameList::from_iter(
                self.keys.iter().map(PrivateKey::algorithm),
            ),
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
        let kex: Kex = peerkexinit
            .kex_algorithms
            .preferred_in(&kexinit.kex_algorithms)
            .and_then(|name| self.algorithms.kexs.resolve(name))
            .ok_or(Error::NoCommonKex)?;

        let alg = algorithm::key::negociate(peerkexinit, kexinit)?;
        let key = self
            .keys
            .iter()
            .find(|key| key.algorithm() == alg)
            .ok_or(Error::NoCommonKey)?;

        kex.as_server(
            stream,
            peer_id,
            self.id(),
            peerkexinit,
            kexinit,
            &self.algorithms,
            key,
        )
        .await
    }
}

//! Session [`Side`]s, either [`client::Client`] or [`server::Server`].

use std::time::Duration;

use futures::Future;
use sesh_wire::{trans::KexInit, Id};

use crate::{
    stream::{Buffered, RekeyThresholds, Stream, TransportPair},
    Result,
};

pub mod client;
pub mod server;

mod private {
    pub trait Sealed {}

    impl Sealed for super::client::Client {}
    impl Sealed for super::server::Server {}
}

/// A side of the SSH protocol, either [`client::Client`] or [`server::Server`].
pub trait Side: private::Sealed + Send + Sync + Unpin + 'static {
    /// Get the [`Id`] for this session.
    fn id(&self) -> &Id;

    /// Get the _timeout_ for packet sending and receiving.
    fn timeout(&self) -> Duration;

    /// Get the _heartbeat interval_ for liveness probing, zero disables.
    fn heartbeat(&self) -> Duration;

    /// Get the _rekey thresholds_ for this session.
    fn rekey(&self) -> RekeyThresholds;

    /// Generate a `SSH_MSG_KEXINIT` message from the config.
    fn kexinit(&self) -> KexInit;

    /// Exchange the keys from the config.
    fn exchange(
        &self,
        stream: &mut Stream<impl Buffered>,
        kexinit: &KexInit,
        peerkexinit: &KexInit,
        peer_id: &Id,
    ) -> impl Future<Output = Result<TransportPair>> + Send;
}

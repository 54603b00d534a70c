//! Primitives to extract and encode binary packets from/to a [`Pipe`] stream.

use futures::{AsyncBufReadExt, AsyncWriteExt, FutureExt};
use futures_time::{future::FutureExt as _, time::Duration};
use sesh_wire::IntoPacket;

use crate::{Error, Result};

/// Bound of the buffered byte stream the packet layer operates on.
pub trait Buffered: futures::AsyncBufRead + futures::AsyncWrite + Unpin + Send {}

impl<T: futures::AsyncBufRead + futures::AsyncWrite + Unpin + Send> Buffered for T {}

mod counter;
use counter::IoCounter;

mod transport;
pub use transport::{Transport, TransportPair};

mod keys;
pub use keys::Keys;

#[doc(no_inline)]
pub use sesh_wire::Packet;

/// Thresholds after which a key re-exchange is triggered,
/// whichever is reached first.
#[derive(Debug, Clone, Copy)]
pub struct RekeyThresholds {
    /// Raw bytes exchanged in both directions, defaults to 1GiB
    /// as recommended per the RFC.
    pub bytes: usize,

    /// Packets exchanged in both directions, defaults to 2³² - 1024.
    pub packets: u64,
}

impl Default for RekeyThresholds {
    fn default() -> Self {
        Self {
            bytes: 0x40000000,
            packets: u64::pow(2, 32) - 1024,
        }
    }
}

/// A wrapper around a [`Pipe`] to interface with the SSH binary packet protocol.
pub struct Stream<S> {
    inner: IoCounter<S>,
    timeout: Duration,
    rekey: RekeyThresholds,

    /// The pair of transport algorithms and keys computed from the key exchange.
    transport: TransportPair,

    /// The session identifier derived from the first key exchange.
    session: Option<Vec<u8>>,

    /// Sequence number for the `tx` side, wrapping at 2³².
    txseq: u32,

    /// Sequence number for the `rx` side, wrapping at 2³².
    rxseq: u32,

    /// Packets exchanged since the last key exchange.
    packets: u64,

    /// A buffer for the `peek` method.
    buffer: Option<Packet>,
}

impl<S> Stream<S>
where
    S: Buffered,
{
    pub(crate) fn new(stream: S, timeout: Duration, rekey: RekeyThresholds) -> Self {
        Self {
            inner: IoCounter::new(stream),
            timeout,
            rekey,
            transport: Default::default(),
            session: None,
            txseq: 0,
            rxseq: 0,
            packets: 0,
            buffer: None,
        }
    }

    /// Whether a (re-)key exchange is due: either no keys were derived yet,
    /// or one of the rekey thresholds has been crossed.
    pub(crate) fn rekeyable(&self) -> bool {
        self.session.is_none()
            || self.inner.count() > self.rekey.bytes
            || self.packets > self.rekey.packets
    }

    pub(crate) fn with_transport(&mut self, transport: TransportPair) {
        self.transport = transport;
        self.inner.reset();
        self.packets = 0;
    }

    /// Store the session identifier from the first exchange hash,
    /// keeping the existing one on subsequent key exchanges.
    pub(crate) fn with_session(&mut self, hash: &[u8]) -> &[u8] {
        self.session.get_or_insert_with(|| hash.to_vec())
    }

    /// The session identifier derived from the first key exchange.
    pub fn session_id(&self) -> Option<&[u8]> {
        self.session.as_deref()
    }

    /// The sequence number the next received packet will take.
    pub(crate) fn rxseq(&self) -> u32 {
        self.rxseq
    }

    /// Wait until data is available on the underlying stream.
    pub(crate) async fn fill_buf(&mut self) -> Result<()> {
        if self.buffer.is_some() {
            return Ok(());
        }

        self.inner.fill_buf().await?;

        Ok(())
    }

    /// Poll the stream to detect whether data is immediately readable.
    pub(crate) async fn is_readable(&mut self) -> Result<bool> {
        if self.buffer.is_some() {
            return Ok(true);
        }

        futures::select_biased! {
            buf = self.inner.fill_buf().fuse() => {
                buf?;

                Ok(true)
            }
            _ = futures::future::ready(()).fuse() => {
                Ok(false)
            }
        }
    }

    /// Receive and decrypt a _packet_ from the peer without removing it from the queue.
    pub(crate) async fn peek(&mut self) -> Result<&Packet> {
        let packet = self.recv().await?;

        Ok(self.buffer.insert(packet))
    }

    /// Receive and decrypt a _packet_ from the peer.
    pub(crate) async fn recv(&mut self) -> Result<Packet> {
        match self.buffer.take() {
            Some(packet) => Ok(packet),
            None => {
                let packet =
                    Packet::from_async_reader(&mut self.inner, &mut self.transport.rx, self.rxseq)
                        .timeout(self.timeout)
                        .await
                        .map_err(Error::from_io)??;

                tracing::trace!(
                    "<~- #{}: ^{:#x} ({} bytes)",
                    self.rxseq,
                    packet.message_id().unwrap_or_default(),
                    packet.payload.len(),
                );

                self.rxseq = self.rxseq.wrapping_add(1);
                self.packets += 1;

                Ok(packet)
            }
        }
    }

    /// Encrypt and send a _packet_ to the peer.
    pub(crate) async fn send(&mut self, packet: impl IntoPacket) -> Result<()> {
        let packet = packet.into_packet();

        packet
            .to_async_writer(&mut self.inner, &mut self.transport.tx, self.txseq)
            .timeout(self.timeout)
            .await
            .map_err(Error::from_io)??;
        self.inner.flush().await?;

        tracing::trace!(
            "-~> #{}: ^{:#x} ({} bytes)",
            self.txseq,
            packet.message_id().unwrap_or_default(),
            packet.payload.len(),
        );

        self.txseq = self.txseq.wrapping_add(1);
        self.packets += 1;

        Ok(())
    }
}

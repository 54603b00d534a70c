//! Session and transport handling mechanics.

use futures::io::BufReader;
use futures_time::future::FutureExt;
use sesh_wire::{
    trans::{Disconnect, DisconnectReason, KexInit, NewKeys, ServiceAccept, ServiceRequest},
    Id, IntoPacket, Packet,
};

use crate::{
    service,
    side::Side,
    stream::Stream,
    DisconnectedBy, DisconnectedError, Error, Pipe, Result,
};

mod state;
pub use state::State;

/// A session wrapping a [`Pipe`] byte stream to handle the
/// identification exchange, **key exchange**, **`SSH-TRANS`**
/// messages and the service multiplexing above them.
pub struct Session<I, S> {
    stream: Option<Stream<BufReader<I>>>,
    config: S,

    peer_id: Id,
    state: State,
    claims: service::Claims,
    disconnected: Option<DisconnectedError>,

    /// Packets legally in flight while a key re-exchange was being
    /// set up, surfaced again once the exchange completes.
    pending: std::collections::VecDeque<Packet>,
}

impl<I, S> Session<I, S>
where
    I: Pipe,
    S: Side,
{
    /// Create a new [`Session`] from a [`Pipe`] byte stream and some
    /// configuration, exchanging identification strings.
    pub async fn new(stream: I, config: S) -> Result<Self> {
        let mut stream = BufReader::new(stream);

        config.id().to_async_writer(&mut stream).await?;
        futures::AsyncWriteExt::flush(&mut stream).await?;

        let peer_id = Id::from_async_reader(&mut stream)
            .timeout(futures_time::time::Duration::from(config.timeout()))
            .await
            .map_err(Error::from_io)??;

        let stream = Stream::new(stream, config.timeout().into(), config.rekey());

        tracing::debug!("Session started with peer `{peer_id}`");

        Ok(Self {
            stream: Some(stream),
            config,
            peer_id,
            state: State::Preamble,
            claims: Default::default(),
            disconnected: None,
            pending: Default::default(),
        })
    }

    fn stream(&mut self) -> Result<&mut Stream<BufReader<I>>> {
        match (self.stream.as_mut(), &self.disconnected) {
            (Some(stream), _) => Ok(stream),
            (None, Some(err)) => Err(err.clone().into()),
            (None, None) => Err(DisconnectedError {
                by: DisconnectedBy::Us,
                reason: DisconnectReason::ByApplication,
                description: "The session has already been closed".into(),
            }
            .into()),
        }
    }

    /// Perform the key-exchange procedure, either initiated by us
    /// (`peerkexinit` empty) or in reaction to a peer `SSH_MSG_KEXINIT`.
    async fn kex(&mut self, peerkexinit: Option<KexInit>) -> Result<()> {
        tracing::debug!("Starting the key-exchange procedure");

        self.state = match self.state {
            State::Running | State::RekeyRequested => State::RekeyRequested,
            _ => State::KexInit,
        };

        let kexinit = self.config.kexinit();
        self.stream()?.send(&kexinit).await?;

        let peerkexinit = match peerkexinit {
            Some(peerkexinit) => peerkexinit,
            None => loop {
                // Non-kex traffic may legally be in flight until the peer
                // processes our `SSH_MSG_KEXINIT`.
                let packet = self.stream()?.recv().await?;

                match packet.message_id() {
                    Some(20) => break packet.to::<KexInit>()?,
                    Some(2) | Some(4) => continue,
                    Some(1) => return Err(self.on_disconnect(&packet)?.into()),
                    _ => self.pending.push_back(packet),
                }
            },
        };

        self.state = match self.state {
            State::RekeyRequested => State::RekeyRunning,
            _ => State::KexRun,
        };

        // A mispredicted guess packet is discarded before the actual exchange.
        if *peerkexinit.first_kex_packet_follows
            && (kexinit.kex_algorithms.into_iter().next()
                != peerkexinit.kex_algorithms.into_iter().next()
                || kexinit.server_host_key_algorithms.into_iter().next()
                    != peerkexinit.server_host_key_algorithms.into_iter().next())
        {
            let guess = self.stream()?.recv().await?;

            tracing::debug!(
                "Discarded a mispredicted key-exchange guess packet (^{:#x})",
                guess.message_id().unwrap_or_default()
            );
        }

        let transport = {
            let Self {
                stream,
                config,
                peer_id,
                ..
            } = &mut *self;
            let Some(stream) = stream.as_mut() else {
                return Err(Error::UnexpectedMessage);
            };

            config
                .exchange(stream, &kexinit, &peerkexinit, peer_id)
                .await?
        };

        self.stream()?.send(&NewKeys).await?;
        self.stream()?.recv().await?.to::<NewKeys>()?;
        self.state = State::NewKeys;

        tracing::debug!(
            "Key exchange success, negotiated algorithms:\nrx: {:?}\ntx: {:?}",
            transport.rx,
            transport.tx,
        );

        self.stream()?.with_transport(transport);
        self.state = State::Running;

        Ok(())
    }

    /// Register a received `SSH_MSG_DISCONNECT` and close the session
    /// without replying.
    fn on_disconnect(&mut self, packet: &Packet) -> Result<DisconnectedError> {
        let disconnect = packet.to::<Disconnect>()?;

        self.stream = None;
        self.state = State::Closed;

        let err = DisconnectedError {
            by: DisconnectedBy::Them,
            reason: disconnect.reason,
            description: disconnect.description.into_string(),
        };
        self.disconnected = Some(err.clone());

        Ok(err)
    }

    /// Receive one packet from the stream, probing the peer with
    /// `SSH_MSG_IGNORE` at the configured heartbeat interval.
    async fn recv_packet(&mut self) -> Result<Packet> {
        let heartbeat = self.config.heartbeat();

        if heartbeat.is_zero() {
            return self.stream()?.recv().await;
        }

        let max_probes = (self.config.timeout().as_secs() / heartbeat.as_secs().max(1)).max(1);
        let mut probes = 0;

        loop {
            // The timer only gates the wait for the first byte: once a
            // packet starts arriving its read cannot be cancelled, or
            // the stream would desynchronize.
            match self
                .stream()?
                .fill_buf()
                .timeout(futures_time::time::Duration::from(heartbeat))
                .await
            {
                Ok(result) => {
                    result?;

                    break self.stream()?.recv().await;
                }
                Err(_) => {
                    probes += 1;
                    if probes >= max_probes {
                        // A silent peer past the session timeout is torn down.
                        break Err(Error::Timeout);
                    }

                    self.stream()?
                        .send(&sesh_wire::trans::Ignore {
                            data: Default::default(),
                        })
                        .await?;
                }
            }
        }
    }

    /// Whether an error poisons the whole session, warranting
    /// a `SSH_MSG_DISCONNECT` and a teardown.
    fn is_fatal(err: &Error) -> bool {
        !matches!(err, Error::Io(_) | Error::Disconnected(_))
    }

    /// Emit a best-effort `SSH_MSG_DISCONNECT` describing `err`
    /// and tear the session down.
    async fn fail(&mut self, err: Error) -> Error {
        let reason = match &err {
            Error::Integrity(_) => DisconnectReason::MacError,
            Error::Signature(_)
            | Error::KexError
            | Error::NoCommonKex
            | Error::NoCommonKey
            | Error::NoCommonCipher
            | Error::NoCommonHmac
            | Error::NoCommonCompression => DisconnectReason::KeyExchangeFailed,
            Error::HostKeyRejected => DisconnectReason::HostKeyNotVerifiable,
            Error::Timeout => DisconnectReason::ConnectionLost,
            _ => DisconnectReason::ProtocolError,
        };

        let _ = self.disconnect(reason, err.to_string()).await;

        err
    }

    /// Receive a [`Packet`] from the stream, transparently handling
    /// transport-level messages and key re-exchanges.
    ///
    /// Fatal protocol or cryptographic errors emit a best-effort
    /// `SSH_MSG_DISCONNECT` before surfacing.
    pub async fn recv(&mut self) -> Result<Packet> {
        match self.recv_inner().await {
            Err(err) if Self::is_fatal(&err) && self.stream.is_some() => {
                Err(self.fail(err).await)
            }
            result => result,
        }
    }

    async fn recv_inner(&mut self) -> Result<Packet> {
        loop {
            if self.stream()?.rekeyable() {
                self.kex(None).await?;
            }

            let packet = match self.pending.pop_front() {
                Some(packet) => packet,
                None => self.recv_packet().await?,
            };

            match packet.message_id() {
                Some(1) => {
                    break Err(self.on_disconnect(&packet)?.into());
                }
                Some(2) => {
                    tracing::debug!("Received an 'ignore' message");
                }
                Some(3) => {
                    let unimplemented = packet.to::<sesh_wire::trans::Unimplemented>()?;
                    tracing::debug!(
                        "Received an 'unimplemented' message about packet #{}",
                        unimplemented.seq
                    );
                }
                Some(4) => {
                    let debug_msg = packet.to::<sesh_wire::trans::Debug>()?;
                    tracing::debug!("Received a 'debug' message: {}", &*debug_msg.message);
                }
                Some(20) => {
                    self.kex(Some(packet.to::<KexInit>()?)).await?;
                }
                Some(5 | 6) => break Ok(packet),
                Some(id) if self.claims.owns(id) => break Ok(packet),
                Some(id) => {
                    // Unknown message numbers are answered with
                    // `SSH_MSG_UNIMPLEMENTED`, and the session survives.
                    let seq = self.stream()?.rxseq().wrapping_sub(1);

                    tracing::warn!("Unhandled message ^{id:#x} (#{seq}), reporting as unimplemented");

                    self.stream()?
                        .send(&sesh_wire::trans::Unimplemented { seq })
                        .await?;
                }
                None => break Err(Error::UnexpectedMessage),
            }
        }
    }

    /// Send a message to the stream, handling any key re-exchange
    /// requested by either side beforehand.
    ///
    /// Fatal protocol or cryptographic errors emit a best-effort
    /// `SSH_MSG_DISCONNECT` before surfacing.
    pub async fn send(&mut self, message: impl IntoPacket) -> Result<()> {
        match self.send_inner(message).await {
            Err(err) if Self::is_fatal(&err) && self.stream.is_some() => {
                Err(self.fail(err).await)
            }
            result => result,
        }
    }

    async fn send_inner(&mut self, message: impl IntoPacket) -> Result<()> {
        if self.stream()?.is_readable().await? {
            let packet = self.stream()?.peek().await?;

            if packet.to::<KexInit>().is_ok() {
                let kexinit = self.stream()?.recv().await?.to::<KexInit>()?;
                self.kex(Some(kexinit)).await?;
            }
        }

        if self.stream()?.rekeyable() {
            self.kex(None).await?;
        }

        self.stream()?.send(message).await
    }

    /// Wait until a packet is immediately readable from the stream.
    ///
    /// Buffered packets count as readable, so a subsequent
    /// [`Session::recv`] completes without further I/O suspension.
    pub async fn readable(&mut self) -> Result<()> {
        if !self.pending.is_empty() {
            return Ok(());
        }

        self.stream()?.fill_buf().await
    }

    /// Send a `SSH_MSG_DISCONNECT` message to the peer and
    /// close the session.
    pub async fn disconnect(
        &mut self,
        reason: DisconnectReason,
        description: impl Into<String>,
    ) -> DisconnectedError {
        let description = description.into();

        if let Some(mut stream) = self.stream.take() {
            stream
                .send(&Disconnect {
                    reason: reason.clone(),
                    description: description.clone().into(),
                    language: Default::default(),
                })
                .await
                .ok();
        }
        self.state = State::Closed;

        let err = DisconnectedError {
            by: DisconnectedBy::Us,
            reason,
            description,
        };
        self.disconnected = Some(err.clone());

        err
    }

    /// Request a _service_ from the peer, as a client.
    pub async fn request<R: service::Request>(mut self, service: R) -> Result<R::Ok<I, S>, R::Err> {
        self.send(&ServiceRequest {
            service_name: R::SERVICE_NAME.into(),
        })
        .await
        .map_err(R::Err::from)?;

        let packet = self.recv().await.map_err(R::Err::from)?;
        if let Ok(accept) = packet.to::<ServiceAccept>() {
            if &*accept.service_name == R::SERVICE_NAME {
                self.claim(R::SERVICE_NAME, R::CLAIM);

                service.on_accept(self).await
            } else {
                let _ = self
                    .disconnect(
                        DisconnectReason::ServiceNotAvailable,
                        "Accepted service is unknown, aborting.",
                    )
                    .await;

                Err(R::Err::from(Error::UnknownService))
            }
        } else {
            let _ = self
                .disconnect(
                    DisconnectReason::ProtocolError,
                    "Unexpected message outside of a service response, aborting.",
                )
                .await;

            Err(R::Err::from(Error::UnexpectedMessage))
        }
    }

    /// Handle a _service_ request from the peer, as a server.
    pub async fn handle<H: service::Handler>(mut self, handler: H) -> Result<H::Ok<I, S>, H::Err> {
        let packet = self.recv().await.map_err(H::Err::from)?;

        if let Ok(request) = packet.to::<ServiceRequest>() {
            if &*request.service_name == H::SERVICE_NAME {
                self.send(&ServiceAccept {
                    service_name: request.service_name,
                })
                .await
                .map_err(H::Err::from)?;
                self.claim(H::SERVICE_NAME, H::CLAIM);

                handler.on_request(self).await
            } else {
                let _ = self
                    .disconnect(
                        DisconnectReason::ServiceNotAvailable,
                        "Requested service is unknown, aborting.",
                    )
                    .await;

                Err(H::Err::from(Error::UnknownService))
            }
        } else {
            let _ = self
                .disconnect(
                    DisconnectReason::ProtocolError,
                    "Unexpected message outside of a service request, aborting.",
                )
                .await;

            Err(H::Err::from(Error::UnexpectedMessage))
        }
    }

    /// Declare a service's claim over a range of message numbers,
    /// making [`Session::recv`] surface them to the caller.
    ///
    /// # Panics
    /// Overlapping claims are a programming error and cause a panic
    /// at registration time.
    pub fn claim(&mut self, name: &'static str, range: std::ops::RangeInclusive<u8>) {
        self.claims.claim(name, range);
    }

    /// Get the [`Id`] of the connected peer.
    pub fn peer_id(&self) -> &Id {
        &self.peer_id
    }

    /// The session identifier derived from the first key exchange.
    pub fn session_id(&self) -> Option<&[u8]> {
        self.stream.as_ref().and_then(Stream::session_id)
    }

    /// The current [`State`] of the transport state machine.
    pub fn state(&self) -> &State {
        &self.state
    }
}

impl<I, S> std::fmt::Debug for Session<I, S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("peer_id", &self.peer_id)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

//! Facilities to interact with the SSH _connect_ service.

use dashmap::{DashMap, DashSet};
use futures::{
    lock::{Mutex, MutexGuard},
    task::{self, AtomicWaker},
    FutureExt, SinkExt, TryStream,
};
use sesh::{side::Side, Pipe, Session};
use sesh_wire::{connect, IntoPacket, Packet};

use crate::{
    channel,
    channel_open::{self, ChannelOpenContext},
    global_request::{self, GlobalRequestContext},
    poller::Poller,
    Error, Interest, Result,
};

/// A wrapper around a [`Session`] to interact with the `ssh-connection`
/// service: opening channels and exchanging global requests.
pub struct Connect<IO: Pipe, S: Side> {
    pub(crate) poller: Mutex<Poller<IO, S>>,
    pub(crate) channels: DashSet<u32>,
    pub(crate) config: crate::Service,

    interests: DashMap<Interest, AtomicWaker>,
    buffer: Mutex<Option<Packet>>,
}

impl<IO: Pipe, S: Side> Connect<IO, S> {
    pub(crate) fn new(session: Session<IO, S>, config: crate::Service) -> Self {
        Self {
            poller: Mutex::new(Poller::from(session)),
            channels: Default::default(),
            config,

            interests: Default::default(),
            buffer: Default::default(),
        }
    }

    /// Send a message through the shared poller.
    pub(crate) async fn send(&self, message: impl IntoPacket) -> Result<()> {
        let mut poller = self.poller.lock().await;
        poller.send(message.into_packet()).await?;

        Ok(())
    }

    /// Best-effort, non-suspending send used from `Drop` implementations.
    pub(crate) fn try_feed(&self, message: impl IntoPacket) -> bool {
        match self.poller.try_lock() {
            Some(mut poller) => poller.try_feed(message.into_packet()),
            None => false,
        }
    }

    fn poll_recv(
        &self,
        cx: &mut task::Context,
    ) -> task::Poll<sesh::Result<MutexGuard<'_, Option<Packet>>>> {
        let mut buffer = futures::ready!(self.buffer.lock().poll_unpin(cx));

        if buffer.is_none() {
            let poller = futures::ready!(self.poller.lock().poll_unpin(cx));
            let mut poller = std::pin::Pin::new(poller);

            if let Some(res) = futures::ready!(futures::Stream::poll_next(poller.as_mut(), cx)) {
                *buffer = Some(res?);
            }
        }

        task::Poll::Ready(Ok(buffer))
    }

    /// Poll for the next packet matching `interest`, waking the
    /// interested task when another one's packet arrives instead.
    pub(crate) fn poll_take(
        &self,
        cx: &mut task::Context,
        interest: Interest,
    ) -> task::Poll<Option<sesh::Result<Packet>>> {
        // An unregistered interest means the session is over and the
        // table has been torn down, there is nothing left to deliver.
        if let Some(waker) = self.interests.get(&interest) {
            waker.register(cx.waker());
        } else {
            return task::Poll::Ready(None);
        }

        let mut buffer = futures::ready!(self.poll_recv(cx))?;

        match buffer.take() {
            None => {
                // The session is over, wake everyone up to notice it.
                self.interests.remove(&interest);
                for waker in self.interests.iter() {
                    waker.wake();
                }
                self.interests.clear();

                task::Poll::Ready(None)
            }
            Some(packet) => {
                let packet_interest = Interest::from(&packet);

                if interest == packet_interest {
                    task::Poll::Ready(Some(Ok(packet)))
                } else {
                    match self.interests.get(&packet_interest) {
                        Some(waker) => {
                            *buffer = Some(packet);

                            waker.wake();
                            task::Poll::Pending
                        }
                        None => {
                            tracing::warn!(
                                "Dropped {} bytes, no task interested in `{packet_interest:?}`",
                                packet.payload.len()
                            );

                            cx.waker().wake_by_ref();
                            task::Poll::Pending
                        }
                    }
                }
            }
        }
    }

    pub(crate) fn register(&self, interest: Interest) {
        // This is a genuine programming error from the user of the crate,
        // and could cause all sorts of runtime inconsistencies.
        #[allow(clippy::panic)]
        if self
            .interests
            .insert(interest, Default::default())
            .is_some()
        {
            panic!("Unable to register multiple concurrent interests for `{interest:?}`");
        }

        tracing::trace!("Registered interest for `{interest:?}`");
    }

    pub(crate) fn unregister(&self, interest: &Interest) {
        self.interests.remove(interest);

        tracing::trace!("Unregistered interest for `{interest:?}`");
    }

    /// The lowest channel identifier not currently in use.
    fn local_id(&self) -> u32 {
        (0..)
            .find(|id| !self.channels.contains(id))
            .expect("exhausted the channel identifier space")
    }

    /// Request a new _channel_ with the provided `context`.
    pub async fn channel_open(
        &self,
        context: ChannelOpenContext,
    ) -> Result<channel_open::Response<'_, IO, S>> {
        let local_id = self.local_id();
        self.channels.insert(local_id);

        let interest = Interest::ChannelOpenResponse(local_id);
        self.register(interest);

        let result = async {
            self.send(&connect::ChannelOpen {
                sender_channel: local_id,
                initial_window_size: self.config.window_size,
                maximum_packet_size: self.config.max_packet,
                context,
            })
            .await?;

            futures::future::poll_fn(|cx| self.poll_take(cx, interest))
                .await
                .ok_or(Error::ChannelClosed)?
                .map_err(Error::from)
        }
        .await;

        self.unregister(&interest);

        let packet = match result {
            Ok(packet) => packet,
            Err(err) => {
                self.channels.remove(&local_id);

                return Err(err);
            }
        };

        if let Ok(confirmation) = packet.to::<connect::ChannelOpenConfirmation>() {
            Ok(channel_open::Response::Success(channel::Channel::new(
                self,
                local_id,
                confirmation.sender_channel,
                confirmation.initial_window_size,
                confirmation.maximum_packet_size,
            )))
        } else if let Ok(failure) = packet.to::<connect::ChannelOpenFailure>() {
            self.channels.remove(&local_id);

            Ok(channel_open::Response::Failure {
                reason: failure.reason,
                description: failure.description.into_string(),
            })
        } else {
            self.channels.remove(&local_id);

            Err(Error::Transport(sesh::Error::UnexpectedMessage))
        }
    }

    /// Iterate over the incoming _channel open requests_ from the peer.
    pub fn channel_opens(
        &self,
    ) -> impl TryStream<Ok = channel_open::ChannelOpen<'_, IO, S>, Error = Error> + '_ {
        const INTEREST: Interest = Interest::ChannelOpen;

        self.register(INTEREST);
        let unregister_on_drop = defer::defer(|| self.unregister(&INTEREST));

        futures::stream::poll_fn(move |cx| {
            let _moved = &unregister_on_drop;

            self.poll_take(cx, INTEREST)
                .map(|polled| {
                    polled.map(|result| {
                        result.map_err(Error::from).and_then(|packet| {
                            Ok(channel_open::ChannelOpen::new(
                                self,
                                packet.to::<connect::ChannelOpen>().map_err(sesh::Error::from)?,
                            ))
                        })
                    })
                })
        })
    }

    /// Make a _global request_ with the provided `context`.
    pub async fn global_request(
        &self,
        context: GlobalRequestContext,
    ) -> Result<global_request::Response> {
        const INTEREST: Interest = Interest::GlobalResponse;

        let with_port = matches!(context, GlobalRequestContext::TcpipForward { bind_port: 0, .. });

        self.register(INTEREST);

        let result = async {
            self.send(&connect::GlobalRequest {
                want_reply: true.into(),
                context,
            })
            .await?;

            futures::future::poll_fn(|cx| self.poll_take(cx, INTEREST))
                .await
                .ok_or(Error::ChannelClosed)?
                .map_err(Error::from)
        }
        .await;

        self.unregister(&INTEREST);
        let packet = result?;

        if packet.to::<connect::RequestFailure>().is_ok() {
            Ok(global_request::Response::Rejected)
        } else if with_port {
            if let Ok(connect::ForwardingSuccess { bound_port }) = packet.to() {
                Ok(global_request::Response::AcceptedPort(bound_port))
            } else {
                Err(Error::Transport(sesh::Error::UnexpectedMessage))
            }
        } else if packet.to::<connect::RequestSuccess>().is_ok() {
            Ok(global_request::Response::Accepted)
        } else {
            Err(Error::Transport(sesh::Error::UnexpectedMessage))
        }
    }

    /// Iterate over the incoming _global requests_ from the peer.
    pub fn global_requests(
        &self,
    ) -> impl TryStream<Ok = global_request::GlobalRequest<'_, IO, S>, Error = Error> + '_ {
        const INTEREST: Interest = Interest::GlobalRequest;

        self.register(INTEREST);
        let unregister_on_drop = defer::defer(|| self.unregister(&INTEREST));

        futures::stream::poll_fn(move |cx| {
            let _moved = &unregister_on_drop;

            self.poll_take(cx, INTEREST)
                .map(|polled| {
                    polled.map(|result| {
                        result.map_err(Error::from).and_then(|packet| {
                            Ok(global_request::GlobalRequest::new(
                                self,
                                packet
                                    .to::<connect::GlobalRequest>()
                                    .map_err(sesh::Error::from)?,
                            ))
                        })
                    })
                })
        })
    }
}

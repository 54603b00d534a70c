//! Definition of the [`Channel`] struct providing multiplexed I/O
//! over an opened SSH channel.

use std::sync::atomic::{AtomicBool, Ordering};

use futures::{task, AsyncRead, AsyncWrite, TryStream};
use sesh::{side::Side, Pipe};
use sesh_wire::{connect, Packet};

use crate::{connect::Connect, Error, Interest, Result};

#[doc(no_inline)]
pub use sesh_wire::connect::ChannelRequestContext;

mod io;

mod window;
pub(crate) use window::{LocalWindow, RemoteWindow};

pub mod request;

/// A reference to an opened channel in the session.
///
/// The channel stays open until both sides have exchanged
/// `SSH_MSG_CHANNEL_CLOSE`, see [`Channel::close`].
pub struct Channel<'a, IO: Pipe, S: Side> {
    connect: &'a Connect<IO, S>,

    local_id: u32,
    local_window: LocalWindow,

    remote_id: u32,
    remote_window: RemoteWindow,
    remote_maxpack: u32,

    eof_sent: AtomicBool,
    eof_received: AtomicBool,
    close_sent: AtomicBool,
    close_received: AtomicBool,
}

impl<'a, IO: Pipe, S: Side> Channel<'a, IO, S> {
    pub(crate) fn new(
        connect: &'a Connect<IO, S>,
        local_id: u32,
        remote_id: u32,
        remote_window: u32,
        remote_maxpack: u32,
    ) -> Self {
        connect.register(Interest::ChannelClose(local_id));
        connect.register(Interest::ChannelEof(local_id));
        connect.register(Interest::ChannelWindowAdjust(local_id));

        tracing::debug!("Channel {local_id}:{remote_id} opened");

        Self {
            connect,

            local_id,
            local_window: LocalWindow::new(connect.config.window_size),

            remote_id,
            remote_window: RemoteWindow::from(remote_window),
            remote_maxpack,

            eof_sent: AtomicBool::new(false),
            eof_received: AtomicBool::new(false),
            close_sent: AtomicBool::new(false),
            close_received: AtomicBool::new(false),
        }
    }

    /// The channel identifier on our side of the session.
    pub fn local_id(&self) -> u32 {
        self.local_id
    }

    /// The channel identifier on the peer's side of the session.
    pub fn remote_id(&self) -> u32 {
        self.remote_id
    }

    /// Service the channel's bookkeeping messages (close, EOF and
    /// window adjustments) before polling for the requested interest.
    fn poll_take(
        &self,
        cx: &mut task::Context,
        interest: Interest,
    ) -> task::Poll<Option<sesh::Result<Packet>>> {
        if !self.close_received.load(Ordering::SeqCst) {
            if let task::Poll::Ready(Some(result)) = self
                .connect
                .poll_take(cx, Interest::ChannelClose(self.local_id))
            {
                result?;

                self.close_received.store(true, Ordering::SeqCst);

                tracing::debug!("Peer closed channel {}:{}", self.local_id, self.remote_id);
            }
        }

        if !self.close_received.load(Ordering::SeqCst) {
            if let task::Poll::Ready(Some(result)) = self
                .connect
                .poll_take(cx, Interest::ChannelEof(self.local_id))
            {
                result?;

                self.eof_received.store(true, Ordering::SeqCst);

                tracing::debug!(
                    "Peer sent an end-of-file for channel {}:{}",
                    self.local_id,
                    self.remote_id
                );
            }

            if let task::Poll::Ready(Some(result)) = self
                .connect
                .poll_take(cx, Interest::ChannelWindowAdjust(self.local_id))
            {
                let bytes = result?
                    .to::<connect::ChannelWindowAdjust>()
                    .map_err(sesh::Error::from)?
                    .bytes_to_add;
                self.remote_window.replenish(bytes);

                tracing::debug!(
                    "Peer extended the window by `{bytes}` bytes for channel {}:{}",
                    self.local_id,
                    self.remote_id
                );
            }
        }

        // A closed channel produces no further packets: data readers
        // observe an end-of-file and pending exchanges are cut short.
        if self.close_received.load(Ordering::SeqCst) {
            return task::Poll::Ready(None);
        }

        if self.eof_received.load(Ordering::SeqCst)
            && matches!(
                interest,
                Interest::ChannelData(_) | Interest::ChannelExtendedData(_)
            )
        {
            return task::Poll::Ready(None);
        }

        self.connect.poll_take(cx, interest)
    }

    /// Iterate over the incoming _channel requests_.
    pub fn requests(&self) -> impl TryStream<Ok = request::Request<'_, IO, S>, Error = Error> + '_ {
        let interest = Interest::ChannelRequest(self.local_id);

        self.connect.register(interest);
        let unregister_on_drop = defer::defer(move || self.connect.unregister(&interest));

        futures::stream::poll_fn(move |cx| {
            let _moved = &unregister_on_drop;

            self.poll_take(cx, interest).map(|polled| {
                polled.map(|result| {
                    result.map_err(Error::from).and_then(|packet| {
                        Ok(request::Request::new(
                            self,
                            packet
                                .to::<connect::ChannelRequest>()
                                .map_err(sesh::Error::from)?,
                        ))
                    })
                })
            })
        })
    }

    /// Send a _channel request_ without asking for a reply.
    pub async fn request(&self, context: ChannelRequestContext) -> Result<()> {
        self.connect
            .send(&connect::ChannelRequest {
                recipient_channel: self.remote_id,
                want_reply: false.into(),
                context,
            })
            .await
    }

    /// Send a _channel request_ and wait for the peer's response.
    ///
    /// Responses are matched in emission order, as the protocol
    /// guarantees first-in first-out replies on a channel.
    pub async fn request_wait(&self, context: ChannelRequestContext) -> Result<()> {
        let interest = Interest::ChannelResponse(self.local_id);
        self.connect.register(interest);

        let result = async {
            self.connect
                .send(&connect::ChannelRequest {
                    recipient_channel: self.remote_id,
                    want_reply: true.into(),
                    context,
                })
                .await?;

            futures::future::poll_fn(|cx| self.poll_take(cx, interest))
                .await
                .ok_or(Error::ChannelClosed)?
                .map_err(Error::from)
        }
        .await;

        self.connect.unregister(&interest);

        let packet = result?;
        if packet.to::<connect::ChannelSuccess>().is_ok() {
            Ok(())
        } else if packet.to::<connect::ChannelFailure>().is_ok() {
            Err(Error::RequestFailure)
        } else {
            Err(Error::Transport(sesh::Error::UnexpectedMessage))
        }
    }

    /// Make a reader for the channel's _data_ stream.
    #[must_use]
    pub fn as_reader(&self) -> impl AsyncRead + '_ {
        io::Read::new(self, None)
    }

    /// Make a reader for the channel's _extended data_ stream,
    /// conventionally the standard error stream.
    #[must_use]
    pub fn as_reader_ext(&self, ext: connect::ChannelExtendedDataType) -> impl AsyncRead + '_ {
        io::Read::new(self, Some(ext))
    }

    /// Make a writer for the channel's _data_ stream.
    ///
    /// ## Note:
    /// The writer does not flush on [`Drop`], the caller is responsible
    /// for calling [`futures::AsyncWriteExt::flush`] before dropping.
    #[must_use]
    pub fn as_writer(&self) -> impl AsyncWrite + '_ {
        io::Write::new(self, None)
    }

    /// Make a writer for the channel's _extended data_ stream.
    ///
    /// ## Note:
    /// The writer does not flush on [`Drop`], the caller is responsible
    /// for calling [`futures::AsyncWriteExt::flush`] before dropping.
    #[must_use]
    pub fn as_writer_ext(&self, ext: connect::ChannelExtendedDataType) -> impl AsyncWrite + '_ {
        io::Write::new(self, Some(ext))
    }

    /// Signal to the peer we won't send any more data on this channel.
    pub async fn eof(&self) -> Result<()> {
        if self.eof_sent.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        self.connect
            .send(&connect::ChannelEof {
                recipient_channel: self.remote_id,
            })
            .await
    }

    /// Close the channel: send our `SSH_MSG_CHANNEL_CLOSE` and wait
    /// for the peer's, after which the local identifier is released.
    pub async fn close(self) -> Result<()> {
        if !self.close_sent.swap(true, Ordering::SeqCst) {
            self.connect
                .send(&connect::ChannelClose {
                    recipient_channel: self.remote_id,
                })
                .await?;
        }

        futures::future::poll_fn(|cx| {
            if self.close_received.load(Ordering::SeqCst) {
                return task::Poll::Ready(Ok(()));
            }

            match self.poll_take(cx, Interest::ChannelClose(self.local_id)) {
                task::Poll::Ready(Some(Ok(_)) | None) => task::Poll::Ready(Ok(())),
                task::Poll::Ready(Some(Err(err))) => task::Poll::Ready(Err(Error::from(err))),
                task::Poll::Pending => task::Poll::Pending,
            }
        })
        .await?;

        self.close_received.store(true, Ordering::SeqCst);

        Ok(())
    }
}

impl<IO: Pipe, S: Side> Drop for Channel<'_, IO, S> {
    fn drop(&mut self) {
        self.connect
            .unregister(&Interest::ChannelWindowAdjust(self.local_id));
        self.connect.unregister(&Interest::ChannelEof(self.local_id));
        self.connect
            .unregister(&Interest::ChannelClose(self.local_id));

        if !self.close_sent.swap(true, Ordering::SeqCst) {
            self.connect.try_feed(&connect::ChannelClose {
                recipient_channel: self.remote_id,
            });
        }

        // The identifier is only reusable once the close handshake
        // completed in both directions.
        if self.close_received.load(Ordering::SeqCst) {
            self.connect.channels.remove(&self.local_id);
        }

        tracing::debug!("Channel {}:{} released", self.local_id, self.remote_id);
    }
}

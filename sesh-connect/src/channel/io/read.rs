use std::{
    collections::VecDeque,
    io::{self, Read as _},
    pin::Pin,
    task,
};

use futures::SinkExt;
use sesh::{side::Side, Pipe};
use sesh_wire::{connect, trans, IntoPacket};

use crate::{channel::Channel, Interest};

pub struct Read<'a, IO: Pipe, S: Side> {
    channel: &'a Channel<'a, IO, S>,
    ext: Option<connect::ChannelExtendedDataType>,

    buffer: VecDeque<u8>,
}

impl<'a, IO: Pipe, S: Side> Read<'a, IO, S> {
    pub fn new(channel: &'a Channel<'a, IO, S>, ext: Option<connect::ChannelExtendedDataType>) -> Self {
        channel.connect.register(match ext {
            None => Interest::ChannelData(channel.local_id),
            Some(_) => Interest::ChannelExtendedData(channel.local_id),
        });

        Self {
            channel,
            ext,

            buffer: Default::default(),
        }
    }

    fn interest(&self) -> Interest {
        match self.ext {
            None => Interest::ChannelData(self.channel.local_id),
            Some(_) => Interest::ChannelExtendedData(self.channel.local_id),
        }
    }

    /// Hand consumed credit back to the peer when the window ran low,
    /// piggybacking on the poller when it is ready to send.
    fn adjust_window(&mut self, cx: &mut task::Context) {
        let Some(mut poller) = self.channel.connect.poller.try_lock() else {
            return;
        };

        if poller.poll_ready_unpin(cx).is_ready() {
            if let Some(bytes_to_add) = self.channel.local_window.adjustable() {
                let packet = connect::ChannelWindowAdjust {
                    recipient_channel: self.channel.remote_id,
                    bytes_to_add,
                }
                .into_packet();

                poller.start_send_unpin(packet).ok();

                tracing::debug!(
                    "Extended the window by `{}` bytes for channel {}:{}",
                    bytes_to_add,
                    self.channel.local_id,
                    self.channel.remote_id,
                );
            }
        }
    }
}

impl<IO: Pipe, S: Side> futures::AsyncRead for Read<'_, IO, S> {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut task::Context<'_>,
        buf: &mut [u8],
    ) -> task::Poll<io::Result<usize>> {
        self.adjust_window(cx);

        if self.buffer.is_empty() {
            let polled = self.channel.poll_take(cx, self.interest());

            if let Some(packet) = futures::ready!(polled) {
                let packet =
                    packet.map_err(|err| io::Error::new(io::ErrorKind::BrokenPipe, err))?;

                let data = if self.ext.is_none() {
                    packet
                        .to::<connect::ChannelData>()
                        .map_err(|err| io::Error::new(io::ErrorKind::InvalidData, err))?
                        .data
                } else {
                    packet
                        .to::<connect::ChannelExtendedData>()
                        .map_err(|err| io::Error::new(io::ErrorKind::InvalidData, err))?
                        .data
                };

                if let Err(excess) = self.channel.local_window.consume(data.len() as u32) {
                    // A window overrun is a protocol violation: report it
                    // to the peer and poison the session.
                    self.channel.connect.try_feed(&trans::Disconnect {
                        reason: trans::DisconnectReason::ProtocolError,
                        description: "Channel window exceeded".into(),
                        language: Default::default(),
                    });

                    return task::Poll::Ready(Err(io::Error::new(
                        io::ErrorKind::InvalidData,
                        crate::Error::WindowExceeded(excess),
                    )));
                }

                self.buffer.extend(data.iter());

                tracing::trace!(
                    "Received a data block on channel {}:{} of size `{}`",
                    self.channel.local_id,
                    self.channel.remote_id,
                    data.len()
                );
            } else {
                tracing::trace!(
                    "End-of-file on channel {}:{}",
                    self.channel.local_id,
                    self.channel.remote_id,
                );
            }
        }

        task::Poll::Ready(self.buffer.read(buf))
    }
}

impl<IO: Pipe, S: Side> Drop for Read<'_, IO, S> {
    fn drop(&mut self) {
        self.channel.connect.unregister(&self.interest());
    }
}

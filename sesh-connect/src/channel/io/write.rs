use std::{io, pin::Pin, task};

use futures::{FutureExt, SinkExt};
use sesh::{side::Side, Pipe};
use sesh_wire::{connect, IntoPacket};

use crate::channel::Channel;

pub struct Write<'a, IO: Pipe, S: Side> {
    channel: &'a Channel<'a, IO, S>,
    ext: Option<connect::ChannelExtendedDataType>,

    buffer: Vec<u8>,
}

impl<'a, IO: Pipe, S: Side> Write<'a, IO, S> {
    pub fn new(channel: &'a Channel<'a, IO, S>, ext: Option<connect::ChannelExtendedDataType>) -> Self {
        Self {
            channel,
            ext,

            buffer: Default::default(),
        }
    }

    fn io_err(err: sesh::Error) -> io::Error {
        io::Error::new(io::ErrorKind::BrokenPipe, err)
    }
}

impl<IO: Pipe, S: Side> futures::AsyncWrite for Write<'_, IO, S> {
    fn poll_write(
        mut self: Pin<&mut Self>,
        cx: &mut task::Context<'_>,
        buf: &[u8],
    ) -> task::Poll<io::Result<usize>> {
        loop {
            let writable = buf
                .len()
                .min(self.channel.remote_maxpack as usize - self.buffer.len());
            if writable == 0 {
                futures::ready!(self.as_mut().poll_flush(cx))?;

                continue;
            }

            // Outbound data is gated on the credit the peer granted us.
            let reserved =
                futures::ready!(self.channel.remote_window.poll_reserve(cx, writable as u32))
                    as usize;
            self.buffer.extend_from_slice(&buf[..reserved]);

            break task::Poll::Ready(Ok(reserved));
        }
    }

    fn poll_flush(
        mut self: Pin<&mut Self>,
        cx: &mut task::Context<'_>,
    ) -> task::Poll<io::Result<()>> {
        loop {
            let mut poller =
                futures::ready!(self.channel.connect.poller.lock().poll_unpin(cx));

            // Drives any in-flight send to completion first.
            futures::ready!(poller.poll_ready_unpin(cx)).map_err(Self::io_err)?;

            if self.buffer.is_empty() {
                break task::Poll::Ready(Ok(()));
            }

            let data = self.buffer.drain(..).collect::<Vec<_>>().into();
            let packet = match self.ext {
                Some(data_type) => connect::ChannelExtendedData {
                    recipient_channel: self.channel.remote_id,
                    data_type,
                    data,
                }
                .into_packet(),
                None => connect::ChannelData {
                    recipient_channel: self.channel.remote_id,
                    data,
                }
                .into_packet(),
            };

            poller.start_send_unpin(packet).map_err(Self::io_err)?;
        }
    }

    fn poll_close(self: Pin<&mut Self>, cx: &mut task::Context<'_>) -> task::Poll<io::Result<()>> {
        self.poll_flush(cx)
    }
}

//! The _channel requests_ and responses.

use sesh::{side::Side, Pipe};
use sesh_wire::connect;

use super::Channel;
use crate::Result;

#[doc(no_inline)]
pub use sesh_wire::connect::ChannelRequestContext;

/// A received _channel request_, answered negatively when
/// dropped unanswered.
///
/// Requests carrying `want_reply` are answered in the order they
/// arrived, which this sequential interface enforces by construction.
pub struct Request<'r, IO: Pipe, S: Side> {
    channel: &'r Channel<'r, IO, S>,

    inner: Option<connect::ChannelRequest>,
}

impl<'r, IO: Pipe, S: Side> Request<'r, IO, S> {
    pub(super) fn new(channel: &'r Channel<'r, IO, S>, inner: connect::ChannelRequest) -> Self {
        Self {
            channel,
            inner: Some(inner),
        }
    }

    /// Access the _context_ of the channel request.
    pub fn cx(&self) -> &ChannelRequestContext {
        &self
            .inner
            .as_ref()
            .expect("Inner value has been dropped before the outer structure")
            .context
    }

    /// Accept the channel request.
    pub async fn accept(mut self) -> Result<()> {
        let inner = self
            .inner
            .take()
            .expect("Inner value has been dropped before the outer structure");

        if *inner.want_reply {
            self.channel
                .connect
                .send(&connect::ChannelSuccess {
                    recipient_channel: self.channel.remote_id,
                })
                .await?;
        }

        Ok(())
    }

    /// Reject the channel request.
    pub async fn reject(mut self) -> Result<()> {
        let inner = self
            .inner
            .take()
            .expect("Inner value has been dropped before the outer structure");

        if *inner.want_reply {
            self.channel
                .connect
                .send(&connect::ChannelFailure {
                    recipient_channel: self.channel.remote_id,
                })
                .await?;
        }

        Ok(())
    }
}

impl<IO: Pipe, S: Side> Drop for Request<'_, IO, S> {
    fn drop(&mut self) {
        if let Some(inner) = self.inner.take() {
            if *inner.want_reply {
                self.channel.connect.try_feed(&connect::ChannelFailure {
                    recipient_channel: self.channel.remote_id,
                });
            }
        }
    }
}

//! The _channel open requests_ and responses.

use sesh::{side::Side, Pipe};
use sesh_wire::connect;

use crate::{channel, connect::Connect, Result};

#[doc(no_inline)]
pub use sesh_wire::connect::{ChannelOpenContext, ChannelOpenFailureReason};

/// A response to an outgoing _channel open request_.
pub enum Response<'s, IO: Pipe, S: Side> {
    /// The request succeeded, with an opened channel.
    Success(channel::Channel<'s, IO, S>),

    /// The request failed.
    Failure {
        /// The reason for failure.
        reason: ChannelOpenFailureReason,

        /// A textual description of the failure.
        description: String,
    },
}

/// A received _channel open request_, rejected when dropped unanswered.
pub struct ChannelOpen<'s, IO: Pipe, S: Side> {
    connect: &'s Connect<IO, S>,

    inner: Option<connect::ChannelOpen>,
}

impl<'s, IO: Pipe, S: Side> ChannelOpen<'s, IO, S> {
    pub(crate) fn new(connect: &'s Connect<IO, S>, inner: connect::ChannelOpen) -> Self {
        Self {
            connect,
            inner: Some(inner),
        }
    }

    /// Access the _context_ of the channel open request.
    pub fn cx(&self) -> &ChannelOpenContext {
        &self
            .inner
            .as_ref()
            .expect("Inner value has been dropped before the outer structure")
            .context
    }

    /// Accept the channel open request.
    pub async fn accept(mut self) -> Result<channel::Channel<'s, IO, S>> {
        let inner = self
            .inner
            .take()
            .expect("Inner value has been dropped before the outer structure");

        let local_id = (0..)
            .find(|id| self.connect.channels.insert(*id))
            .expect("exhausted the channel identifier space");

        self.connect
            .send(&connect::ChannelOpenConfirmation {
                recipient_channel: inner.sender_channel,
                sender_channel: local_id,
                initial_window_size: self.connect.config.window_size,
                maximum_packet_size: self.connect.config.max_packet,
            })
            .await?;

        Ok(channel::Channel::new(
            self.connect,
            local_id,
            inner.sender_channel,
            inner.initial_window_size,
            inner.maximum_packet_size,
        ))
    }

    /// Reject the channel open request.
    pub async fn reject(
        mut self,
        reason: ChannelOpenFailureReason,
        description: impl Into<String>,
    ) -> Result<()> {
        let inner = self
            .inner
            .take()
            .expect("Inner value has been dropped before the outer structure");

        self.connect
            .send(&connect::ChannelOpenFailure {
                recipient_channel: inner.sender_channel,
                reason,
                description: description.into().into(),
                language: Default::default(),
            })
            .await?;

        Ok(())
    }
}

impl<IO: Pipe, S: Side> Drop for ChannelOpen<'_, IO, S> {
    fn drop(&mut self) {
        if let Some(inner) = self.inner.take() {
            self.connect.try_feed(&connect::ChannelOpenFailure {
                recipient_channel: inner.sender_channel,
                reason: ChannelOpenFailureReason::AdministrativelyProhibited,
                description: "Opening channels is disallowed at this time".into(),
                language: Default::default(),
            });
        }
    }
}

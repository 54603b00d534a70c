//! The _global requests_ and responses.

use sesh::{side::Side, Pipe};
use sesh_wire::connect;

use crate::{connect::Connect, Result};

#[doc(no_inline)]
pub use sesh_wire::connect::GlobalRequestContext;

/// A response to an outgoing _global request_.
#[derive(Debug, PartialEq, Eq)]
pub enum Response {
    /// The request was accepted.
    Accepted,

    /// The request was accepted, with a port allocated by the peer.
    AcceptedPort(u32),

    /// The request was rejected.
    Rejected,
}

/// A received _global request_, rejected when dropped unanswered.
pub struct GlobalRequest<'s, IO: Pipe, S: Side> {
    connect: &'s Connect<IO, S>,

    inner: Option<connect::GlobalRequest>,
}

impl<'s, IO: Pipe, S: Side> GlobalRequest<'s, IO, S> {
    pub(crate) fn new(connect: &'s Connect<IO, S>, inner: connect::GlobalRequest) -> Self {
        Self {
            connect,
            inner: Some(inner),
        }
    }

    /// Access the _context_ of the global request.
    pub fn cx(&self) -> &GlobalRequestContext {
        &self
            .inner
            .as_ref()
            .expect("Inner value has been dropped before the outer structure")
            .context
    }

    /// Accept the global request, with the port bound for
    /// port-0 `tcpip-forward` requests.
    pub async fn accept(mut self, bound_port: Option<u32>) -> Result<()> {
        let inner = self
            .inner
            .take()
            .expect("Inner value has been dropped before the outer structure");

        if *inner.want_reply {
            match bound_port {
                Some(bound_port) => {
                    self.connect
                        .send(&connect::ForwardingSuccess { bound_port })
                        .await?
                }
                None => self.connect.send(&connect::RequestSuccess).await?,
            }
        }

        Ok(())
    }

    /// Reject the global request.
    pub async fn reject(mut self) -> Result<()> {
        let inner = self
            .inner
            .take()
            .expect("Inner value has been dropped before the outer structure");

        if *inner.want_reply {
            self.connect.send(&connect::RequestFailure).await?;
        }

        Ok(())
    }
}

impl<IO: Pipe, S: Side> Drop for GlobalRequest<'_, IO, S> {
    fn drop(&mut self) {
        if let Some(inner) = self.inner.take() {
            if *inner.want_reply {
                self.connect.try_feed(&connect::RequestFailure);
            }
        }
    }
}

//! Service handling facilities for [`session::Session`].
//!
//! Services are multiplexed over the transport by message number:
//! each service claims a range of message numbers at registration,
//! and the session routes inbound packets accordingly.

#[cfg(doc)]
use crate::session;

use std::ops::RangeInclusive;

use futures::Future;

use crate::{side::Side, Pipe, Result, Session};

/// A service request in the transport protocol, client side.
pub trait Request {
    /// The erroneous outcome of the [`Request`].
    type Err: From<crate::Error>;

    /// The successful outcome of the [`Request`].
    type Ok<I: Pipe, S: Side>;

    /// The requested service _identifier_.
    const SERVICE_NAME: &'static str;

    /// The range of message numbers the service claims once running.
    const CLAIM: RangeInclusive<u8>;

    /// The service callback, called when the peer accepted the request.
    fn on_accept<I: Pipe, S: Side>(
        self,
        session: Session<I, S>,
    ) -> impl Future<Output = Result<Self::Ok<I, S>, Self::Err>>;
}

/// A service handler in the transport protocol, server side.
pub trait Handler {
    /// The erroneous outcome of the [`Handler`].
    type Err: From<crate::Error>;

    /// The successful outcome of the [`Handler`].
    type Ok<I: Pipe, S: Side>;

    /// The handled service _identifier_.
    const SERVICE_NAME: &'static str;

    /// The range of message numbers the service claims once running.
    const CLAIM: RangeInclusive<u8>;

    /// The service callback, called when the peer requested the service.
    fn on_request<I: Pipe, S: Side>(
        self,
        session: Session<I, S>,
    ) -> impl Future<Output = Result<Self::Ok<I, S>, Self::Err>>;
}

/// The set of message-number ranges claimed by running services.
#[derive(Debug, Default)]
pub(crate) struct Claims(Vec<(&'static str, RangeInclusive<u8>)>);

impl Claims {
    /// Record a service's claim over a message-number range.
    #[allow(clippy::panic)] // An overlapping claim is a genuine programming error.
    pub(crate) fn claim(&mut self, name: &'static str, range: RangeInclusive<u8>) {
        if let Some((owner, _)) = self
            .0
            .iter()
            .find(|(_, claimed)| claimed.start() <= range.end() && range.start() <= claimed.end())
        {
            panic!(
                "service `{name}` claims messages {range:?} overlapping with service `{owner}`'s"
            );
        }

        tracing::debug!("Service `{name}` claimed messages {range:?}");

        self.0.push((name, range));
    }

    /// Whether a registered service owns the message number `id`.
    pub(crate) fn owns(&self, id: u8) -> bool {
        self.0.iter().any(|(_, range)| range.contains(&id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn it_routes_claimed_message_numbers() {
        let mut claims = Claims::default();
        claims.claim("ssh-userauth", 50..=79);
        claims.claim("ssh-connection", 80..=127);

        assert!(claims.owns(51));
        assert!(claims.owns(100));
        assert!(!claims.owns(21));
        assert!(!claims.owns(128));
    }

    #[test]
    #[should_panic(expected = "overlapping")]
    fn it_rejects_overlapping_claims() {
        let mut claims = Claims::default();
        claims.claim("ssh-userauth", 50..=79);
        claims.claim("ssh-userauth-bis", 60..=90);
    }
}

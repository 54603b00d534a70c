use strum::AsRefStr;

/// The transport protocol state machine.
///
/// No user data flows between [`State::KexInit`] and [`State::NewKeys`]:
/// the key-exchange procedure runs to completion before the session
/// surfaces or accepts any other traffic.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, AsRefStr)]
pub enum State {
    /// Identification strings exchanged, no keys derived yet.
    #[default]
    Preamble,

    /// Our `SSH_MSG_KEXINIT` has been emitted.
    KexInit,

    /// Both `SSH_MSG_KEXINIT` have been seen, exchange messages flowing.
    KexRun,

    /// `SSH_MSG_NEWKEYS` handshake completed, keys about to rotate.
    NewKeys,

    /// Keys are in place, user traffic flows.
    Running,

    /// A key re-exchange was triggered over the running session.
    RekeyRequested,

    /// The re-exchange messages are flowing.
    RekeyRunning,

    /// The session has been torn down.
    Closed,
}

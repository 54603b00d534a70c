use sesh_wire::connect;
use thiserror::Error;

/// The error types that can occur when manipulating this crate.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum Error {
    /// Transport error.
    #[error(transparent)]
    Transport(#[from] sesh::Error),

    /// The peer refused to open the channel.
    #[error("Peer refused the opening of the channel: {description} ({reason:?})")]
    ChannelOpenFailure {
        /// The reason for failure.
        reason: connect::ChannelOpenFailureReason,

        /// A textual message to accompany the reason.
        description: String,
    },

    /// The channel has been closed.
    #[error("The channel has been closed")]
    ChannelClosed,

    /// The peer sent more data than its window credit allowed.
    #[error("Peer overflowed the channel window by {0} bytes")]
    WindowExceeded(u32),

    /// The peer rejected a channel request.
    #[error("Peer rejected the channel request")]
    RequestFailure,
}

/// A handy [`std::result::Result`] type alias bounding the [`enum@Error`] struct as `E`.
pub type Result<T, E = Error> = std::result::Result<T, E>;

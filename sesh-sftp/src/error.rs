use thiserror::Error;

use crate::wire::StatusCode;

/// The error types that can occur when manipulating this crate.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error on the underlying channel streams.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Wire format error.
    #[error(transparent)]
    Wire(#[from] sesh_wire::Error),

    /// The server answered an operation with an error status.
    #[error("The server answered with {code:?}: {message}")]
    Status {
        /// The status code carried by the response.
        code: StatusCode,

        /// The human-readable message carried by the response.
        message: String,
    },

    /// The channel closed with the request still in flight.
    #[error("The channel has been closed")]
    ChannelClosed,

    /// The server does not advertise the required protocol extension.
    #[error("The server does not support the `{0}` extension")]
    Unsupported(&'static str),

    /// The operation was rejected locally before reaching the wire.
    #[error("Invalid argument: {0}")]
    InvalidArgument(&'static str),

    /// The server negotiated an unusable protocol version.
    #[error("Unsupported protocol version `{0}`")]
    VersionMismatch(u32),

    /// The server response did not match the request's shape.
    #[error("The server answered with an unexpected response type")]
    UnexpectedResponse,

    /// An operation outlived its deadline.
    #[error("The operation timed out")]
    Timeout,
}

impl Error {
    pub(crate) fn status(code: StatusCode, message: String) -> Self {
        Self::Status { code, message }
    }

    /// Whether the error is the server reporting a missing file.
    pub fn is_no_such_file(&self) -> bool {
        matches!(
            self,
            Self::Status {
                code: StatusCode::NoSuchFile,
                ..
            }
        )
    }

    /// Whether the error is the server denying access.
    pub fn is_permission_denied(&self) -> bool {
        matches!(
            self,
            Self::Status {
                code: StatusCode::PermissionDenied,
                ..
            }
        )
    }
}

/// A handy [`std::result::Result`] type alias bounding the [`enum@Error`] struct as `E`.
pub type Result<T, E = Error> = std::result::Result<T, E>;

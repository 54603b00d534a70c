use thiserror::Error;

/// The error type used while manipulating the binary wire format.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum Error {
    /// An error occured while performing I/O operations.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// A field did not match its declared layout or length.
    #[error(transparent)]
    MalformedField(#[from] binrw::Error),

    /// The parsed identifier was not conformant.
    #[error("The SSH identifier was either misformatted or misprefixed")]
    BadIdentifer(String),

    /// The identification string would exceed 255 bytes on the wire.
    #[error("The SSH identifier exceeds the 255 bytes allowed on the wire")]
    IdentiferTooLong,

    /// The stream ended before an identification line was received.
    #[error("Reached end-of-file before an identification string")]
    UnexpectedEof,

    /// The announced packet length is outside of the protocol bounds,
    /// or does not align with the cipher's block size.
    #[error("Packet length `{0}` is out of bounds or misaligned")]
    PacketLength(u32),

    /// The announced padding does not fit in the packet.
    #[error("Padding length `{0}` overflows the packet")]
    PaddingLength(u8),
}

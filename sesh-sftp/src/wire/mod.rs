//! The SFTP wire messages, as defined in
//! [draft-ietf-secsh-filexfer-02](https://datatracker.ietf.org/doc/html/draft-ietf-secsh-filexfer-02),
//! and the `uint32`-length framing around them.

use binrw::{binrw, helpers::until_eof, BinRead, BinWrite};
use futures::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use sesh_wire::arch::{Ascii, Bytes, Utf8};

use crate::{Error, Result};

mod attrs;
pub use attrs::{AttrFlags, Attributes, ExtendedAttr, ExtendedAttrs};

/// An upper bound on inbound frames, data chunks plus their headers
/// comfortably fit under it.
const FRAME_MAX_SIZE: usize = 0x40000;

/// The `SSH_FXP_INIT` message.
#[binrw]
#[derive(Debug, Clone)]
#[brw(big, magic = 1_u8)]
pub struct Init {
    /// The highest protocol version the client supports.
    pub version: u32,

    /// The extensions the client announces.
    #[br(parse_with = until_eof)]
    pub extensions: Vec<Extension>,
}

/// The `SSH_FXP_VERSION` message.
#[binrw]
#[derive(Debug, Clone)]
#[brw(big, magic = 2_u8)]
pub struct Version {
    /// The negotiated protocol version.
    pub version: u32,

    /// The extensions the server announces.
    #[br(parse_with = until_eof)]
    pub extensions: Vec<Extension>,
}

/// An `(name, data)` extension pair in the version handshake.
#[binrw]
#[derive(Debug, Clone)]
#[brw(big)]
pub struct Extension {
    /// The extension's name, in `name@domain` format.
    pub name: Ascii,

    /// The extension's opaque data, usually a version string.
    pub data: Bytes,
}

/// The `SSH_FXP_OPEN` message.
#[binrw]
#[derive(Debug, Clone)]
#[brw(big, magic = 3_u8)]
pub struct Open {
    /// The request identifier, echoed in the response.
    pub id: u32,

    /// The path of the file to open.
    pub filename: Utf8,

    /// The `pflags` open mode bitset.
    pub pflags: u32,

    /// The attributes to apply on creation.
    pub attrs: Attributes,
}

/// The `SSH_FXP_CLOSE` message.
#[binrw]
#[derive(Debug, Clone)]
#[brw(big, magic = 4_u8)]
pub struct Close {
    /// The request identifier, echoed in the response.
    pub id: u32,

    /// The handle to dispose of.
    pub handle: Bytes,
}

/// The `SSH_FXP_READ` message.
#[binrw]
#[derive(Debug, Clone)]
#[brw(big, magic = 5_u8)]
pub struct Read {
    /// The request identifier, echoed in the response.
    pub id: u32,

    /// The handle to read from.
    pub handle: Bytes,

    /// The absolute offset to read at.
    pub offset: u64,

    /// The maximum number of bytes to read.
    pub length: u32,
}

/// The `SSH_FXP_WRITE` message.
#[binrw]
#[derive(Debug, Clone)]
#[brw(big, magic = 6_u8)]
pub struct Write {
    /// The request identifier, echoed in the response.
    pub id: u32,

    /// The handle to write to.
    pub handle: Bytes,

    /// The absolute offset to write at.
    pub offset: u64,

    /// The bytes to write.
    pub data: Bytes,
}

/// The `SSH_FXP_LSTAT` message, not following symlinks.
#[binrw]
#[derive(Debug, Clone)]
#[brw(big, magic = 7_u8)]
pub struct Lstat {
    /// The request identifier, echoed in the response.
    pub id: u32,

    /// The path to query.
    pub path: Utf8,
}

/// The `SSH_FXP_FSTAT` message.
#[binrw]
#[derive(Debug, Clone)]
#[brw(big, magic = 8_u8)]
pub struct Fstat {
    /// The request identifier, echoed in the response.
    pub id: u32,

    /// The handle to query.
    pub handle: Bytes,
}

/// The `SSH_FXP_SETSTAT` message.
#[binrw]
#[derive(Debug, Clone)]
#[brw(big, magic = 9_u8)]
pub struct SetStat {
    /// The request identifier, echoed in the response.
    pub id: u32,

    /// The path to alter.
    pub path: Utf8,

    /// The attributes to apply.
    pub attrs: Attributes,
}

/// The `SSH_FXP_FSETSTAT` message.
#[binrw]
#[derive(Debug, Clone)]
#[brw(big, magic = 10_u8)]
pub struct FSetStat {
    /// The request identifier, echoed in the response.
    pub id: u32,

    /// The handle to alter.
    pub handle: Bytes,

    /// The attributes to apply.
    pub attrs: Attributes,
}

/// The `SSH_FXP_OPENDIR` message.
#[binrw]
#[derive(Debug, Clone)]
#[brw(big, magic = 11_u8)]
pub struct OpenDir {
    /// The request identifier, echoed in the response.
    pub id: u32,

    /// The path of the directory to list.
    pub path: Utf8,
}

/// The `SSH_FXP_READDIR` message.
#[binrw]
#[derive(Debug, Clone)]
#[brw(big, magic = 12_u8)]
pub struct ReadDir {
    /// The request identifier, echoed in the response.
    pub id: u32,

    /// The directory handle to read entries from.
    pub handle: Bytes,
}

/// The `SSH_FXP_REMOVE` message.
#[binrw]
#[derive(Debug, Clone)]
#[brw(big, magic = 13_u8)]
pub struct Remove {
    /// The request identifier, echoed in the response.
    pub id: u32,

    /// The path of the file to remove.
    pub filename: Utf8,
}

/// The `SSH_FXP_MKDIR` message.
#[binrw]
#[derive(Debug, Clone)]
#[brw(big, magic = 14_u8)]
pub struct MkDir {
    /// The request identifier, echoed in the response.
    pub id: u32,

    /// The path of the directory to create.
    pub path: Utf8,

    /// The attributes to apply on creation.
    pub attrs: Attributes,
}

/// The `SSH_FXP_RMDIR` message.
#[binrw]
#[derive(Debug, Clone)]
#[brw(big, magic = 15_u8)]
pub struct RmDir {
    /// The request identifier, echoed in the response.
    pub id: u32,

    /// The path of the directory to remove.
    pub path: Utf8,
}

/// The `SSH_FXP_REALPATH` message.
#[binrw]
#[derive(Debug, Clone)]
#[brw(big, magic = 16_u8)]
pub struct RealPath {
    /// The request identifier, echoed in the response.
    pub id: u32,

    /// The path to canonicalize.
    pub path: Utf8,
}

/// The `SSH_FXP_STAT` message, following symlinks.
#[binrw]
#[derive(Debug, Clone)]
#[brw(big, magic = 17_u8)]
pub struct Stat {
    /// The request identifier, echoed in the response.
    pub id: u32,

    /// The path to query.
    pub path: Utf8,
}

/// The `SSH_FXP_RENAME` message.
#[binrw]
#[derive(Debug, Clone)]
#[brw(big, magic = 18_u8)]
pub struct Rename {
    /// The request identifier, echoed in the response.
    pub id: u32,

    /// The path to rename.
    pub oldpath: Utf8,

    /// The path to rename to.
    pub newpath: Utf8,
}

/// The `SSH_FXP_READLINK` message.
#[binrw]
#[derive(Debug, Clone)]
#[brw(big, magic = 19_u8)]
pub struct ReadLink {
    /// The request identifier, echoed in the response.
    pub id: u32,

    /// The path of the symlink to resolve.
    pub path: Utf8,
}

/// The `SSH_FXP_SYMLINK` message.
#[binrw]
#[derive(Debug, Clone)]
#[brw(big, magic = 20_u8)]
pub struct Symlink {
    /// The request identifier, echoed in the response.
    pub id: u32,

    /// The path of the symlink to create.
    pub linkpath: Utf8,

    /// The path the symlink points at.
    pub targetpath: Utf8,
}

/// The `SSH_FXP_EXTENDED` message.
#[binrw]
#[derive(Debug, Clone)]
#[brw(big, magic = 200_u8)]
pub struct Extended {
    /// The request identifier, echoed in the response.
    pub id: u32,

    /// The extended request's name, in `name@domain` format.
    pub request: Ascii,

    /// The request-specific payload.
    #[br(parse_with = until_eof)]
    pub data: Vec<u8>,
}

/// The `SSH_FXP_STATUS` message.
#[binrw]
#[derive(Debug, Clone)]
#[brw(big, magic = 101_u8)]
pub struct Status {
    /// The request identifier this status answers.
    pub id: u32,

    /// The machine-readable status code.
    pub code: StatusCode,

    /// The human-readable message.
    pub message: Utf8,

    /// Language tag.
    pub language: Ascii,
}

/// The `code` in the `SSH_FXP_STATUS` message.
#[binrw]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[brw(big)]
pub enum StatusCode {
    /// `SSH_FX_OK`.
    #[brw(magic = 0_u32)]
    Ok,

    /// `SSH_FX_EOF`.
    #[brw(magic = 1_u32)]
    Eof,

    /// `SSH_FX_NO_SUCH_FILE`.
    #[brw(magic = 2_u32)]
    NoSuchFile,

    /// `SSH_FX_PERMISSION_DENIED`.
    #[brw(magic = 3_u32)]
    PermissionDenied,

    /// `SSH_FX_FAILURE`.
    #[brw(magic = 4_u32)]
    Failure,

    /// `SSH_FX_BAD_MESSAGE`.
    #[brw(magic = 5_u32)]
    BadMessage,

    /// `SSH_FX_NO_CONNECTION`.
    #[brw(magic = 6_u32)]
    NoConnection,

    /// `SSH_FX_CONNECTION_LOST`.
    #[brw(magic = 7_u32)]
    ConnectionLost,

    /// `SSH_FX_OP_UNSUPPORTED`.
    #[brw(magic = 8_u32)]
    OpUnsupported,

    /// Any later-version or non-standard status code.
    Other(u32),
}

/// The `SSH_FXP_HANDLE` message.
#[binrw]
#[derive(Debug, Clone)]
#[brw(big, magic = 102_u8)]
pub struct Handle {
    /// The request identifier this handle answers.
    pub id: u32,

    /// The server-issued opaque handle.
    pub handle: Bytes,
}

/// The `SSH_FXP_DATA` message.
#[binrw]
#[derive(Debug, Clone)]
#[brw(big, magic = 103_u8)]
pub struct Data {
    /// The request identifier this data answers.
    pub id: u32,

    /// The bytes read, possibly fewer than requested.
    pub data: Bytes,
}

/// The `SSH_FXP_NAME` message.
#[binrw]
#[derive(Debug, Clone)]
#[brw(big, magic = 104_u8)]
pub struct Name {
    /// The request identifier this listing answers.
    pub id: u32,

    #[bw(calc = entries.len() as u32)]
    count: u32,

    /// One batch of directory entries.
    #[br(count = count)]
    pub entries: Vec<DirEntry>,
}

/// One entry of a directory listing.
#[binrw]
#[derive(Debug, Clone)]
#[brw(big)]
pub struct DirEntry {
    /// The entry's file name.
    pub filename: Utf8,

    /// An `ls -l`-style display line, not to be parsed.
    pub longname: Utf8,

    /// The entry's attributes.
    pub attrs: Attributes,
}

/// The `SSH_FXP_ATTRS` message.
#[binrw]
#[derive(Debug, Clone)]
#[brw(big, magic = 105_u8)]
pub struct Attrs {
    /// The request identifier these attributes answer.
    pub id: u32,

    /// The queried attributes.
    pub attrs: Attributes,
}

/// The `SSH_FXP_EXTENDED_REPLY` message.
#[binrw]
#[derive(Debug, Clone)]
#[brw(big, magic = 201_u8)]
pub struct ExtendedReply {
    /// The request identifier this reply answers.
    pub id: u32,

    /// The reply-specific payload.
    #[br(parse_with = until_eof)]
    pub data: Vec<u8>,
}

/// Any request a client can address to the server, mostly useful
/// to the server side of the protocol.
#[binrw]
#[derive(Debug, Clone)]
#[brw(big)]
pub enum Request {
    /// See [`Open`] for more details.
    Open(Open),

    /// See [`Close`] for more details.
    Close(Close),

    /// See [`Read`] for more details.
    Read(Read),

    /// See [`Write`] for more details.
    Write(Write),

    /// See [`Lstat`] for more details.
    Lstat(Lstat),

    /// See [`Fstat`] for more details.
    Fstat(Fstat),

    /// See [`SetStat`] for more details.
    SetStat(SetStat),

    /// See [`FSetStat`] for more details.
    FSetStat(FSetStat),

    /// See [`OpenDir`] for more details.
    OpenDir(OpenDir),

    /// See [`ReadDir`] for more details.
    ReadDir(ReadDir),

    /// See [`Remove`] for more details.
    Remove(Remove),

    /// See [`MkDir`] for more details.
    MkDir(MkDir),

    /// See [`RmDir`] for more details.
    RmDir(RmDir),

    /// See [`RealPath`] for more details.
    RealPath(RealPath),

    /// See [`Stat`] for more details.
    Stat(Stat),

    /// See [`Rename`] for more details.
    Rename(Rename),

    /// See [`ReadLink`] for more details.
    ReadLink(ReadLink),

    /// See [`Symlink`] for more details.
    Symlink(Symlink),

    /// See [`Extended`] for more details.
    Extended(Extended),
}

/// Any response the server can address to an in-flight request.
#[binrw]
#[derive(Debug, Clone)]
#[brw(big)]
pub enum Response {
    /// See [`Status`] for more details.
    Status(Status),

    /// See [`Handle`] for more details.
    Handle(Handle),

    /// See [`Data`] for more details.
    Data(Data),

    /// See [`Name`] for more details.
    Name(Name),

    /// See [`Attrs`] for more details.
    Attrs(Attrs),

    /// See [`ExtendedReply`] for more details.
    ExtendedReply(ExtendedReply),
}

impl Response {
    /// The request identifier the response is addressed to.
    pub fn id(&self) -> u32 {
        match self {
            Self::Status(status) => status.id,
            Self::Handle(handle) => handle.id,
            Self::Data(data) => data.id,
            Self::Name(name) => name.id,
            Self::Attrs(attrs) => attrs.id,
            Self::ExtendedReply(reply) => reply.id,
        }
    }
}

/// Read one length-framed SFTP message from the `reader`.
pub async fn read_frame<R>(reader: &mut R) -> Result<Vec<u8>>
where
    R: AsyncRead + Unpin,
{
    let mut length = [0u8; 4];
    reader.read_exact(&mut length).await?;

    let length = u32::from_be_bytes(length) as usize;
    if length == 0 || length > FRAME_MAX_SIZE {
        return Err(Error::status(
            StatusCode::BadMessage,
            format!("frame of {length} bytes is out of bounds"),
        ));
    }

    let mut frame = vec![0u8; length];
    reader.read_exact(&mut frame).await?;

    Ok(frame)
}

/// Write one length-framed SFTP message to the `writer`.
pub async fn write_frame<W, T>(writer: &mut W, message: &T) -> Result<()>
where
    W: AsyncWrite + Unpin,
    T: for<'w> BinWrite<Args<'w> = ()> + binrw::meta::WriteEndian,
{
    let mut frame = std::io::Cursor::new(Vec::new());
    message
        .write(&mut frame)
        .map_err(sesh_wire::Error::from)?;
    let frame = frame.into_inner();

    writer
        .write_all(&(frame.len() as u32).to_be_bytes())
        .await?;
    writer.write_all(&frame).await?;
    writer.flush().await?;

    Ok(())
}

/// Decode one inbound frame into a [`Response`].
pub(crate) fn decode_response(frame: &[u8]) -> Result<Response> {
    Ok(Response::read(&mut std::io::Cursor::new(frame)).map_err(sesh_wire::Error::from)?)
}

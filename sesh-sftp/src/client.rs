use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicU32, Ordering},
        Mutex as SyncMutex, MutexGuard,
    },
    time::Duration,
};

use binrw::{BinRead, BinWrite};
use futures::{channel::oneshot, lock::Mutex, AsyncRead, AsyncWrite, FutureExt};
use futures_time::future::FutureExt as _;
use sesh_wire::arch::{Bytes, Utf8};

use crate::{
    wire::{self, Attributes, DirEntry, Response, StatusCode},
    Error, Result, DEFAULT_CHUNK_SIZE, VERSION,
};

bitflags::bitflags! {
    /// The open modes of [`SftpClient::open`], mapped onto the
    /// `pflags` bitset of `SSH_FXP_OPEN`.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct OpenMode: u32 {
        /// Open for reading.
        const READ = 0x00000001;

        /// Open for writing.
        const WRITE = 0x00000002;

        /// Every write lands at the end of the file.
        const APPEND = 0x00000004;

        /// Create the file when it does not exist.
        const CREATE = 0x00000008;

        /// Truncate an existing file to zero length.
        const TRUNCATE = 0x00000010;

        /// Fail when the file already exists, requires
        /// [`OpenMode::CREATE`].
        const EXCLUSIVE = 0x00000020;
    }
}

/// The semantics asked of [`SftpClient::rename`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CopyMode {
    /// Plain `SSH_FXP_RENAME`, failing when the target exists.
    Standard,

    /// Replace the target when it exists, through the
    /// `posix-rename@openssh.com` extension.
    Overwrite,

    /// Atomic rename, through the `posix-rename@openssh.com`
    /// extension.
    Atomic,
}

/// Tunables for an [`SftpClient`].
#[derive(Debug, Clone)]
pub struct Config {
    /// Chunk size of [`crate::Reader`] requests, in bytes.
    pub read_chunk: u32,

    /// Chunk size of [`crate::Writer`] requests, in bytes.
    pub write_chunk: u32,

    /// Optional deadline applied to every operation.
    pub timeout: Option<Duration>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            read_chunk: DEFAULT_CHUNK_SIZE,
            write_chunk: DEFAULT_CHUNK_SIZE,
            timeout: None,
        }
    }
}

/// A SFTP version 3 client over a pair of byte streams, usually the
/// two halves of a `subsystem sftp` channel.
///
/// Operations may be issued from any number of concurrent tasks, the
/// outbound queue serialises them and responses are matched back by
/// request identifier.
pub struct SftpClient<R, W> {
    reader: Mutex<R>,
    writer: Mutex<W>,

    /// In-flight request sinks, the lock is held only to insert
    /// and remove entries.
    pending: SyncMutex<HashMap<u32, oneshot::Sender<Response>>>,

    /// Source of request identifiers, wrapping at 2³².
    id: AtomicU32,

    version: u32,
    extensions: Vec<(String, String)>,

    pub(crate) config: Config,
}

impl<R, W> SftpClient<R, W>
where
    R: AsyncRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    /// Handshake a new [`SftpClient`] over the provided streams.
    pub async fn new(reader: R, writer: W) -> Result<Self> {
        Self::with_config(reader, writer, Config::default()).await
    }

    /// Handshake a new [`SftpClient`] with explicit tunables.
    pub async fn with_config(reader: R, mut writer: W, config: Config) -> Result<Self> {
        wire::write_frame(
            &mut writer,
            &wire::Init {
                version: VERSION,
                extensions: Vec::new(),
            },
        )
        .await?;

        let mut reader = reader;
        let frame = wire::read_frame(&mut reader).await?;
        let version = wire::Version::read(&mut std::io::Cursor::new(&frame))
            .map_err(sesh_wire::Error::from)?;

        if version.version < VERSION {
            return Err(Error::VersionMismatch(version.version));
        }

        let extensions = version
            .extensions
            .into_iter()
            .map(|extension| {
                (
                    extension.name.to_string(),
                    String::from_utf8_lossy(&extension.data).into_owned(),
                )
            })
            .collect::<Vec<_>>();

        tracing::debug!(
            "SFTP session negotiated at version {}, extensions: {:?}",
            version.version.min(VERSION),
            extensions,
        );

        Ok(Self {
            reader: Mutex::new(reader),
            writer: Mutex::new(writer),
            pending: Default::default(),
            id: AtomicU32::new(0),
            version: version.version.min(VERSION),
            extensions,
            config,
        })
    }

    /// The negotiated protocol version.
    pub fn version(&self) -> u32 {
        self.version
    }

    /// The `(name, data)` extension pairs the server advertised.
    pub fn extensions(&self) -> &[(String, String)] {
        &self.extensions
    }

    fn supports(&self, extension: &str) -> bool {
        self.extensions.iter().any(|(name, _)| name == extension)
    }

    fn pending(&self) -> MutexGuard<'_, HashMap<u32, oneshot::Sender<Response>>> {
        self.pending
            .lock()
            .expect("a task panicked while holding the pending-request lock")
    }

    fn next_id(&self) -> u32 {
        self.id.fetch_add(1, Ordering::Relaxed)
    }

    /// Send `message` and suspend until the response with the same
    /// identifier arrives, pumping inbound frames for every waiter
    /// while the read half is uncontended.
    async fn transact<T>(&self, id: u32, message: &T) -> Result<Response>
    where
        T: for<'w> BinWrite<Args<'w> = ()> + binrw::meta::WriteEndian,
    {
        let (tx, mut rx) = oneshot::channel();
        self.pending().insert(id, tx);

        // Cancellation drops the sink, leaving a late response to be
        // discarded by whichever task pumps it in.
        let _cleanup = defer::defer(|| {
            self.pending().remove(&id);
        });

        {
            let mut writer = self.writer.lock().await;
            wire::write_frame(&mut *writer, message).await?;
        }

        let exchange = async {
            loop {
                futures::select_biased! {
                    response = &mut rx => {
                        break response.map_err(|_| Error::ChannelClosed);
                    }
                    mut reader = self.reader.lock().fuse() => {
                        match wire::read_frame(&mut *reader).await
                            .and_then(|frame| wire::decode_response(&frame))
                        {
                            Ok(response) => {
                                match self.pending().remove(&response.id()) {
                                    Some(sink) => {
                                        sink.send(response).ok();
                                    }
                                    None => tracing::debug!(
                                        "Discarded the response to the cancelled request #{}",
                                        response.id(),
                                    ),
                                }
                            }
                            Err(err) => {
                                // The stream is unusable, every waiter fails.
                                self.pending().clear();

                                break Err(err);
                            }
                        }
                    }
                }
            }
        };

        match self.config.timeout {
            Some(limit) => exchange
                .timeout::<futures_time::time::Duration>(limit.into())
                .await
                .map_err(|_| Error::Timeout)?,
            None => exchange.await,
        }
    }

    fn expect_status(response: Response) -> Result<()> {
        match response {
            Response::Status(wire::Status {
                code: StatusCode::Ok,
                ..
            }) => Ok(()),
            Response::Status(status) => Err(Error::status(
                status.code,
                status.message.into_string(),
            )),
            _ => Err(Error::UnexpectedResponse),
        }
    }

    fn expect_handle(response: Response) -> Result<Bytes> {
        match response {
            Response::Handle(handle) => Ok(handle.handle),
            Response::Status(status) => Err(Error::status(
                status.code,
                status.message.into_string(),
            )),
            _ => Err(Error::UnexpectedResponse),
        }
    }

    fn expect_attrs(response: Response) -> Result<Attributes> {
        match response {
            Response::Attrs(attrs) => Ok(attrs.attrs),
            Response::Status(status) => Err(Error::status(
                status.code,
                status.message.into_string(),
            )),
            _ => Err(Error::UnexpectedResponse),
        }
    }

    fn expect_name(response: Response) -> Result<Option<Vec<DirEntry>>> {
        match response {
            Response::Name(name) => Ok(Some(name.entries)),
            Response::Status(wire::Status {
                code: StatusCode::Eof,
                ..
            }) => Ok(None),
            Response::Status(status) => Err(Error::status(
                status.code,
                status.message.into_string(),
            )),
            _ => Err(Error::UnexpectedResponse),
        }
    }

    /// Open a file, yielding a server-issued handle valid until
    /// [`SftpClient::close`].
    pub async fn open(&self, path: &str, mode: OpenMode) -> Result<Bytes> {
        self.open_with_attrs(path, mode, Attributes::default())
            .await
    }

    /// Open a file with explicit creation attributes.
    pub async fn open_with_attrs(
        &self,
        path: &str,
        mode: OpenMode,
        attrs: Attributes,
    ) -> Result<Bytes> {
        if mode.contains(OpenMode::EXCLUSIVE) && !mode.contains(OpenMode::CREATE) {
            return Err(Error::InvalidArgument(
                "the `EXCLUSIVE` open mode requires `CREATE`",
            ));
        }

        let id = self.next_id();
        let response = self
            .transact(
                id,
                &wire::Open {
                    id,
                    filename: path.into(),
                    pflags: mode.bits(),
                    attrs,
                },
            )
            .await?;

        Self::expect_handle(response)
    }

    /// Dispose of a file or directory handle.
    pub async fn close(&self, handle: &Bytes) -> Result<()> {
        let id = self.next_id();
        let response = self
            .transact(
                id,
                &wire::Close {
                    id,
                    handle: handle.clone(),
                },
            )
            .await?;

        Self::expect_status(response)
    }

    /// Read up to `length` bytes at `offset`, `None` once past the
    /// end of the file. Short reads are legal and not an error.
    pub async fn read(&self, handle: &Bytes, offset: u64, length: u32) -> Result<Option<Vec<u8>>> {
        let id = self.next_id();
        let response = self
            .transact(
                id,
                &wire::Read {
                    id,
                    handle: handle.clone(),
                    offset,
                    length,
                },
            )
            .await?;

        match response {
            Response::Data(data) => Ok(Some(data.data.into_vec())),
            Response::Status(wire::Status {
                code: StatusCode::Eof,
                ..
            }) => Ok(None),
            Response::Status(status) => Err(Error::status(
                status.code,
                status.message.into_string(),
            )),
            _ => Err(Error::UnexpectedResponse),
        }
    }

    /// Write `data` at `offset`.
    pub async fn write(&self, handle: &Bytes, offset: u64, data: &[u8]) -> Result<()> {
        let id = self.next_id();
        let response = self
            .transact(
                id,
                &wire::Write {
                    id,
                    handle: handle.clone(),
                    offset,
                    data: data.into(),
                },
            )
            .await?;

        Self::expect_status(response)
    }

    /// Remove a file.
    pub async fn remove(&self, path: &str) -> Result<()> {
        let id = self.next_id();
        let response = self
            .transact(
                id,
                &wire::Remove {
                    id,
                    filename: path.into(),
                },
            )
            .await?;

        Self::expect_status(response)
    }

    /// Create a directory.
    pub async fn mkdir(&self, path: &str) -> Result<()> {
        let id = self.next_id();
        let response = self
            .transact(
                id,
                &wire::MkDir {
                    id,
                    path: path.into(),
                    attrs: Attributes::default(),
                },
            )
            .await?;

        Self::expect_status(response)
    }

    /// Remove a directory.
    pub async fn rmdir(&self, path: &str) -> Result<()> {
        let id = self.next_id();
        let response = self
            .transact(
                id,
                &wire::RmDir {
                    id,
                    path: path.into(),
                },
            )
            .await?;

        Self::expect_status(response)
    }

    /// Rename `oldpath` into `newpath` with the requested semantics.
    ///
    /// [`CopyMode::Overwrite`] and [`CopyMode::Atomic`] require the
    /// server to advertise the `posix-rename@openssh.com` extension.
    pub async fn rename(&self, oldpath: &str, newpath: &str, mode: CopyMode) -> Result<()> {
        const POSIX_RENAME: &str = "posix-rename@openssh.com";

        let id = self.next_id();
        let response = match mode {
            CopyMode::Standard => {
                self.transact(
                    id,
                    &wire::Rename {
                        id,
                        oldpath: oldpath.into(),
                        newpath: newpath.into(),
                    },
                )
                .await?
            }
            CopyMode::Overwrite | CopyMode::Atomic => {
                if !self.supports(POSIX_RENAME) {
                    return Err(Error::Unsupported(POSIX_RENAME));
                }

                self.transact(
                    id,
                    &wire::Extended {
                        id,
                        request: POSIX_RENAME.into(),
                        data: paths_blob(oldpath, newpath)?,
                    },
                )
                .await?
            }
        };

        Self::expect_status(response)
    }

    /// Create a symlink at `linkpath` pointing at `targetpath`.
    pub async fn symlink(&self, linkpath: &str, targetpath: &str) -> Result<()> {
        let id = self.next_id();
        let response = self
            .transact(
                id,
                &wire::Symlink {
                    id,
                    linkpath: linkpath.into(),
                    targetpath: targetpath.into(),
                },
            )
            .await?;

        Self::expect_status(response)
    }

    /// Create a hard link at `newpath` pointing at `oldpath`, through
    /// the `hardlink@openssh.com` extension.
    pub async fn link(&self, oldpath: &str, newpath: &str) -> Result<()> {
        const HARDLINK: &str = "hardlink@openssh.com";

        if !self.supports(HARDLINK) {
            return Err(Error::Unsupported(HARDLINK));
        }

        let id = self.next_id();
        let response = self
            .transact(
                id,
                &wire::Extended {
                    id,
                    request: HARDLINK.into(),
                    data: paths_blob(oldpath, newpath)?,
                },
            )
            .await?;

        Self::expect_status(response)
    }

    /// Query the attributes of a path, following symlinks.
    pub async fn stat(&self, path: &str) -> Result<Attributes> {
        let id = self.next_id();
        let response = self
            .transact(
                id,
                &wire::Stat {
                    id,
                    path: path.into(),
                },
            )
            .await?;

        Self::expect_attrs(response)
    }

    /// Query the attributes of a path, without following symlinks.
    pub async fn lstat(&self, path: &str) -> Result<Attributes> {
        let id = self.next_id();
        let response = self
            .transact(
                id,
                &wire::Lstat {
                    id,
                    path: path.into(),
                },
            )
            .await?;

        Self::expect_attrs(response)
    }

    /// Query the attributes of an open handle.
    pub async fn fstat(&self, handle: &Bytes) -> Result<Attributes> {
        let id = self.next_id();
        let response = self
            .transact(
                id,
                &wire::Fstat {
                    id,
                    handle: handle.clone(),
                },
            )
            .await?;

        Self::expect_attrs(response)
    }

    /// Apply attributes to a path.
    pub async fn setstat(&self, path: &str, attrs: Attributes) -> Result<()> {
        let id = self.next_id();
        let response = self
            .transact(
                id,
                &wire::SetStat {
                    id,
                    path: path.into(),
                    attrs,
                },
            )
            .await?;

        Self::expect_status(response)
    }

    /// Apply attributes to an open handle.
    pub async fn fsetstat(&self, handle: &Bytes, attrs: Attributes) -> Result<()> {
        let id = self.next_id();
        let response = self
            .transact(
                id,
                &wire::FSetStat {
                    id,
                    handle: handle.clone(),
                    attrs,
                },
            )
            .await?;

        Self::expect_status(response)
    }

    /// Canonicalize a path on the server.
    pub async fn realpath(&self, path: &str) -> Result<String> {
        let id = self.next_id();
        let response = self
            .transact(
                id,
                &wire::RealPath {
                    id,
                    path: path.into(),
                },
            )
            .await?;

        Self::expect_name(response)?
            .and_then(|entries| entries.into_iter().next())
            .map(|entry| entry.filename.into_string())
            .ok_or(Error::UnexpectedResponse)
    }

    /// Resolve the target of a symlink.
    pub async fn readlink(&self, path: &str) -> Result<String> {
        let id = self.next_id();
        let response = self
            .transact(
                id,
                &wire::ReadLink {
                    id,
                    path: path.into(),
                },
            )
            .await?;

        Self::expect_name(response)?
            .and_then(|entries| entries.into_iter().next())
            .map(|entry| entry.filename.into_string())
            .ok_or(Error::UnexpectedResponse)
    }

    /// Open a directory for listing, yielding a handle for
    /// [`SftpClient::readdir`].
    pub async fn opendir(&self, path: &str) -> Result<Bytes> {
        let id = self.next_id();
        let response = self
            .transact(
                id,
                &wire::OpenDir {
                    id,
                    path: path.into(),
                },
            )
            .await?;

        Self::expect_handle(response)
    }

    /// Read one batch of entries from a directory handle, `None`
    /// once the listing is exhausted.
    pub async fn readdir(&self, handle: &Bytes) -> Result<Option<Vec<DirEntry>>> {
        let id = self.next_id();
        let response = self
            .transact(
                id,
                &wire::ReadDir {
                    id,
                    handle: handle.clone(),
                },
            )
            .await?;

        Self::expect_name(response)
    }

    /// Iterate lazily over the entries of a directory.
    ///
    /// The iterator is finite, not restartable, and closes its
    /// handle once the listing is exhausted.
    pub async fn read_dir(&self, path: &str) -> Result<crate::ReadDir<'_, R, W>> {
        let handle = self.opendir(path).await?;

        Ok(crate::ReadDir::new(self, handle))
    }

    /// Open a file for streaming reads in configurable chunks.
    pub async fn reader(&self, path: &str) -> Result<crate::Reader<'_, R, W>> {
        let handle = self.open(path, OpenMode::READ).await?;

        Ok(crate::Reader::new(self, handle))
    }

    /// Open a file for streaming writes, created and truncated
    /// by default.
    pub async fn writer(&self, path: &str) -> Result<crate::Writer<'_, R, W>> {
        let handle = self
            .open(
                path,
                OpenMode::WRITE | OpenMode::CREATE | OpenMode::TRUNCATE,
            )
            .await?;

        Ok(crate::Writer::new(self, handle))
    }

    /// Issue a raw extended request.
    pub async fn extended(&self, request: &str, data: Vec<u8>) -> Result<Vec<u8>> {
        let id = self.next_id();
        let response = self
            .transact(
                id,
                &wire::Extended {
                    id,
                    request: request.into(),
                    data,
                },
            )
            .await?;

        match response {
            Response::ExtendedReply(reply) => Ok(reply.data),
            Response::Status(wire::Status {
                code: StatusCode::Ok,
                ..
            }) => Ok(Vec::new()),
            Response::Status(status) => Err(Error::status(
                status.code,
                status.message.into_string(),
            )),
            _ => Err(Error::UnexpectedResponse),
        }
    }
}

/// Serialize an `(oldpath, newpath)` pair for path-based extensions.
fn paths_blob(oldpath: &str, newpath: &str) -> Result<Vec<u8>> {
    let mut blob = std::io::Cursor::new(Vec::new());

    Utf8::new(oldpath)
        .write(&mut blob)
        .and_then(|()| Utf8::new(newpath).write(&mut blob))
        .map_err(sesh_wire::Error::from)?;

    Ok(blob.into_inner())
}

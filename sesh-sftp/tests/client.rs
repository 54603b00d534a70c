#![allow(clippy::unwrap_used)]

use std::collections::HashMap;

use async_compat::CompatExt;
use binrw::BinRead;
use futures::{AsyncReadExt, AsyncWriteExt};
use rand::RngCore;

use sesh_sftp::{
    wire::{self, Request},
    CopyMode, Error, OpenMode, SftpClient,
};

/// A canned in-memory SFTP v3 server driving the client under test.
struct Stub {
    files: HashMap<String, Vec<u8>>,
    listings: HashMap<String, Vec<String>>,
    extensions: Vec<(&'static str, &'static str)>,

    /// Cap applied to read responses, to exercise short reads.
    read_cap: Option<u32>,

    /// Entries per `SSH_FXP_READDIR` batch.
    batch: usize,

    handles: HashMap<Vec<u8>, HandleState>,
    issued: u32,
}

enum HandleState {
    File(String),
    Dir(Vec<String>),
}

impl Default for Stub {
    fn default() -> Self {
        Self {
            files: HashMap::new(),
            listings: HashMap::new(),
            extensions: Vec::new(),
            read_cap: None,
            batch: 100,
            handles: HashMap::new(),
            issued: 0,
        }
    }
}

fn ok(id: u32) -> wire::Response {
    status(id, wire::StatusCode::Ok)
}

fn status(id: u32, code: wire::StatusCode) -> wire::Response {
    wire::Response::Status(wire::Status {
        id,
        code,
        message: "".into(),
        language: "".into(),
    })
}

fn name(id: u32, filenames: impl IntoIterator<Item = String>) -> wire::Response {
    wire::Response::Name(wire::Name {
        id,
        entries: filenames
            .into_iter()
            .map(|filename| wire::DirEntry {
                longname: format!("-rw-r--r-- 1 smx smx 0 Jan 1 00:00 {filename}").into(),
                filename: filename.into(),
                attrs: Default::default(),
            })
            .collect(),
    })
}

impl Stub {
    fn issue(&mut self, state: HandleState) -> Vec<u8> {
        self.issued += 1;
        let handle = format!("handle-{}", self.issued).into_bytes();
        self.handles.insert(handle.clone(), state);

        handle
    }

    fn on_request(&mut self, request: Request) -> wire::Response {
        use wire::StatusCode;

        match request {
            Request::Open(open) => {
                let path = open.filename.to_string();
                let mode = OpenMode::from_bits_retain(open.pflags);

                if mode.contains(OpenMode::CREATE) {
                    let entry = self.files.entry(path.clone()).or_default();
                    if mode.contains(OpenMode::TRUNCATE) {
                        entry.clear();
                    }
                } else if !self.files.contains_key(&path) {
                    return status(open.id, StatusCode::NoSuchFile);
                }

                let handle = self.issue(HandleState::File(path));
                wire::Response::Handle(wire::Handle {
                    id: open.id,
                    handle: handle.into(),
                })
            }
            Request::Close(close) => match self.handles.remove(close.handle.as_ref()) {
                Some(_) => ok(close.id),
                None => status(close.id, StatusCode::Failure),
            },
            Request::Read(read) => {
                let Some(HandleState::File(path)) = self.handles.get(read.handle.as_ref()) else {
                    return status(read.id, StatusCode::Failure);
                };

                let file = &self.files[path];
                let offset = read.offset as usize;
                let length = self
                    .read_cap
                    .map_or(read.length, |cap| read.length.min(cap))
                    as usize;

                if offset >= file.len() {
                    status(read.id, StatusCode::Eof)
                } else {
                    let end = (offset + length).min(file.len());
                    wire::Response::Data(wire::Data {
                        id: read.id,
                        data: file[offset..end].to_vec().into(),
                    })
                }
            }
            Request::Write(write) => {
                let Some(HandleState::File(path)) = self.handles.get(write.handle.as_ref())
                else {
                    return status(write.id, StatusCode::Failure);
                };

                let file = self.files.get_mut(path).unwrap();
                let offset = write.offset as usize;
                if file.len() < offset + write.data.len() {
                    file.resize(offset + write.data.len(), 0);
                }
                file[offset..offset + write.data.len()].copy_from_slice(&write.data);

                ok(write.id)
            }
            Request::Stat(wire::Stat { id, path }) | Request::Lstat(wire::Lstat { id, path }) => {
                match self.files.get(&path.to_string()) {
                    Some(file) => wire::Response::Attrs(wire::Attrs {
                        id,
                        attrs: wire::Attributes::with_size(file.len() as u64),
                    }),
                    None => status(id, StatusCode::NoSuchFile),
                }
            }
            Request::Fstat(fstat) => {
                let Some(HandleState::File(path)) = self.handles.get(fstat.handle.as_ref())
                else {
                    return status(fstat.id, StatusCode::Failure);
                };

                wire::Response::Attrs(wire::Attrs {
                    id: fstat.id,
                    attrs: wire::Attributes::with_size(self.files[path].len() as u64),
                })
            }
            Request::SetStat(setstat) => ok(setstat.id),
            Request::FSetStat(fsetstat) => ok(fsetstat.id),
            Request::OpenDir(opendir) => {
                match self.listings.get(&opendir.path.to_string()) {
                    Some(entries) => {
                        let handle = self.issue(HandleState::Dir(entries.clone()));
                        wire::Response::Handle(wire::Handle {
                            id: opendir.id,
                            handle: handle.into(),
                        })
                    }
                    None => status(opendir.id, StatusCode::NoSuchFile),
                }
            }
            Request::ReadDir(readdir) => {
                let batch = self.batch;
                let Some(HandleState::Dir(remaining)) =
                    self.handles.get_mut(readdir.handle.as_ref())
                else {
                    return status(readdir.id, StatusCode::Failure);
                };

                if remaining.is_empty() {
                    status(readdir.id, StatusCode::Eof)
                } else {
                    let entries = remaining
                        .drain(..batch.min(remaining.len()))
                        .collect::<Vec<_>>();

                    name(readdir.id, entries)
                }
            }
            Request::Remove(remove) => {
                match self.files.remove(&remove.filename.to_string()) {
                    Some(_) => ok(remove.id),
                    None => status(remove.id, StatusCode::NoSuchFile),
                }
            }
            Request::MkDir(mkdir) => {
                self.listings.insert(mkdir.path.to_string(), Vec::new());

                ok(mkdir.id)
            }
            Request::RmDir(rmdir) => match self.listings.remove(&rmdir.path.to_string()) {
                Some(_) => ok(rmdir.id),
                None => status(rmdir.id, StatusCode::NoSuchFile),
            },
            Request::RealPath(realpath) => {
                let canonical = format!("/{}", realpath.path.trim_start_matches("./"));

                name(realpath.id, [canonical])
            }
            Request::ReadLink(readlink) => name(readlink.id, ["target".to_string()]),
            Request::Symlink(symlink) => ok(symlink.id),
            Request::Rename(rename) => {
                let (old, new) = (rename.oldpath.to_string(), rename.newpath.to_string());

                if self.files.contains_key(&new) {
                    return status(rename.id, StatusCode::Failure);
                }

                match self.files.remove(&old) {
                    Some(file) => {
                        self.files.insert(new, file);

                        ok(rename.id)
                    }
                    None => status(rename.id, StatusCode::NoSuchFile),
                }
            }
            Request::Extended(extended) => {
                if &*extended.request != "posix-rename@openssh.com" {
                    return status(extended.id, StatusCode::OpUnsupported);
                }

                let mut cursor = std::io::Cursor::new(&extended.data);
                let old = sesh_wire::arch::Utf8::read(&mut cursor).unwrap().to_string();
                let new = sesh_wire::arch::Utf8::read(&mut cursor).unwrap().to_string();

                match self.files.remove(&old) {
                    Some(file) => {
                        self.files.insert(new, file);

                        ok(extended.id)
                    }
                    None => status(extended.id, StatusCode::NoSuchFile),
                }
            }
        }
    }

    async fn serve<R, W>(mut self, mut reader: R, mut writer: W)
    where
        R: futures::AsyncRead + Unpin,
        W: futures::AsyncWrite + Unpin,
    {
        let frame = wire::read_frame(&mut reader).await.unwrap();
        let init = wire::Init::read(&mut std::io::Cursor::new(&frame)).unwrap();
        assert!(init.version >= 3);

        wire::write_frame(
            &mut writer,
            &wire::Version {
                version: 3,
                extensions: self
                    .extensions
                    .iter()
                    .map(|(name, data)| wire::Extension {
                        name: (*name).into(),
                        data: (*data).into(),
                    })
                    .collect(),
            },
        )
        .await
        .unwrap();

        while let Ok(frame) = wire::read_frame(&mut reader).await {
            let request = Request::read(&mut std::io::Cursor::new(&frame)).unwrap();
            let response = self.on_request(request);

            wire::write_frame(&mut writer, &response).await.unwrap();
        }
    }
}

type Reader = futures::io::ReadHalf<async_compat::Compat<tokio::io::DuplexStream>>;
type Writer = futures::io::WriteHalf<async_compat::Compat<tokio::io::DuplexStream>>;

/// Spawn the stub server over an in-memory duplex and handshake
/// a client against it.
async fn connect(stub: Stub) -> SftpClient<Reader, Writer> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init()
        .ok();

    let (ours, theirs) = tokio::io::duplex(0x100000);
    let (server_reader, server_writer) = theirs.compat().split();

    tokio::spawn(stub.serve(server_reader, server_writer));

    let (reader, writer) = ours.compat().split();
    SftpClient::new(reader, writer).await.unwrap()
}

#[tokio::test]
async fn put_and_get_a_megabyte() {
    let client = connect(Stub::default()).await;

    let mut payload = vec![0u8; 0x100000];
    rand::thread_rng().fill_bytes(&mut payload);

    let mut writer = client.writer("upload.bin").await.unwrap();
    writer.write_all(&payload).await.unwrap();
    writer.close().await.unwrap();

    let attrs = client.stat("upload.bin").await.unwrap();
    assert_eq!(attrs.size, Some(1_048_576));

    let mut fetched = Vec::new();
    let mut reader = client.reader("upload.bin").await.unwrap();
    reader.read_to_end(&mut fetched).await.unwrap();

    assert_eq!(fetched, payload);
}

#[tokio::test]
async fn short_reads_are_reassembled() {
    let mut stub = Stub::default();
    stub.read_cap = Some(1000);
    stub.files
        .insert("chunky.bin".into(), (0..=255u8).cycle().take(65536).collect());

    let client = connect(stub).await;

    let mut fetched = Vec::new();
    let mut reader = client.reader("chunky.bin").await.unwrap();
    reader.read_to_end(&mut fetched).await.unwrap();

    assert_eq!(
        fetched,
        (0..=255u8).cycle().take(65536).collect::<Vec<_>>()
    );
}

#[tokio::test]
async fn readdir_runs_through_every_batch() {
    let mut stub = Stub::default();
    stub.batch = 100;
    stub.listings.insert(
        "bulk".into(),
        (0..2500).map(|n| format!("entry-{n:04}")).collect(),
    );

    let client = connect(stub).await;

    let mut dir = client.read_dir("bulk").await.unwrap();

    let mut seen = std::collections::HashSet::new();
    while let Some(entry) = dir.next().await {
        let entry = entry.unwrap();
        assert!(
            seen.insert(entry.filename.to_string()),
            "duplicated entry {}",
            entry.filename
        );
    }

    assert_eq!(seen.len(), 2500);
}

#[tokio::test]
async fn concurrent_requests_are_matched_by_id() {
    let mut stub = Stub::default();
    stub.files.insert("a".into(), vec![0; 11]);
    stub.files.insert("b".into(), vec![0; 22]);

    let client = connect(stub).await;

    let (a, b) = futures::join!(client.stat("a"), client.stat("b"));

    assert_eq!(a.unwrap().size, Some(11));
    assert_eq!(b.unwrap().size, Some(22));
}

#[tokio::test]
async fn exclusive_requires_create() {
    let client = connect(Stub::default()).await;

    let result = client.open("locked", OpenMode::WRITE | OpenMode::EXCLUSIVE).await;

    assert!(matches!(result, Err(Error::InvalidArgument(_))));
}

#[tokio::test]
async fn atomic_rename_needs_the_extension() {
    let mut stub = Stub::default();
    stub.files.insert("from".into(), vec![1, 2, 3]);

    let client = connect(stub).await;

    let result = client.rename("from", "to", CopyMode::Atomic).await;
    assert!(matches!(result, Err(Error::Unsupported(_))));

    // Plain renames go through regardless.
    client.rename("from", "to", CopyMode::Standard).await.unwrap();
    assert_eq!(client.stat("to").await.unwrap().size, Some(3));
}

#[tokio::test]
async fn atomic_rename_with_the_extension() {
    let mut stub = Stub::default();
    stub.extensions = vec![("posix-rename@openssh.com", "1")];
    stub.files.insert("from".into(), vec![1, 2, 3]);

    let client = connect(stub).await;

    client.rename("from", "to", CopyMode::Atomic).await.unwrap();
    assert_eq!(client.stat("to").await.unwrap().size, Some(3));
    assert!(client.stat("from").await.unwrap_err().is_no_such_file());
}

#[tokio::test]
async fn missing_files_surface_their_status() {
    let client = connect(Stub::default()).await;

    let err = client.open("absent", OpenMode::READ).await.unwrap_err();
    assert!(err.is_no_such_file());

    let err = client.stat("absent").await.unwrap_err();
    assert!(err.is_no_such_file());
}

#[tokio::test]
async fn paths_resolve_and_links_roundtrip() {
    let client = connect(Stub::default()).await;

    assert_eq!(client.realpath("./workdir").await.unwrap(), "/workdir");

    client.symlink("link", "target").await.unwrap();
    assert_eq!(client.readlink("link").await.unwrap(), "target");

    client.mkdir("fresh").await.unwrap();
    client.rmdir("fresh").await.unwrap();
}

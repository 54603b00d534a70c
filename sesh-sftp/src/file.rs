use std::{
    collections::VecDeque,
    io::{self, Read as _},
    pin::Pin,
    task,
};

use futures::{future::BoxFuture, AsyncRead, AsyncWrite, FutureExt};
use sesh_wire::arch::Bytes;

use crate::{Result, SftpClient};

fn io_err(err: crate::Error) -> io::Error {
    io::Error::new(io::ErrorKind::Other, err)
}

enum ReadState<'c> {
    Idle,
    Reading(BoxFuture<'c, Result<Option<Vec<u8>>>>),
    Closing(BoxFuture<'c, Result<()>>),
    Done,
}

/// An [`AsyncRead`] adapter over a remote file.
///
/// Issues `SSH_FXP_READ` requests of the configured chunk size at the
/// running offset, and closes the handle once the end of the stream is
/// reached. Dropping the adapter early leaks the remote handle, call
/// [`Reader::close`] to dispose of it deterministically.
pub struct Reader<'c, R, W> {
    client: &'c SftpClient<R, W>,
    handle: Bytes,

    offset: u64,
    buffer: VecDeque<u8>,
    state: ReadState<'c>,
}

impl<'c, R, W> Reader<'c, R, W>
where
    R: AsyncRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    pub(crate) fn new(client: &'c SftpClient<R, W>, handle: Bytes) -> Self {
        Self {
            client,
            handle,

            offset: 0,
            buffer: VecDeque::new(),
            state: ReadState::Idle,
        }
    }

    /// Dispose of the remote handle without reading to the end.
    pub async fn close(self) -> Result<()> {
        match self.state {
            ReadState::Done => Ok(()),
            _ => self.client.close(&self.handle).await,
        }
    }
}

impl<R, W> AsyncRead for Reader<'_, R, W>
where
    R: AsyncRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut task::Context<'_>,
        buf: &mut [u8],
    ) -> task::Poll<io::Result<usize>> {
        loop {
            if !self.buffer.is_empty() {
                return task::Poll::Ready(self.buffer.read(buf));
            }

            match &mut self.state {
                ReadState::Idle => {
                    let (client, handle) = (self.client, self.handle.clone());
                    let (offset, chunk) = (self.offset, client.config.read_chunk);

                    self.state = ReadState::Reading(
                        async move { client.read(&handle, offset, chunk).await }.boxed(),
                    );
                }
                ReadState::Reading(fut) => match futures::ready!(fut.poll_unpin(cx)) {
                    // A zero-length chunk carries no progress, treat it
                    // as the end of the stream like an EOF status.
                    Ok(Some(data)) if !data.is_empty() => {
                        self.offset += data.len() as u64;
                        self.buffer.extend(data);
                        self.state = ReadState::Idle;
                    }
                    Ok(_) => {
                        let (client, handle) = (self.client, self.handle.clone());

                        self.state = ReadState::Closing(
                            async move { client.close(&handle).await }.boxed(),
                        );
                    }
                    Err(err) => {
                        self.state = ReadState::Done;

                        return task::Poll::Ready(Err(io_err(err)));
                    }
                },
                ReadState::Closing(fut) => {
                    let result = futures::ready!(fut.poll_unpin(cx));
                    self.state = ReadState::Done;

                    return task::Poll::Ready(result.map(|()| 0).map_err(io_err));
                }
                ReadState::Done => return task::Poll::Ready(Ok(0)),
            }
        }
    }
}

enum WriteState<'c> {
    Idle,
    Writing(BoxFuture<'c, Result<usize>>),
    Closing(BoxFuture<'c, Result<()>>),
    Done,
}

/// An [`AsyncWrite`] adapter over a remote file.
///
/// Buffers writes up to the configured chunk size and flushes them
/// with `SSH_FXP_WRITE` at the running offset. Closing the adapter
/// flushes the remainder and disposes of the remote handle.
pub struct Writer<'c, R, W> {
    client: &'c SftpClient<R, W>,
    handle: Bytes,

    offset: u64,
    buffer: Vec<u8>,
    state: WriteState<'c>,
}

impl<'c, R, W> Writer<'c, R, W>
where
    R: AsyncRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    pub(crate) fn new(client: &'c SftpClient<R, W>, handle: Bytes) -> Self {
        Self {
            client,
            handle,

            offset: 0,
            buffer: Vec::new(),
            state: WriteState::Idle,
        }
    }

    /// Drive the in-flight chunk, then start writing the buffered one.
    fn poll_flush_chunks(&mut self, cx: &mut task::Context<'_>) -> task::Poll<io::Result<()>> {
        loop {
            match &mut self.state {
                WriteState::Idle => {
                    if self.buffer.is_empty() {
                        return task::Poll::Ready(Ok(()));
                    }

                    let (client, handle) = (self.client, self.handle.clone());
                    let (offset, data) = (self.offset, std::mem::take(&mut self.buffer));

                    self.state = WriteState::Writing(
                        async move {
                            client.write(&handle, offset, &data).await?;

                            Ok(data.len())
                        }
                        .boxed(),
                    );
                }
                WriteState::Writing(fut) => {
                    let written = futures::ready!(fut.poll_unpin(cx)).map_err(io_err)?;

                    self.offset += written as u64;
                    self.state = WriteState::Idle;
                }
                WriteState::Closing(_) | WriteState::Done => {
                    return task::Poll::Ready(Err(io::Error::new(
                        io::ErrorKind::BrokenPipe,
                        "the writer has already been closed",
                    )));
                }
            }
        }
    }
}

impl<R, W> AsyncWrite for Writer<'_, R, W>
where
    R: AsyncRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    fn poll_write(
        mut self: Pin<&mut Self>,
        cx: &mut task::Context<'_>,
        buf: &[u8],
    ) -> task::Poll<io::Result<usize>> {
        let chunk = self.client.config.write_chunk as usize;

        if self.buffer.len() >= chunk {
            futures::ready!(self.poll_flush_chunks(cx))?;
        }

        let writable = buf.len().min(chunk - self.buffer.len());
        self.buffer.extend_from_slice(&buf[..writable]);

        task::Poll::Ready(Ok(writable))
    }

    fn poll_flush(
        mut self: Pin<&mut Self>,
        cx: &mut task::Context<'_>,
    ) -> task::Poll<io::Result<()>> {
        self.poll_flush_chunks(cx)
    }

    fn poll_close(
        mut self: Pin<&mut Self>,
        cx: &mut task::Context<'_>,
    ) -> task::Poll<io::Result<()>> {
        loop {
            match &mut self.state {
                WriteState::Idle | WriteState::Writing(_) => {
                    futures::ready!(self.poll_flush_chunks(cx))?;

                    let (client, handle) = (self.client, self.handle.clone());
                    self.state = WriteState::Closing(
                        async move { client.close(&handle).await }.boxed(),
                    );
                }
                WriteState::Closing(fut) => {
                    let result = futures::ready!(fut.poll_unpin(cx));
                    self.state = WriteState::Done;

                    return task::Poll::Ready(result.map_err(io_err));
                }
                WriteState::Done => return task::Poll::Ready(Ok(())),
            }
        }
    }
}

use std::collections::VecDeque;

use futures::{AsyncRead, AsyncWrite};
use sesh_wire::arch::Bytes;

use crate::{wire::DirEntry, Result, SftpClient};

/// A lazy iterator over the entries of a remote directory.
///
/// One `SSH_FXP_READDIR` batch is buffered at a time; the directory
/// handle is closed automatically once the server reports the end of
/// the listing. The iterator is finite and not restartable.
pub struct ReadDir<'c, R, W> {
    client: &'c SftpClient<R, W>,

    handle: Option<Bytes>,
    batch: VecDeque<DirEntry>,
}

impl<'c, R, W> ReadDir<'c, R, W>
where
    R: AsyncRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    pub(crate) fn new(client: &'c SftpClient<R, W>, handle: Bytes) -> Self {
        Self {
            client,
            handle: Some(handle),
            batch: VecDeque::new(),
        }
    }

    /// The next directory entry, `None` once the listing is over.
    pub async fn next(&mut self) -> Option<Result<DirEntry>> {
        loop {
            if let Some(entry) = self.batch.pop_front() {
                return Some(Ok(entry));
            }

            let handle = self.handle.as_ref()?;

            match self.client.readdir(handle).await {
                Ok(Some(entries)) => self.batch.extend(entries),
                Ok(None) => {
                    // End of the listing: release the handle.
                    let handle = self.handle.take()?;

                    if let Err(err) = self.client.close(&handle).await {
                        return Some(Err(err));
                    }

                    return None;
                }
                Err(err) => {
                    self.handle.take();

                    return Some(Err(err));
                }
            }
        }
    }

    /// Drain the remaining entries into a vector.
    pub async fn collect(mut self) -> Result<Vec<DirEntry>> {
        let mut entries = Vec::new();

        while let Some(entry) = self.next().await {
            entries.push(entry?);
        }

        Ok(entries)
    }
}

//! In-memory file buffers.
//!
//! Reads are served from a fully fetched copy of the content. Writes are
//! buffered and only turned into a `FileUpdate` event when the writer is
//! flushed.

use crate::error::{NomadError, NomadResult};
use nomad_store::AddOptions;
use nomad_sync::{ensure_live, Replica};
use nomad_types::UpdateEvent;
use std::io::{self, Cursor, Read, Seek, SeekFrom, Write};
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::io::{AsyncRead, AsyncSeek, ReadBuf};
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// A seekable reader over a file's content.
#[derive(Debug, Clone, Default)]
pub struct FileReader {
    cursor: Cursor<Vec<u8>>,
}

impl FileReader {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self {
            cursor: Cursor::new(bytes),
        }
    }

    /// Length of the content.
    pub fn len(&self) -> u64 {
        self.cursor.get_ref().len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.cursor.get_ref().is_empty()
    }

    /// The whole content, regardless of position.
    pub fn bytes(&self) -> &[u8] {
        self.cursor.get_ref()
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.cursor.into_inner()
    }
}

impl Read for FileReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.cursor.read(buf)
    }
}

impl Seek for FileReader {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.cursor.seek(pos)
    }
}

impl AsyncRead for FileReader {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        Pin::new(&mut self.cursor).poll_read(cx, buf)
    }
}

impl AsyncSeek for FileReader {
    fn start_seek(mut self: Pin<&mut Self>, position: SeekFrom) -> io::Result<()> {
        Pin::new(&mut self.cursor).start_seek(position)
    }

    fn poll_complete(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<u64>> {
        Pin::new(&mut self.cursor).poll_complete(cx)
    }
}

/// A buffered writer for one file of a modifiable tree.
///
/// The buffer starts with the file's current content. Nothing is appended
/// to the event stream until [`FileWriter::flush`] or [`FileWriter::close`].
pub struct FileWriter {
    replica: Arc<Replica>,
    file_id: String,
    buffer: Cursor<Vec<u8>>,
}

impl FileWriter {
    pub(crate) fn new(replica: Arc<Replica>, file_id: impl Into<String>, current: Vec<u8>) -> Self {
        Self {
            replica,
            file_id: file_id.into(),
            buffer: Cursor::new(current),
        }
    }

    /// Id of the file being written.
    pub fn file_id(&self) -> &str {
        &self.file_id
    }

    /// Length of the buffered content.
    pub fn len(&self) -> u64 {
        self.buffer.get_ref().len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.get_ref().is_empty()
    }

    /// The buffered content.
    pub fn bytes(&self) -> &[u8] {
        self.buffer.get_ref()
    }

    /// Truncates or zero-extends the buffer to `len` bytes.
    ///
    /// The position is clamped to the new length.
    pub fn set_len(&mut self, len: u64) -> NomadResult<()> {
        let len = usize::try_from(len)
            .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "length out of range"))?;
        self.buffer.get_mut().resize(len, 0);
        if self.buffer.position() > len as u64 {
            self.buffer.set_position(len as u64);
        }
        Ok(())
    }

    /// Commits the buffered content to the file.
    ///
    /// The content is first hashed without storing it. When that matches
    /// the file's current pointer nothing is appended and `false` is
    /// returned.
    pub async fn flush(&mut self, cancel: &CancellationToken) -> NomadResult<bool> {
        ensure_live(cancel)?;
        let current = self
            .replica
            .file(&self.file_id)
            .await
            .ok_or_else(|| NomadError::ItemNotFound(self.file_id.clone()))?
            .content_id;

        let bytes = self.buffer.get_ref();
        let probe = self
            .replica
            .content()
            .add_bytes(bytes, AddOptions::hash_only())
            .await?;
        let unchanged = match &current {
            Some(current) => *current == probe,
            None => bytes.is_empty(),
        };
        if unchanged {
            debug!("Write to {} unchanged, nothing appended", self.file_id);
            return Ok(false);
        }

        ensure_live(cancel)?;
        let pointer = self
            .replica
            .content()
            .put_bytes(bytes, self.replica.config().should_pin)
            .await?;
        self.replica
            .apply_and_append(&UpdateEvent::file_update(&self.file_id, pointer), cancel)
            .await?;
        debug!("Wrote {} bytes to {}", bytes.len(), self.file_id);
        Ok(true)
    }

    /// Flushes and releases the writer.
    pub async fn close(mut self, cancel: &CancellationToken) -> NomadResult<bool> {
        self.flush(cancel).await
    }
}

impl Write for FileWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.buffer.write(buf)
    }

    /// Buffered bytes are committed by the async [`FileWriter::flush`].
    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Seek for FileWriter {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.buffer.seek(pos)
    }
}

impl std::fmt::Debug for FileWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileWriter")
            .field("file_id", &self.file_id)
            .field("len", &self.buffer.get_ref().len())
            .field("position", &self.buffer.position())
            .finish()
    }
}

//! Modifiable file over a shared replica.

use crate::error::{NomadError, NomadResult};
use crate::folder::NomadFolder;
use crate::read_only::read_content;
use crate::stream::{FileReader, FileWriter};
use crate::traits::{ReadableFile, Storable, WritableFile};
use async_trait::async_trait;
use nomad_sync::{Replica, ResolvedEntry};
use nomad_types::{ContentPointer, NomadFileData};
use std::io::Write;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// A file of a tree this peer can modify.
#[derive(Debug, Clone)]
pub struct NomadFile {
    replica: Arc<Replica>,
    id: String,
    name: String,
}

impl NomadFile {
    pub(crate) fn new(replica: Arc<Replica>, id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            replica,
            id: id.into(),
            name: name.into(),
        }
    }

    /// A copy of this file's current data.
    pub async fn data(&self) -> NomadResult<NomadFileData> {
        self.replica
            .file(&self.id)
            .await
            .ok_or_else(|| NomadError::ItemNotFound(self.id.clone()))
    }

    /// Last entry applied to this file.
    pub async fn event_stream_position(&self) -> Option<ResolvedEntry> {
        self.replica.position(&self.id).await
    }

    /// The folder containing this file.
    pub async fn parent(&self) -> Option<NomadFolder> {
        let parent_id = self.replica.parent_of(&self.id).await?;
        let parent = self.replica.folder(&parent_id).await?;
        Some(NomadFolder::new(
            self.replica.clone(),
            parent.storable_item_id,
            parent.storable_item_name,
        ))
    }

    /// Replaces the whole content with `bytes`.
    ///
    /// Returns whether an update was appended.
    pub async fn write_bytes(&self, bytes: &[u8], cancel: &CancellationToken) -> NomadResult<bool> {
        let mut writer = self.open_write(cancel).await?;
        writer.set_len(0)?;
        writer.write_all(bytes)?;
        writer.close(cancel).await
    }

    async fn current(&self, cancel: &CancellationToken) -> NomadResult<NomadFileData> {
        self.replica.ensure_replayed(cancel).await?;
        self.data().await
    }
}

impl Storable for NomadFile {
    fn id(&self) -> &str {
        &self.id
    }

    fn name(&self) -> &str {
        &self.name
    }
}

#[async_trait]
impl ReadableFile for NomadFile {
    async fn content_pointer(
        &self,
        cancel: &CancellationToken,
    ) -> NomadResult<Option<ContentPointer>> {
        Ok(self.current(cancel).await?.content_id)
    }

    async fn open_read(&self, cancel: &CancellationToken) -> NomadResult<FileReader> {
        let data = self.current(cancel).await?;
        read_content(
            self.replica.content().as_ref(),
            data.content_id.as_ref(),
            cancel,
        )
        .await
    }
}

#[async_trait]
impl WritableFile for NomadFile {
    async fn open_write(&self, cancel: &CancellationToken) -> NomadResult<FileWriter> {
        let current = self.open_read(cancel).await?.into_bytes();
        Ok(FileWriter::new(self.replica.clone(), &self.id, current))
    }
}

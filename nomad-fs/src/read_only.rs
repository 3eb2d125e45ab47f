//! Read-only projection of a published roaming snapshot.
//!
//! The state is exactly what was published. Nothing is resolved or
//! replayed, so reads never observe history the publisher had not folded.

use crate::error::{NomadError, NomadResult};
use crate::stream::FileReader;
use crate::traits::{Item, ItemKind, ReadableFile, ReadableFolder, Storable};
use async_trait::async_trait;
use nomad_store::{ContentStore, NameService};
use nomad_sync::{ensure_live, resolve_roaming_snapshot, SyncError};
use nomad_types::{ChildRef, ContentPointer, MutablePointer, NomadFileData, NomadFolderData};
use std::collections::BTreeSet;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// A folder of a published snapshot.
#[derive(Clone)]
pub struct ReadOnlyNomadFolder {
    data: Arc<NomadFolderData>,
    content: Arc<dyn ContentStore>,
}

impl ReadOnlyNomadFolder {
    pub fn new(data: NomadFolderData, content: Arc<dyn ContentStore>) -> Self {
        Self {
            data: Arc::new(data),
            content,
        }
    }

    /// Resolves the snapshot currently published under `roaming_id`.
    pub async fn from_roaming(
        roaming_id: &MutablePointer,
        content: Arc<dyn ContentStore>,
        names: &dyn NameService,
        use_cache: bool,
        cancel: &CancellationToken,
    ) -> NomadResult<Self> {
        let data =
            resolve_roaming_snapshot(roaming_id, content.as_ref(), names, use_cache, cancel)
                .await?
                .ok_or_else(|| SyncError::MissingSnapshot(roaming_id.to_string()))?;
        Ok(Self::new(data, content))
    }

    /// The snapshot of this subtree.
    pub fn data(&self) -> &NomadFolderData {
        &self.data
    }

    /// Event streams the publisher merged.
    pub fn sources(&self) -> &BTreeSet<MutablePointer> {
        &self.data.sources
    }

    fn materialize(&self, child: ChildRef<'_>) -> Item<ReadOnlyNomadFile, ReadOnlyNomadFolder> {
        match child {
            ChildRef::File(file) => Item::File(ReadOnlyNomadFile::new(
                file.clone(),
                self.content.clone(),
            )),
            ChildRef::Folder(folder) => Item::Folder(Self::new(
                folder.clone(),
                self.content.clone(),
            )),
        }
    }
}

impl Storable for ReadOnlyNomadFolder {
    fn id(&self) -> &str {
        &self.data.storable_item_id
    }

    fn name(&self) -> &str {
        &self.data.storable_item_name
    }
}

#[async_trait]
impl ReadableFolder for ReadOnlyNomadFolder {
    type File = ReadOnlyNomadFile;
    type Folder = ReadOnlyNomadFolder;

    async fn get_items(
        &self,
        kind: ItemKind,
        cancel: &CancellationToken,
    ) -> NomadResult<Vec<Item<ReadOnlyNomadFile, ReadOnlyNomadFolder>>> {
        ensure_live(cancel)?;
        Ok(self
            .data
            .children()
            .filter(|child| kind.includes(child.kind()))
            .map(|child| self.materialize(child))
            .collect())
    }

    async fn get_first_by_name(
        &self,
        name: &str,
        cancel: &CancellationToken,
    ) -> NomadResult<Item<ReadOnlyNomadFile, ReadOnlyNomadFolder>> {
        ensure_live(cancel)?;
        self.data
            .child_by_name(name)
            .map(|child| self.materialize(child))
            .ok_or_else(|| NomadError::ItemNotFound(name.to_string()))
    }
}

impl std::fmt::Debug for ReadOnlyNomadFolder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReadOnlyNomadFolder")
            .field("id", &self.data.storable_item_id)
            .field("name", &self.data.storable_item_name)
            .finish_non_exhaustive()
    }
}

/// A file of a published snapshot.
#[derive(Clone)]
pub struct ReadOnlyNomadFile {
    data: NomadFileData,
    content: Arc<dyn ContentStore>,
}

impl ReadOnlyNomadFile {
    pub fn new(data: NomadFileData, content: Arc<dyn ContentStore>) -> Self {
        Self { data, content }
    }

    pub fn data(&self) -> &NomadFileData {
        &self.data
    }
}

impl Storable for ReadOnlyNomadFile {
    fn id(&self) -> &str {
        &self.data.storable_item_id
    }

    fn name(&self) -> &str {
        &self.data.storable_item_name
    }
}

#[async_trait]
impl ReadableFile for ReadOnlyNomadFile {
    async fn content_pointer(
        &self,
        cancel: &CancellationToken,
    ) -> NomadResult<Option<ContentPointer>> {
        ensure_live(cancel)?;
        Ok(self.data.content_id.clone())
    }

    async fn open_read(&self, cancel: &CancellationToken) -> NomadResult<FileReader> {
        read_content(self.content.as_ref(), self.data.content_id.as_ref(), cancel).await
    }
}

impl std::fmt::Debug for ReadOnlyNomadFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReadOnlyNomadFile")
            .field("data", &self.data)
            .finish_non_exhaustive()
    }
}

/// Fetches the bytes behind `pointer`. A file with no content reads empty.
pub(crate) async fn read_content(
    content: &dyn ContentStore,
    pointer: Option<&ContentPointer>,
    cancel: &CancellationToken,
) -> NomadResult<FileReader> {
    ensure_live(cancel)?;
    let Some(pointer) = pointer else {
        return Ok(FileReader::default());
    };
    let bytes = content
        .get_bytes(pointer)
        .await?
        .ok_or_else(|| NomadError::ContentUnavailable(pointer.to_string()))?;
    Ok(FileReader::new(bytes))
}

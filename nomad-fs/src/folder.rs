//! Modifiable folder over a shared replica.

use crate::error::{NomadError, NomadResult};
use crate::file::NomadFile;
use crate::traits::{Item, ItemKind, ReadableFile, ReadableFolder, Storable, WritableFolder};
use async_trait::async_trait;
use nomad_sync::{Applied, RefreshOutcome, Replica, ResolvedEntry};
use nomad_types::{child_id, ChildRef, MutablePointer, NomadFolderData, UpdateEvent};
use std::collections::BTreeSet;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// A folder of a tree this peer can modify.
///
/// Every folder of one tree shares the same [`Replica`], so they share one
/// local event stream and one source set.
#[derive(Debug, Clone)]
pub struct NomadFolder {
    replica: Arc<Replica>,
    id: String,
    name: String,
}

impl NomadFolder {
    pub(crate) fn new(replica: Arc<Replica>, id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            replica,
            id: id.into(),
            name: name.into(),
        }
    }

    /// The root folder of `replica`.
    pub async fn from_replica(replica: Arc<Replica>) -> Self {
        let name = replica.snapshot().await.storable_item_name;
        let id = replica.root_id().to_string();
        Self::new(replica, id, name)
    }

    /// The replication context this folder belongs to.
    pub fn replica(&self) -> &Arc<Replica> {
        &self.replica
    }

    pub fn is_root(&self) -> bool {
        self.id == self.replica.root_id()
    }

    /// A copy of this folder's current data.
    pub async fn data(&self) -> NomadResult<NomadFolderData> {
        self.replica
            .folder(&self.id)
            .await
            .ok_or_else(|| NomadError::ItemNotFound(self.id.clone()))
    }

    /// Sources merged into this folder.
    pub async fn sources(&self) -> NomadResult<BTreeSet<MutablePointer>> {
        Ok(self.data().await?.sources)
    }

    /// Last entry applied to this folder.
    pub async fn event_stream_position(&self) -> Option<ResolvedEntry> {
        self.replica.position(&self.id).await
    }

    /// The folder containing this one, `None` for the root.
    pub async fn parent(&self) -> Option<NomadFolder> {
        let parent_id = self.replica.parent_of(&self.id).await?;
        let parent = self.replica.folder(&parent_id).await?;
        Some(Self::new(
            self.replica.clone(),
            parent.storable_item_id,
            parent.storable_item_name,
        ))
    }

    /// Walks the parent chain up to the root folder.
    pub async fn root(&self) -> NomadFolder {
        let mut current = self.clone();
        loop {
            let Some(parent) = current.parent().await else {
                return current;
            };
            current = parent;
        }
    }

    /// Pulls history from every source and replays what is new.
    pub async fn refresh(&self, cancel: &CancellationToken) -> NomadResult<RefreshOutcome> {
        Ok(self.replica.refresh(cancel).await?)
    }

    /// Publishes the local stream and the roaming snapshot of the whole tree.
    ///
    /// Called on a child folder this flushes the root, so a partial
    /// snapshot is never published.
    pub async fn flush(&self, cancel: &CancellationToken) -> NomadResult<()> {
        let root = self.root().await;
        if !self.is_root() {
            debug!("Flushing {} through root {}", self.id, root.id);
        }
        root.replica.flush(cancel).await?;
        Ok(())
    }

    async fn append(&self, event: UpdateEvent, cancel: &CancellationToken) -> NomadResult<Applied> {
        let outcome = self.replica.apply_and_append(&event, cancel).await?;
        debug!("{} on {}: {:?}", event.event_id(), self.id, outcome);
        Ok(outcome)
    }

    fn materialize(&self, child: ChildRef<'_>) -> Item<NomadFile, NomadFolder> {
        match child {
            ChildRef::File(file) => Item::File(NomadFile::new(
                self.replica.clone(),
                &file.storable_item_id,
                &file.storable_item_name,
            )),
            ChildRef::Folder(folder) => Item::Folder(Self::new(
                self.replica.clone(),
                &folder.storable_item_id,
                &folder.storable_item_name,
            )),
        }
    }

    async fn current(&self, cancel: &CancellationToken) -> NomadResult<NomadFolderData> {
        self.replica.ensure_replayed(cancel).await?;
        self.data().await
    }
}

/// A child name must be a single path segment.
fn check_name(name: &str) -> NomadResult<()> {
    if name.is_empty() || name == "." || name == ".." || name.contains('/') {
        return Err(NomadError::InvalidName(name.to_string()));
    }
    Ok(())
}

impl Storable for NomadFolder {
    fn id(&self) -> &str {
        &self.id
    }

    fn name(&self) -> &str {
        &self.name
    }
}

#[async_trait]
impl ReadableFolder for NomadFolder {
    type File = NomadFile;
    type Folder = NomadFolder;

    async fn get_items(
        &self,
        kind: ItemKind,
        cancel: &CancellationToken,
    ) -> NomadResult<Vec<Item<NomadFile, NomadFolder>>> {
        let data = self.current(cancel).await?;
        Ok(data
            .children()
            .filter(|child| kind.includes(child.kind()))
            .map(|child| self.materialize(child))
            .collect())
    }

    async fn get_first_by_name(
        &self,
        name: &str,
        cancel: &CancellationToken,
    ) -> NomadResult<Item<NomadFile, NomadFolder>> {
        let data = self.current(cancel).await?;
        data.child_by_name(name)
            .map(|child| self.materialize(child))
            .ok_or_else(|| NomadError::ItemNotFound(name.to_string()))
    }
}

#[async_trait]
impl WritableFolder for NomadFolder {
    async fn create_folder(
        &self,
        name: &str,
        overwrite: bool,
        cancel: &CancellationToken,
    ) -> NomadResult<NomadFolder> {
        check_name(name)?;
        let data = self.current(cancel).await?;
        if !overwrite {
            if let Some(existing) = data.folder_by_name(name) {
                return Ok(Self::new(
                    self.replica.clone(),
                    &existing.storable_item_id,
                    &existing.storable_item_name,
                ));
            }
            if data.file_by_name(name).is_some() {
                return Err(NomadError::AlreadyExists(name.to_string()));
            }
        }

        self.append(UpdateEvent::create_folder(&self.id, name, overwrite), cancel)
            .await?;
        let id = child_id(&self.id, name);
        let created = self
            .replica
            .folder(&id)
            .await
            .ok_or_else(|| NomadError::ItemNotFound(id.clone()))?;
        Ok(Self::new(
            self.replica.clone(),
            created.storable_item_id,
            created.storable_item_name,
        ))
    }

    async fn create_file(
        &self,
        name: &str,
        overwrite: bool,
        cancel: &CancellationToken,
    ) -> NomadResult<NomadFile> {
        check_name(name)?;
        let data = self.current(cancel).await?;
        if !overwrite {
            if let Some(existing) = data.file_by_name(name) {
                return Ok(NomadFile::new(
                    self.replica.clone(),
                    &existing.storable_item_id,
                    &existing.storable_item_name,
                ));
            }
            if data.folder_by_name(name).is_some() {
                return Err(NomadError::AlreadyExists(name.to_string()));
            }
        }

        self.append(UpdateEvent::create_file(&self.id, name, overwrite), cancel)
            .await?;
        let id = child_id(&self.id, name);
        let created = self
            .replica
            .file(&id)
            .await
            .ok_or_else(|| NomadError::ItemNotFound(id.clone()))?;
        Ok(NomadFile::new(
            self.replica.clone(),
            created.storable_item_id,
            created.storable_item_name,
        ))
    }

    async fn delete(&self, item: &dyn Storable, cancel: &CancellationToken) -> NomadResult<()> {
        let data = self.current(cancel).await?;
        let present = data
            .children()
            .any(|child| child.id() == item.id() || child.name() == item.name());
        if !present {
            return Err(NomadError::ItemNotFound(item.id().to_string()));
        }

        self.append(UpdateEvent::delete(&self.id, item.id(), item.name()), cancel)
            .await?;
        Ok(())
    }

    async fn create_copy_of(
        &self,
        source: &dyn ReadableFile,
        overwrite: bool,
        cancel: &CancellationToken,
    ) -> NomadResult<NomadFile> {
        let name = source.name();
        check_name(name)?;
        let data = self.current(cancel).await?;
        if !overwrite && data.child_by_name(name).is_some() {
            return Err(NomadError::AlreadyExists(name.to_string()));
        }

        let pointer = match source.content_pointer(cancel).await? {
            Some(_) => {
                let bytes = source.open_read(cancel).await?.into_bytes();
                Some(
                    self.replica
                        .content()
                        .put_bytes(&bytes, self.replica.config().should_pin)
                        .await?,
                )
            }
            None => None,
        };

        self.append(UpdateEvent::create_file(&self.id, name, overwrite), cancel)
            .await?;
        let file_id = child_id(&self.id, name);
        if let Some(pointer) = pointer {
            self.append(UpdateEvent::file_update(&file_id, pointer), cancel)
                .await?;
        }

        info!("Copied {} into {}", source.id(), file_id);
        Ok(NomadFile::new(self.replica.clone(), file_id, name))
    }
}

//! Storage capability traits.
//!
//! Reading and writing are separate capabilities. A read-only projection of
//! a published snapshot implements only the readable traits, a modifiable
//! projection implements both.

use crate::error::NomadResult;
use crate::stream::{FileReader, FileWriter};
use async_trait::async_trait;
use nomad_types::{ContentPointer, NodeKind};
use tokio_util::sync::CancellationToken;

/// Anything with a stable id and a name.
pub trait Storable: Send + Sync {
    /// Unique id within the tree.
    fn id(&self) -> &str;

    /// Name within the parent folder.
    fn name(&self) -> &str;
}

/// Which children to list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ItemKind {
    #[default]
    All,
    Files,
    Folders,
}

impl ItemKind {
    /// Whether a node of `kind` is listed.
    pub fn includes(self, kind: NodeKind) -> bool {
        match self {
            Self::All => true,
            Self::Files => kind == NodeKind::File,
            Self::Folders => kind == NodeKind::Folder,
        }
    }
}

/// A child of a folder, either a file or a folder.
#[derive(Debug, Clone)]
pub enum Item<F, D> {
    File(F),
    Folder(D),
}

impl<F: Storable, D: Storable> Item<F, D> {
    pub fn id(&self) -> &str {
        match self {
            Self::File(file) => file.id(),
            Self::Folder(folder) => folder.id(),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Self::File(file) => file.name(),
            Self::Folder(folder) => folder.name(),
        }
    }

    pub fn kind(&self) -> NodeKind {
        match self {
            Self::File(_) => NodeKind::File,
            Self::Folder(_) => NodeKind::Folder,
        }
    }

    /// The file, if this is one.
    pub fn into_file(self) -> Option<F> {
        match self {
            Self::File(file) => Some(file),
            Self::Folder(_) => None,
        }
    }

    /// The folder, if this is one.
    pub fn into_folder(self) -> Option<D> {
        match self {
            Self::File(_) => None,
            Self::Folder(folder) => Some(folder),
        }
    }
}

/// A file whose content can be read.
#[async_trait]
pub trait ReadableFile: Storable {
    /// Pointer to the current content, `None` for a never-written file.
    async fn content_pointer(
        &self,
        cancel: &CancellationToken,
    ) -> NomadResult<Option<ContentPointer>>;

    /// Opens the current content for reading.
    async fn open_read(&self, cancel: &CancellationToken) -> NomadResult<FileReader>;
}

/// A folder whose children can be listed.
#[async_trait]
pub trait ReadableFolder: Storable {
    type File: ReadableFile;
    type Folder: ReadableFolder;

    /// Lists direct children, files first.
    async fn get_items(
        &self,
        kind: ItemKind,
        cancel: &CancellationToken,
    ) -> NomadResult<Vec<Item<Self::File, Self::Folder>>>;

    /// Finds a direct child by name, files first.
    ///
    /// Fails with [`NomadError::ItemNotFound`](crate::NomadError::ItemNotFound)
    /// when no child has this name.
    async fn get_first_by_name(
        &self,
        name: &str,
        cancel: &CancellationToken,
    ) -> NomadResult<Item<Self::File, Self::Folder>>;
}

/// A file whose content can be replaced.
#[async_trait]
pub trait WritableFile: ReadableFile {
    /// Opens a buffered writer pre-filled with the current content.
    async fn open_write(&self, cancel: &CancellationToken) -> NomadResult<FileWriter>;
}

/// A folder whose children can be created and deleted.
#[async_trait]
pub trait WritableFolder: ReadableFolder {
    /// Creates a child folder.
    ///
    /// Without `overwrite` an existing folder of that name is returned as is.
    async fn create_folder(
        &self,
        name: &str,
        overwrite: bool,
        cancel: &CancellationToken,
    ) -> NomadResult<Self::Folder>;

    /// Creates an empty child file.
    ///
    /// Without `overwrite` an existing file of that name is returned as is.
    async fn create_file(
        &self,
        name: &str,
        overwrite: bool,
        cancel: &CancellationToken,
    ) -> NomadResult<Self::File>;

    /// Deletes a direct child.
    async fn delete(&self, item: &dyn Storable, cancel: &CancellationToken) -> NomadResult<()>;

    /// Copies `source` into this folder under the same name.
    ///
    /// Without `overwrite` an existing child of that name is an error.
    async fn create_copy_of(
        &self,
        source: &dyn ReadableFile,
        overwrite: bool,
        cancel: &CancellationToken,
    ) -> NomadResult<Self::File>;
}

//! Roaming snapshot data: the publishable current-state tree.

use crate::{ContentPointer, MutablePointer};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Kind of node in a folder tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeKind {
    File,
    Folder,
}

/// Snapshot of a single file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NomadFileData {
    pub storable_item_id: String,
    pub storable_item_name: String,
    /// Pointer to the file's bytes. `None` is an empty, never-written file.
    #[serde(default)]
    pub content_id: Option<ContentPointer>,
}

impl NomadFileData {
    /// Creates an empty file snapshot.
    #[must_use]
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            storable_item_id: id.into(),
            storable_item_name: name.into(),
            content_id: None,
        }
    }
}

/// Snapshot of a folder subtree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NomadFolderData {
    pub storable_item_id: String,
    pub storable_item_name: String,
    #[serde(default)]
    pub files: Vec<NomadFileData>,
    #[serde(default)]
    pub folders: Vec<NomadFolderData>,
    /// Event streams merged to reconstruct this subtree. Grows, never shrinks.
    #[serde(default)]
    pub sources: BTreeSet<MutablePointer>,
}

/// A borrowed direct child of a folder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChildRef<'a> {
    File(&'a NomadFileData),
    Folder(&'a NomadFolderData),
}

impl<'a> ChildRef<'a> {
    /// Id of the child.
    #[must_use]
    pub fn id(&self) -> &'a str {
        match self {
            Self::File(file) => &file.storable_item_id,
            Self::Folder(folder) => &folder.storable_item_id,
        }
    }

    /// Name of the child.
    #[must_use]
    pub fn name(&self) -> &'a str {
        match self {
            Self::File(file) => &file.storable_item_name,
            Self::Folder(folder) => &folder.storable_item_name,
        }
    }

    /// Kind of the child.
    #[must_use]
    pub fn kind(&self) -> NodeKind {
        match self {
            Self::File(_) => NodeKind::File,
            Self::Folder(_) => NodeKind::Folder,
        }
    }
}

impl NomadFolderData {
    /// Creates an empty folder snapshot with no sources.
    #[must_use]
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            storable_item_id: id.into(),
            storable_item_name: name.into(),
            files: Vec::new(),
            folders: Vec::new(),
            sources: BTreeSet::new(),
        }
    }

    /// Creates an empty folder snapshot with the given sources.
    #[must_use]
    pub fn with_sources(
        id: impl Into<String>,
        name: impl Into<String>,
        sources: impl IntoIterator<Item = MutablePointer>,
    ) -> Self {
        Self {
            sources: sources.into_iter().collect(),
            ..Self::new(id, name)
        }
    }

    /// Returns a copy with the same identity and sources but no children.
    ///
    /// This is the clean slate a full replay starts from.
    #[must_use]
    pub fn cleared(&self) -> Self {
        Self::with_sources(
            self.storable_item_id.clone(),
            self.storable_item_name.clone(),
            self.sources.iter().cloned(),
        )
    }

    /// Finds a folder by id in this subtree, including this folder.
    #[must_use]
    pub fn find_folder(&self, id: &str) -> Option<&Self> {
        if self.storable_item_id == id {
            return Some(self);
        }
        self.folders.iter().find_map(|folder| folder.find_folder(id))
    }

    /// Mutable variant of [`Self::find_folder`].
    pub fn find_folder_mut(&mut self, id: &str) -> Option<&mut Self> {
        if self.storable_item_id == id {
            return Some(self);
        }
        self.folders
            .iter_mut()
            .find_map(|folder| folder.find_folder_mut(id))
    }

    /// Finds a file by id in this subtree.
    #[must_use]
    pub fn find_file(&self, id: &str) -> Option<&NomadFileData> {
        self.files
            .iter()
            .find(|file| file.storable_item_id == id)
            .or_else(|| self.folders.iter().find_map(|folder| folder.find_file(id)))
    }

    /// Mutable variant of [`Self::find_file`].
    pub fn find_file_mut(&mut self, id: &str) -> Option<&mut NomadFileData> {
        if let Some(pos) = self.files.iter().position(|file| file.storable_item_id == id) {
            return self.files.get_mut(pos);
        }
        self.folders
            .iter_mut()
            .find_map(|folder| folder.find_file_mut(id))
    }

    /// Returns the kind of the node with `id`, if it is in this subtree.
    #[must_use]
    pub fn node_kind(&self, id: &str) -> Option<NodeKind> {
        if self.find_folder(id).is_some() {
            Some(NodeKind::Folder)
        } else if self.find_file(id).is_some() {
            Some(NodeKind::File)
        } else {
            None
        }
    }

    /// Finds the folder that directly contains the node with `id`.
    #[must_use]
    pub fn find_parent_of(&self, id: &str) -> Option<&Self> {
        let is_child = self.files.iter().any(|f| f.storable_item_id == id)
            || self.folders.iter().any(|f| f.storable_item_id == id);
        if is_child {
            return Some(self);
        }
        self.folders
            .iter()
            .find_map(|folder| folder.find_parent_of(id))
    }

    /// Finds a direct child by name, files first.
    #[must_use]
    pub fn child_by_name(&self, name: &str) -> Option<ChildRef<'_>> {
        self.file_by_name(name)
            .map(ChildRef::File)
            .or_else(|| self.folder_by_name(name).map(ChildRef::Folder))
    }

    /// Finds a direct child file by name.
    #[must_use]
    pub fn file_by_name(&self, name: &str) -> Option<&NomadFileData> {
        self.files.iter().find(|f| f.storable_item_name == name)
    }

    /// Finds a direct child folder by name.
    #[must_use]
    pub fn folder_by_name(&self, name: &str) -> Option<&NomadFolderData> {
        self.folders.iter().find(|f| f.storable_item_name == name)
    }

    /// Iterates direct children, files first.
    pub fn children(&self) -> impl Iterator<Item = ChildRef<'_>> {
        self.files
            .iter()
            .map(ChildRef::File)
            .chain(self.folders.iter().map(ChildRef::Folder))
    }
}

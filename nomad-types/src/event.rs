//! Update events and the event streams that carry them.
//!
//! Every peer owns one append-only [`EventStream`]. Each stream entry points
//! at an [`EventStreamEntry`], which in turn points at an [`UpdateEvent`]
//! payload. All three are stored content-addressed.

use crate::{ContentPointer, EntryTimestamp, MutablePointer};
use serde::{Deserialize, Serialize};

/// Builds the id of a child item from its parent id and name.
#[must_use]
pub fn child_id(parent_id: &str, name: &str) -> String {
    format!("{parent_id}/{name}")
}

/// Which kind of node an update event can be applied to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventCategory {
    /// Folder-scoped events: create, delete, source add.
    Folder,
    /// File-scoped events: content update.
    File,
}

/// The payload of an event stream entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", content = "data", rename_all = "snake_case")]
pub enum UpdateEvent {
    /// A folder was created inside a folder.
    CreateFolderInFolder {
        working_folder_id: String,
        storable_item_id: String,
        storable_item_name: String,
        overwrite: bool,
    },

    /// A file was created inside a folder.
    CreateFileInFolder {
        working_folder_id: String,
        storable_item_id: String,
        storable_item_name: String,
        overwrite: bool,
    },

    /// A file or folder was removed from a folder.
    DeleteFromFolder {
        working_folder_id: String,
        storable_item_id: String,
        storable_item_name: String,
    },

    /// A file's content now lives at `new_content_id`.
    FileUpdate {
        storable_item_id: String,
        new_content_id: ContentPointer,
    },

    /// Another peer's local event stream was admitted as a source.
    SourceAdd {
        target_id: String,
        added_source: MutablePointer,
    },
}

impl UpdateEvent {
    /// Creates a folder-creation event for `name` inside `working_folder_id`.
    #[must_use]
    pub fn create_folder(working_folder_id: &str, name: &str, overwrite: bool) -> Self {
        Self::CreateFolderInFolder {
            working_folder_id: working_folder_id.to_string(),
            storable_item_id: child_id(working_folder_id, name),
            storable_item_name: name.to_string(),
            overwrite,
        }
    }

    /// Creates a file-creation event for `name` inside `working_folder_id`.
    #[must_use]
    pub fn create_file(working_folder_id: &str, name: &str, overwrite: bool) -> Self {
        Self::CreateFileInFolder {
            working_folder_id: working_folder_id.to_string(),
            storable_item_id: child_id(working_folder_id, name),
            storable_item_name: name.to_string(),
            overwrite,
        }
    }

    /// Creates a delete event for a child of `working_folder_id`.
    #[must_use]
    pub fn delete(working_folder_id: &str, item_id: &str, item_name: &str) -> Self {
        Self::DeleteFromFolder {
            working_folder_id: working_folder_id.to_string(),
            storable_item_id: item_id.to_string(),
            storable_item_name: item_name.to_string(),
        }
    }

    /// Creates a content update event for a file.
    #[must_use]
    pub fn file_update(file_id: &str, new_content_id: ContentPointer) -> Self {
        Self::FileUpdate {
            storable_item_id: file_id.to_string(),
            new_content_id,
        }
    }

    /// Creates a source admission event for the folder `target_id`.
    #[must_use]
    pub fn source_add(target_id: &str, added_source: MutablePointer) -> Self {
        Self::SourceAdd {
            target_id: target_id.to_string(),
            added_source,
        }
    }

    /// The stable event id recorded on the stream entry.
    #[must_use]
    pub fn event_id(&self) -> &'static str {
        match self {
            Self::CreateFolderInFolder { .. } => "create_folder_in_folder",
            Self::CreateFileInFolder { .. } => "create_file_in_folder",
            Self::DeleteFromFolder { .. } => "delete_from_folder",
            Self::FileUpdate { .. } => "file_update",
            Self::SourceAdd { .. } => "source_add",
        }
    }

    /// The kind of node this event applies to.
    #[must_use]
    pub fn category(&self) -> EventCategory {
        match self {
            Self::FileUpdate { .. } => EventCategory::File,
            _ => EventCategory::Folder,
        }
    }

    /// Id of the node this event must be applied to.
    #[must_use]
    pub fn applies_to(&self) -> &str {
        match self {
            Self::CreateFolderInFolder {
                working_folder_id, ..
            }
            | Self::CreateFileInFolder {
                working_folder_id, ..
            }
            | Self::DeleteFromFolder {
                working_folder_id, ..
            } => working_folder_id,
            Self::FileUpdate {
                storable_item_id, ..
            } => storable_item_id,
            Self::SourceAdd { target_id, .. } => target_id,
        }
    }
}

/// One timestamped, targeted update record in a stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventStreamEntry {
    /// Id of the storable item this entry modifies.
    pub target_id: String,
    /// Event id of the payload, see [`UpdateEvent::event_id`].
    pub event_id: String,
    /// When the owning peer appended this entry.
    pub timestamp_utc: EntryTimestamp,
    /// Pointer to the [`UpdateEvent`] payload.
    pub content: ContentPointer,
}

impl EventStreamEntry {
    /// Creates a new entry.
    #[must_use]
    pub fn new(
        target_id: impl Into<String>,
        event_id: impl Into<String>,
        timestamp_utc: EntryTimestamp,
        content: ContentPointer,
    ) -> Self {
        Self {
            target_id: target_id.into(),
            event_id: event_id.into(),
            timestamp_utc,
            content,
        }
    }
}

/// One peer's append-only log of entry pointers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventStream {
    /// Id of the object tree this stream belongs to (the roaming identity).
    pub target_id: String,
    /// Human-readable label.
    pub label: String,
    /// Pointers to [`EventStreamEntry`] values, oldest first.
    #[serde(default)]
    pub entries: Vec<ContentPointer>,
}

impl EventStream {
    /// Creates an empty stream.
    #[must_use]
    pub fn new(target_id: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            target_id: target_id.into(),
            label: label.into(),
            entries: Vec::new(),
        }
    }

    /// Appends an entry pointer.
    pub fn append(&mut self, entry: ContentPointer) {
        self.entries.push(entry);
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the stream has no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

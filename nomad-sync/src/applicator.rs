//! Event applicator - folds update events onto a roaming snapshot tree.
//!
//! Application is a pure state transition: no I/O, no clock. The same
//! ordered sequence of events applied to the same seed always yields the
//! same tree.
//!
//! Lookups for create and delete match a child by id first, then by name.
//! A non-overwriting create is a no-op when any child already matches.

use nomad_types::{
    EventCategory, EventStreamEntry, MutablePointer, NodeKind, NomadFileData, NomadFolderData,
    UpdateEvent,
};
use tracing::{debug, warn};

/// Result type for applicator operations.
pub type ApplicatorResult<T> = Result<T, ApplicatorError>;

/// Routing and integrity violations. These are never expected in correct
/// operation and abort the replay that hit them.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ApplicatorError {
    #[error("event for {actual} delivered to {expected}")]
    WrongTarget { expected: String, actual: String },

    #[error("{event_id} cannot be applied to {kind:?} {node}")]
    WrongCategory {
        node: String,
        kind: NodeKind,
        event_id: String,
    },

    #[error("entry declares {declared} but payload is {actual}")]
    EventIdMismatch { declared: String, actual: String },
}

/// Outcome of applying one event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applied {
    /// The tree was modified.
    Changed,
    /// The event was valid but the tree already reflected it.
    Unchanged,
    /// No node with the entry's target id exists in this tree.
    Skipped,
}

impl Applied {
    fn from_changed(changed: bool) -> Self {
        if changed { Self::Changed } else { Self::Unchanged }
    }
}

/// Applies update events to folder and file snapshots.
#[derive(Debug, Clone, Copy, Default)]
pub struct EventApplicator;

impl EventApplicator {
    /// Creates a new event applicator.
    pub fn new() -> Self {
        Self
    }

    /// Applies a stream entry and its resolved payload to the node whose id
    /// equals `entry.target_id`.
    pub fn apply_entry(
        &self,
        tree: &mut NomadFolderData,
        entry: &EventStreamEntry,
        event: &UpdateEvent,
    ) -> ApplicatorResult<Applied> {
        if entry.event_id != event.event_id() {
            return Err(ApplicatorError::EventIdMismatch {
                declared: entry.event_id.clone(),
                actual: event.event_id().to_string(),
            });
        }
        if entry.target_id != event.applies_to() {
            return Err(ApplicatorError::WrongTarget {
                expected: entry.target_id.clone(),
                actual: event.applies_to().to_string(),
            });
        }
        self.apply_event(tree, event)
    }

    /// Applies an event to the node it names, wherever it is in the tree.
    pub fn apply_event(
        &self,
        tree: &mut NomadFolderData,
        event: &UpdateEvent,
    ) -> ApplicatorResult<Applied> {
        let target = event.applies_to();

        if let Some(folder) = tree.find_folder_mut(target) {
            return self.apply_folder_update(folder, event);
        }
        if let Some(file) = tree.find_file_mut(target) {
            return self.apply_file_update(file, event);
        }

        debug!("Skipping {} for absent node {}", event.event_id(), target);
        Ok(Applied::Skipped)
    }

    /// Applies a folder-scoped event to `folder`.
    pub fn apply_folder_update(
        &self,
        folder: &mut NomadFolderData,
        event: &UpdateEvent,
    ) -> ApplicatorResult<Applied> {
        if event.category() != EventCategory::Folder {
            return Err(ApplicatorError::WrongCategory {
                node: folder.storable_item_id.clone(),
                kind: NodeKind::Folder,
                event_id: event.event_id().to_string(),
            });
        }
        if event.applies_to() != folder.storable_item_id {
            return Err(ApplicatorError::WrongTarget {
                expected: folder.storable_item_id.clone(),
                actual: event.applies_to().to_string(),
            });
        }

        debug!("Applying {} to folder {}", event.event_id(), folder.storable_item_id);

        let applied = match event {
            UpdateEvent::CreateFolderInFolder {
                storable_item_id,
                storable_item_name,
                overwrite,
                ..
            } => {
                if !prepare_create(folder, storable_item_id, storable_item_name, *overwrite) {
                    return Ok(Applied::Unchanged);
                }
                folder.folders.push(NomadFolderData::with_sources(
                    storable_item_id.clone(),
                    storable_item_name.clone(),
                    folder.sources.iter().cloned(),
                ));
                Applied::Changed
            }
            UpdateEvent::CreateFileInFolder {
                storable_item_id,
                storable_item_name,
                overwrite,
                ..
            } => {
                if !prepare_create(folder, storable_item_id, storable_item_name, *overwrite) {
                    return Ok(Applied::Unchanged);
                }
                folder.files.push(NomadFileData::new(
                    storable_item_id.clone(),
                    storable_item_name.clone(),
                ));
                Applied::Changed
            }
            UpdateEvent::DeleteFromFolder {
                storable_item_id,
                storable_item_name,
                ..
            } => Applied::from_changed(remove_first(folder, storable_item_id, storable_item_name)),
            UpdateEvent::SourceAdd { added_source, .. } => {
                Applied::from_changed(add_source(folder, added_source))
            }
            UpdateEvent::FileUpdate { .. } => {
                warn!("File update reached folder dispatch");
                return Err(ApplicatorError::WrongCategory {
                    node: folder.storable_item_id.clone(),
                    kind: NodeKind::Folder,
                    event_id: event.event_id().to_string(),
                });
            }
        };
        Ok(applied)
    }

    /// Applies a file-scoped event to `file`.
    pub fn apply_file_update(
        &self,
        file: &mut NomadFileData,
        event: &UpdateEvent,
    ) -> ApplicatorResult<Applied> {
        let UpdateEvent::FileUpdate {
            storable_item_id,
            new_content_id,
        } = event
        else {
            return Err(ApplicatorError::WrongCategory {
                node: file.storable_item_id.clone(),
                kind: NodeKind::File,
                event_id: event.event_id().to_string(),
            });
        };

        if *storable_item_id != file.storable_item_id {
            return Err(ApplicatorError::WrongTarget {
                expected: file.storable_item_id.clone(),
                actual: storable_item_id.clone(),
            });
        }

        if file.content_id.as_ref() == Some(new_content_id) {
            return Ok(Applied::Unchanged);
        }

        debug!("Updating content of {} to {}", file.storable_item_id, new_content_id);
        file.content_id = Some(new_content_id.clone());
        Ok(Applied::Changed)
    }
}

fn same_item(id: &str, name: &str, item_id: &str, item_name: &str) -> bool {
    id == item_id || name == item_name
}

/// Makes room for a new child. Returns false when the create is a no-op.
fn prepare_create(folder: &mut NomadFolderData, id: &str, name: &str, overwrite: bool) -> bool {
    if overwrite {
        folder
            .files
            .retain(|f| !same_item(&f.storable_item_id, &f.storable_item_name, id, name));
        folder
            .folders
            .retain(|f| !same_item(&f.storable_item_id, &f.storable_item_name, id, name));
        return true;
    }

    let exists = folder
        .children()
        .any(|child| same_item(child.id(), child.name(), id, name));
    !exists
}

/// Removes the first child matching `id`, or failing that the first
/// matching `name`. Files are searched before folders.
fn remove_first(folder: &mut NomadFolderData, id: &str, name: &str) -> bool {
    if let Some(pos) = folder.files.iter().position(|f| f.storable_item_id == id) {
        folder.files.remove(pos);
        return true;
    }
    if let Some(pos) = folder.folders.iter().position(|f| f.storable_item_id == id) {
        folder.folders.remove(pos);
        return true;
    }
    if let Some(pos) = folder.files.iter().position(|f| f.storable_item_name == name) {
        folder.files.remove(pos);
        return true;
    }
    if let Some(pos) = folder.folders.iter().position(|f| f.storable_item_name == name) {
        folder.folders.remove(pos);
        return true;
    }
    debug!("Delete of absent {} in {}", id, folder.storable_item_id);
    false
}

/// Adds a source to `folder` and every folder below it.
fn add_source(folder: &mut NomadFolderData, source: &MutablePointer) -> bool {
    let added = folder.sources.insert(source.clone());
    for child in &mut folder.folders {
        add_source(child, source);
    }
    added
}

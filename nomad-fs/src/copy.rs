//! Recursive mirror of one folder into another.

use crate::error::{NomadError, NomadResult};
use crate::traits::{Item, ItemKind, ReadableFile, ReadableFolder, WritableFolder};
use futures::future::{BoxFuture, FutureExt};
use std::collections::HashSet;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// What a mirror changed in the destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CopyStats {
    pub files_copied: usize,
    pub files_unchanged: usize,
    pub folders_created: usize,
    pub items_removed: usize,
}

impl CopyStats {
    fn absorb(&mut self, other: CopyStats) {
        self.files_copied += other.files_copied;
        self.files_unchanged += other.files_unchanged;
        self.folders_created += other.folders_created;
        self.items_removed += other.items_removed;
    }
}

/// Makes `destination` mirror `source`.
///
/// Files whose content pointer already matches are left alone. Children of
/// `destination` with no same-named counterpart in `source` are deleted, as
/// are children whose kind differs.
pub fn copy_folder_into<'a, S, D>(
    source: &'a S,
    destination: &'a D,
    cancel: &'a CancellationToken,
) -> BoxFuture<'a, NomadResult<CopyStats>>
where
    S: ReadableFolder<Folder = S> + 'a,
    D: WritableFolder<Folder = D> + 'a,
{
    async move {
        let mut stats = CopyStats::default();
        let wanted = source.get_items(ItemKind::All, cancel).await?;
        let mut names = HashSet::new();

        for item in &wanted {
            names.insert(item.name().to_string());
            let existing = match destination.get_first_by_name(item.name(), cancel).await {
                Ok(existing) => Some(existing),
                Err(NomadError::ItemNotFound(_)) => None,
                Err(e) => return Err(e),
            };

            match (item, existing) {
                (Item::File(file), Some(Item::File(current))) => {
                    let pointer = file.content_pointer(cancel).await?;
                    if pointer == current.content_pointer(cancel).await? {
                        stats.files_unchanged += 1;
                        continue;
                    }
                    destination.create_copy_of(file, true, cancel).await?;
                    stats.files_copied += 1;
                }
                (Item::File(file), existing) => {
                    let overwrite = existing.is_some();
                    if overwrite {
                        stats.items_removed += 1;
                    }
                    destination.create_copy_of(file, overwrite, cancel).await?;
                    stats.files_copied += 1;
                }
                (Item::Folder(folder), existing) => {
                    let overwrite = matches!(existing, Some(Item::File(_)));
                    if overwrite {
                        stats.items_removed += 1;
                    }
                    if !matches!(existing, Some(Item::Folder(_))) {
                        stats.folders_created += 1;
                    }
                    let target = destination
                        .create_folder(folder.name(), overwrite, cancel)
                        .await?;
                    stats.absorb(copy_folder_into(folder, &target, cancel).await?);
                }
            }
        }

        for stale in destination.get_items(ItemKind::All, cancel).await? {
            if !names.contains(stale.name()) {
                match &stale {
                    Item::File(file) => destination.delete(file, cancel).await?,
                    Item::Folder(folder) => destination.delete(folder, cancel).await?,
                }
                stats.items_removed += 1;
            }
        }

        debug!("Mirrored {} into {}: {:?}", source.id(), destination.id(), stats);
        Ok(stats)
    }
    .boxed()
}

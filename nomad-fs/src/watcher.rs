//! Polling watcher for remote changes to a folder.

use crate::error::NomadResult;
use crate::folder::NomadFolder;
use crate::traits::Storable;
use nomad_types::NodeKind;
use std::collections::BTreeMap;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// A change to the direct children of a watched folder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FolderChange {
    Added {
        id: String,
        name: String,
        kind: NodeKind,
    },
    Removed {
        id: String,
        name: String,
        kind: NodeKind,
    },
}

impl FolderChange {
    pub fn id(&self) -> &str {
        match self {
            Self::Added { id, .. } | Self::Removed { id, .. } => id,
        }
    }
}

/// Refreshes a folder on an interval and reports child changes.
#[derive(Debug)]
pub struct FolderWatcher {
    folder: NomadFolder,
    interval: Duration,
    known: BTreeMap<String, (String, NodeKind)>,
}

impl FolderWatcher {
    /// Starts from the folder's current children, so only later changes
    /// are reported.
    pub async fn new(folder: NomadFolder, interval: Duration) -> NomadResult<Self> {
        let known = children_of(&folder).await?;
        Ok(Self {
            folder,
            interval,
            known,
        })
    }

    /// Refreshes once and returns what changed since the last poll.
    pub async fn poll(&mut self, cancel: &CancellationToken) -> NomadResult<Vec<FolderChange>> {
        self.folder.refresh(cancel).await?;
        let current = children_of(&self.folder).await?;

        let mut changes = Vec::new();
        for (id, (name, kind)) in &self.known {
            if !current.contains_key(id) {
                changes.push(FolderChange::Removed {
                    id: id.clone(),
                    name: name.clone(),
                    kind: *kind,
                });
            }
        }
        for (id, (name, kind)) in &current {
            if !self.known.contains_key(id) {
                changes.push(FolderChange::Added {
                    id: id.clone(),
                    name: name.clone(),
                    kind: *kind,
                });
            }
        }

        self.known = current;
        Ok(changes)
    }

    /// Polls in a background task until `cancel` fires.
    ///
    /// A failed poll is logged and retried on the next tick. The task ends
    /// early if the receiver is dropped.
    pub fn spawn(
        mut self,
        cancel: CancellationToken,
    ) -> (mpsc::Receiver<FolderChange>, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(32);
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.interval);
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = cancel.cancelled() => {
                        debug!("Watcher for {} stopped", self.folder.id());
                        break;
                    }
                    _ = ticker.tick() => {
                        let changes = match self.poll(&cancel).await {
                            Ok(changes) => changes,
                            Err(e) if e.is_cancelled() => break,
                            Err(e) => {
                                warn!("Polling {} failed: {}", self.folder.id(), e);
                                continue;
                            }
                        };
                        for change in changes {
                            if tx.send(change).await.is_err() {
                                return;
                            }
                        }
                    }
                }
            }
        });
        (rx, handle)
    }
}

async fn children_of(folder: &NomadFolder) -> NomadResult<BTreeMap<String, (String, NodeKind)>> {
    let data = folder.data().await?;
    Ok(data
        .children()
        .map(|child| {
            (
                child.id().to_string(),
                (child.name().to_string(), child.kind()),
            )
        })
        .collect())
}

//! The replication context for one roaming folder tree.
//!
//! A [`Replica`] owns everything that used to be shared by reference between
//! sibling folder and file instances: the projected tree, the canonical
//! source set, the cached merged history, the applied history and the
//! per-node event stream positions. Folder and file handles hold an `Arc`
//! to the replica plus the id of the node they represent.

use crate::applicator::{Applied, ApplicatorError, EventApplicator};
use crate::error::{ensure_live, SyncError, SyncResult};
use crate::resolver::{resolve_event, resolve_event_stream_entries, ResolvedEntry};
use crate::stream::LocalEventStream;
use futures::future::try_join_all;
use nomad_store::{ContentStore, ContentStoreExt, NameService};
use nomad_types::{
    ContentPointer, MutablePointer, NodeKind, NomadFileData, NomadFolderData, UpdateEvent,
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Publishing and resolution settings for a replica.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplicaConfig {
    /// Lifetime of published records.
    pub ipns_lifetime: Duration,
    /// Pin content added to the store.
    pub should_pin: bool,
    /// Allow cached name resolution.
    pub use_cache: bool,
}

impl Default for ReplicaConfig {
    fn default() -> Self {
        Self {
            ipns_lifetime: Duration::from_secs(24 * 60 * 60),
            should_pin: false,
            use_cache: false,
        }
    }
}

/// Summary of one refresh.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RefreshOutcome {
    /// Entries in the merged history.
    pub entries: usize,
    /// Entries that modified the tree during this refresh.
    pub changed: usize,
    /// Whether the tree was rebuilt from the clean seed.
    pub rebuilt: bool,
    /// Number of sources merged.
    pub sources: usize,
}

#[derive(Debug)]
struct ReplicaState {
    /// Clean root the full replay starts from.
    seed: NomadFolderData,
    tree: NomadFolderData,
    sources: BTreeSet<MutablePointer>,
    /// Merged history from the last resolution, `None` once invalidated.
    resolved: Option<Vec<ResolvedEntry>>,
    /// Entry pointers folded into `tree`, in application order.
    applied: Vec<ContentPointer>,
    positions: HashMap<String, ResolvedEntry>,
}

/// Replication context for one roaming folder tree.
pub struct Replica {
    root_id: String,
    roaming_id: MutablePointer,
    /// Local name of the roaming key when this peer holds it.
    roaming_key_name: Option<String>,
    local: LocalEventStream,
    content: Arc<dyn ContentStore>,
    names: Arc<dyn NameService>,
    config: ReplicaConfig,
    applicator: EventApplicator,
    /// Serializes local writes and refreshes.
    write_lock: Mutex<()>,
    state: RwLock<ReplicaState>,
}

impl Replica {
    /// Builds a replica from a published roaming snapshot.
    ///
    /// Only the snapshot's identity and sources are kept: the tree itself is
    /// reconstructed by replaying the merged history.
    pub fn from_snapshot(
        snapshot: &NomadFolderData,
        roaming_id: MutablePointer,
        roaming_key_name: Option<String>,
        local: LocalEventStream,
        content: Arc<dyn ContentStore>,
        names: Arc<dyn NameService>,
        config: ReplicaConfig,
    ) -> SyncResult<Self> {
        if snapshot.sources.is_empty() {
            return Err(SyncError::MissingSnapshot(format!(
                "roaming snapshot {} has no sources",
                snapshot.storable_item_id
            )));
        }

        let mut seed = snapshot.cleared();
        seed.sources.insert(local.key().id.clone());
        let sources = seed.sources.clone();

        Ok(Self {
            root_id: seed.storable_item_id.clone(),
            roaming_id,
            roaming_key_name,
            local,
            content,
            names,
            config,
            applicator: EventApplicator::new(),
            write_lock: Mutex::new(()),
            state: RwLock::new(ReplicaState {
                tree: seed.clone(),
                seed,
                sources,
                resolved: None,
                applied: Vec::new(),
                positions: HashMap::new(),
            }),
        })
    }

    /// Resolves the roaming snapshot published under `roaming_id` and builds
    /// a replica from it.
    pub async fn open(
        roaming_id: MutablePointer,
        roaming_key_name: Option<String>,
        local: LocalEventStream,
        content: Arc<dyn ContentStore>,
        names: Arc<dyn NameService>,
        config: ReplicaConfig,
        cancel: &CancellationToken,
    ) -> SyncResult<Self> {
        let snapshot = resolve_roaming_snapshot(
            &roaming_id,
            content.as_ref(),
            names.as_ref(),
            config.use_cache,
            cancel,
        )
        .await?
        .ok_or_else(|| SyncError::MissingSnapshot(roaming_id.to_string()))?;

        Self::from_snapshot(
            &snapshot,
            roaming_id,
            roaming_key_name,
            local,
            content,
            names,
            config,
        )
    }

    /// Id of the root folder.
    pub fn root_id(&self) -> &str {
        &self.root_id
    }

    /// Identity the roaming snapshot is published under.
    pub fn roaming_id(&self) -> &MutablePointer {
        &self.roaming_id
    }

    /// Whether this peer can publish the roaming snapshot.
    pub fn holds_roaming_key(&self) -> bool {
        self.roaming_key_name.is_some()
    }

    /// This peer's own event stream.
    pub fn local(&self) -> &LocalEventStream {
        &self.local
    }

    /// The content store.
    pub fn content(&self) -> &Arc<dyn ContentStore> {
        &self.content
    }

    /// The name service.
    pub fn names(&self) -> &Arc<dyn NameService> {
        &self.names
    }

    /// Publishing and resolution settings.
    pub fn config(&self) -> &ReplicaConfig {
        &self.config
    }

    // ── Reads ────────────────────────────────────────────────────────

    /// A copy of the current projected tree.
    pub async fn snapshot(&self) -> NomadFolderData {
        self.state.read().await.tree.clone()
    }

    /// A copy of the folder with `id`.
    pub async fn folder(&self, id: &str) -> Option<NomadFolderData> {
        self.state.read().await.tree.find_folder(id).cloned()
    }

    /// A copy of the file with `id`.
    pub async fn file(&self, id: &str) -> Option<NomadFileData> {
        self.state.read().await.tree.find_file(id).cloned()
    }

    /// Kind of the node with `id`, if it is in the tree.
    pub async fn node_kind(&self, id: &str) -> Option<NodeKind> {
        self.state.read().await.tree.node_kind(id)
    }

    /// Id of the folder that directly contains `id`.
    pub async fn parent_of(&self, id: &str) -> Option<String> {
        self.state
            .read()
            .await
            .tree
            .find_parent_of(id)
            .map(|parent| parent.storable_item_id.clone())
    }

    /// The canonical source set.
    pub async fn sources(&self) -> BTreeSet<MutablePointer> {
        self.state.read().await.sources.clone()
    }

    /// Last entry applied to the node with `id`.
    pub async fn position(&self, id: &str) -> Option<ResolvedEntry> {
        self.state.read().await.positions.get(id).cloned()
    }

    /// Number of entries folded into the tree.
    pub async fn applied_len(&self) -> usize {
        self.state.read().await.applied.len()
    }

    /// Whether a merged history is cached.
    pub async fn has_resolved(&self) -> bool {
        self.state.read().await.resolved.is_some()
    }

    // ── Pull ─────────────────────────────────────────────────────────

    /// Drops the cached merged history so the next load re-resolves.
    pub async fn invalidate_resolved(&self) {
        self.state.write().await.resolved = None;
    }

    /// Refreshes only when no merged history is cached.
    pub async fn ensure_replayed(&self, cancel: &CancellationToken) -> SyncResult<()> {
        if !self.has_resolved().await {
            self.refresh(cancel).await?;
        }
        Ok(())
    }

    /// Resolves every source and folds any history not yet applied.
    ///
    /// Sources admitted by `SourceAdd` events are followed until no new
    /// source appears. When the applied history is a prefix of the merged
    /// history only the remainder is applied, otherwise the tree is rebuilt
    /// from the clean seed.
    pub async fn refresh(&self, cancel: &CancellationToken) -> SyncResult<RefreshOutcome> {
        ensure_live(cancel)?;
        let _writer = self.write_lock.lock().await;

        let mut sources = self.state.read().await.sources.clone();
        let (resolved, events) = loop {
            let resolved = resolve_event_stream_entries(
                &sources,
                self.content.as_ref(),
                self.names.as_ref(),
                self.config.use_cache,
                cancel,
            )
            .await?;
            let events = try_join_all(
                resolved
                    .iter()
                    .map(|r| resolve_event(&r.entry, self.content.as_ref(), cancel)),
            )
            .await?;

            let discovered: Vec<MutablePointer> = events
                .iter()
                .flatten()
                .filter_map(|event| match event {
                    UpdateEvent::SourceAdd {
                        target_id,
                        added_source,
                    } if *target_id == self.root_id && !sources.contains(added_source) => {
                        Some(added_source.clone())
                    }
                    _ => None,
                })
                .collect();

            if discovered.is_empty() {
                break (resolved, events);
            }
            info!("Following {} new source(s) for {}", discovered.len(), self.root_id);
            sources.extend(discovered);
        };

        ensure_live(cancel)?;
        let mut state = self.state.write().await;
        let outcome = self.replay(&mut state, sources, &resolved, &events)?;
        state.resolved = Some(resolved);

        debug!(
            "Refreshed {}: {} entries, {} changed, rebuilt {}",
            self.root_id, outcome.entries, outcome.changed, outcome.rebuilt
        );
        Ok(outcome)
    }

    fn replay(
        &self,
        state: &mut ReplicaState,
        sources: BTreeSet<MutablePointer>,
        resolved: &[ResolvedEntry],
        events: &[Option<UpdateEvent>],
    ) -> SyncResult<RefreshOutcome> {
        let history: Vec<(&ResolvedEntry, &UpdateEvent)> = resolved
            .iter()
            .zip(events)
            .filter_map(|(entry, event)| event.as_ref().map(|event| (entry, event)))
            .collect();

        let is_prefix = state.applied.len() <= history.len()
            && state
                .applied
                .iter()
                .zip(&history)
                .all(|(applied, (entry, _))| *applied == entry.pointer);

        let mut seed = state.seed.clone();
        seed.sources.extend(sources.iter().cloned());

        let (mut tree, mut positions, mut applied) = if is_prefix {
            (
                state.tree.clone(),
                state.positions.clone(),
                state.applied.clone(),
            )
        } else {
            info!("Rebuilding {} from a clean seed", self.root_id);
            (seed.clone(), HashMap::new(), Vec::new())
        };
        tree.sources.extend(sources.iter().cloned());

        let mut changed = 0;
        for (entry, event) in &history[applied.len()..] {
            let result = match self.applicator.apply_entry(&mut tree, &entry.entry, event) {
                Err(ApplicatorError::WrongCategory { node, kind, event_id }) => {
                    // Another peer created a node of the other kind under the same id.
                    warn!("Skipping {} for {:?} {}: kind collision", event_id, kind, node);
                    Applied::Skipped
                }
                other => other?,
            };
            match result {
                Applied::Skipped => {}
                outcome => {
                    if outcome == Applied::Changed {
                        changed += 1;
                    }
                    positions.insert(entry.entry.target_id.clone(), (*entry).clone());
                }
            }
            applied.push(entry.pointer.clone());
        }

        let outcome = RefreshOutcome {
            entries: history.len(),
            changed,
            rebuilt: !is_prefix,
            sources: sources.len(),
        };

        state.seed = seed;
        state.tree = tree;
        state.positions = positions;
        state.applied = applied;
        state.sources = sources;
        Ok(outcome)
    }

    // ── Push ─────────────────────────────────────────────────────────

    /// Applies `event` locally, then appends it to the local stream.
    ///
    /// The local tree only changes once the append has been published, so a
    /// cancelled or failed append leaves both in their prior state.
    pub async fn apply_and_append(
        &self,
        event: &UpdateEvent,
        cancel: &CancellationToken,
    ) -> SyncResult<Applied> {
        ensure_live(cancel)?;
        let _writer = self.write_lock.lock().await;

        let mut tree = self.state.read().await.tree.clone();
        let outcome = self.applicator.apply_event(&mut tree, event)?;
        if outcome == Applied::Skipped {
            return Err(SyncError::NodeNotFound(event.applies_to().to_string()));
        }

        let entry = self.local.append(event, cancel).await?;

        let mut state = self.state.write().await;
        state.tree = tree;
        state.applied.push(entry.pointer.clone());
        state
            .positions
            .insert(entry.entry.target_id.clone(), entry.clone());
        if let Some(resolved) = state.resolved.as_mut() {
            resolved.push(entry);
        }
        Ok(outcome)
    }

    /// Admits another peer's local stream as a source of this tree.
    pub async fn admit_source(
        &self,
        source: MutablePointer,
        cancel: &CancellationToken,
    ) -> SyncResult<Applied> {
        let event = UpdateEvent::source_add(&self.root_id, source.clone());
        let outcome = self.apply_and_append(&event, cancel).await?;

        let mut state = self.state.write().await;
        state.sources.insert(source.clone());
        state.seed.sources.insert(source.clone());
        state.resolved = None;

        info!("Admitted source {} for {}", source, self.root_id);
        Ok(outcome)
    }

    /// Publishes the local event stream.
    pub async fn publish_local(&self, cancel: &CancellationToken) -> SyncResult<ContentPointer> {
        self.local.publish(cancel).await
    }

    /// Publishes the current tree as the roaming snapshot.
    ///
    /// Returns `None` when this peer does not hold the roaming key.
    pub async fn publish_roaming(
        &self,
        cancel: &CancellationToken,
    ) -> SyncResult<Option<ContentPointer>> {
        ensure_live(cancel)?;
        let Some(key_name) = &self.roaming_key_name else {
            warn!("Not publishing roaming {}: key not held", self.roaming_id);
            return Ok(None);
        };

        let snapshot = self.snapshot().await;
        let pointer = self
            .content
            .put_value(&snapshot, self.config.should_pin)
            .await?;

        ensure_live(cancel)?;
        self.names
            .publish(&pointer, key_name, self.config.ipns_lifetime)
            .await?;

        info!("Published roaming {} as {}", self.roaming_id, pointer);
        Ok(Some(pointer))
    }

    /// Publishes the local stream, then the roaming snapshot.
    pub async fn flush(&self, cancel: &CancellationToken) -> SyncResult<()> {
        self.publish_local(cancel).await?;
        self.publish_roaming(cancel).await?;
        Ok(())
    }
}

impl std::fmt::Debug for Replica {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Replica")
            .field("root_id", &self.root_id)
            .field("roaming_id", &self.roaming_id)
            .field("roaming_key_name", &self.roaming_key_name)
            .field("local", &self.local)
            .finish_non_exhaustive()
    }
}

/// Resolves the roaming snapshot published under `roaming_id`.
pub async fn resolve_roaming_snapshot(
    roaming_id: &MutablePointer,
    content: &dyn ContentStore,
    names: &dyn NameService,
    use_cache: bool,
    cancel: &CancellationToken,
) -> SyncResult<Option<NomadFolderData>> {
    ensure_live(cancel)?;
    let Some(pointer) = names.resolve(roaming_id, use_cache).await? else {
        return Ok(None);
    };
    ensure_live(cancel)?;
    Ok(content.get_value::<NomadFolderData>(&pointer).await?)
}

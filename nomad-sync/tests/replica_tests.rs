use nomad_store::{
    ContentStore, ContentStoreExt, KeyAlgorithm, MemoryContentStore, MemoryNameRegistry,
    MemoryNameService, NameService,
};
use nomad_sync::{
    resolve_roaming_snapshot, Applied, ApplicatorError, CancellationToken, LocalEventStream,
    Replica, ReplicaConfig, SyncError,
};
use nomad_types::{ContentPointer, MutablePointer, NomadFolderData, UpdateEvent};
use pretty_assertions::assert_eq;
use std::sync::Arc;
use std::time::Duration;

const DAY: Duration = Duration::from_secs(24 * 60 * 60);

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

struct Peer {
    content: MemoryContentStore,
    names: MemoryNameService,
}

impl Peer {
    fn new(content: &MemoryContentStore, registry: &MemoryNameRegistry) -> Self {
        init_tracing();
        Self {
            content: content.clone(),
            names: registry.peer(),
        }
    }

    async fn local_stream(&self, roaming_id: &MutablePointer) -> LocalEventStream {
        let key = self
            .names
            .create_key("Nomad.Storage.Local.docs", KeyAlgorithm::default(), 0)
            .await
            .unwrap();
        LocalEventStream::new(
            key,
            roaming_id.as_str(),
            "docs",
            Arc::new(self.content.clone()),
            Arc::new(self.names.clone()),
            ReplicaConfig::default(),
        )
    }

    async fn open(&self, roaming_id: &MutablePointer, local: LocalEventStream) -> Replica {
        Replica::open(
            roaming_id.clone(),
            Some("Nomad.Storage.Roaming.docs".to_string()),
            local,
            Arc::new(self.content.clone()),
            Arc::new(self.names.clone()),
            ReplicaConfig::default(),
            &CancellationToken::new(),
        )
        .await
        .unwrap()
    }

    /// Creates a new tree owned by this peer.
    async fn create_tree(&self) -> Replica {
        let roaming = self
            .names
            .create_key("Nomad.Storage.Roaming.docs", KeyAlgorithm::default(), 0)
            .await
            .unwrap();
        let local = self.local_stream(&roaming.id).await;
        local.publish(&CancellationToken::new()).await.unwrap();

        let seed =
            NomadFolderData::with_sources(roaming.id.as_str(), "docs", [local.key().id.clone()]);
        let pointer = self.content.put_value(&seed, false).await.unwrap();
        self.names.publish(&pointer, &roaming.name, DAY).await.unwrap();

        self.open(&roaming.id, local).await
    }

    /// Joins `owner`'s tree the way pairing does.
    async fn join(&self, owner: &Peer, tree: &Replica) -> Replica {
        let exported = owner
            .names
            .export_key("Nomad.Storage.Roaming.docs")
            .await
            .unwrap();
        self.names
            .import_key("Nomad.Storage.Roaming.docs", exported)
            .await
            .unwrap();
        let local = self.local_stream(tree.roaming_id()).await;
        local.publish(&CancellationToken::new()).await.unwrap();
        self.open(tree.roaming_id(), local).await
    }
}

fn file_names(tree: &NomadFolderData) -> Vec<String> {
    let mut names: Vec<String> = tree
        .files
        .iter()
        .map(|f| f.storable_item_name.clone())
        .collect();
    names.sort();
    names
}

// ── Open ─────────────────────────────────────────────────────────

#[tokio::test]
async fn open_seeds_sources_with_local_stream() {
    let content = MemoryContentStore::new();
    let registry = MemoryNameRegistry::new();
    let alice = Peer::new(&content, &registry);
    let tree = alice.create_tree().await;

    let sources = tree.sources().await;
    assert_eq!(sources.len(), 1);
    assert!(sources.contains(&tree.local().key().id));
    assert_eq!(tree.root_id(), tree.roaming_id().as_str());
    assert!(tree.holds_roaming_key());
}

#[tokio::test]
async fn open_without_published_snapshot_fails() {
    let content = MemoryContentStore::new();
    let registry = MemoryNameRegistry::new();
    let alice = Peer::new(&content, &registry);
    let roaming = MutablePointer::generate();
    let local = alice.local_stream(&roaming).await;

    let err = Replica::open(
        roaming,
        None,
        local,
        Arc::new(content.clone()),
        Arc::new(alice.names.clone()),
        ReplicaConfig::default(),
        &CancellationToken::new(),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, SyncError::MissingSnapshot(_)));
}

#[tokio::test]
async fn snapshot_without_sources_is_rejected() {
    let content = MemoryContentStore::new();
    let registry = MemoryNameRegistry::new();
    let alice = Peer::new(&content, &registry);
    let roaming = MutablePointer::generate();
    let local = alice.local_stream(&roaming).await;

    let err = Replica::from_snapshot(
        &NomadFolderData::new(roaming.as_str(), "docs"),
        roaming.clone(),
        None,
        local,
        Arc::new(content.clone()),
        Arc::new(alice.names.clone()),
        ReplicaConfig::default(),
    )
    .unwrap_err();
    assert!(matches!(err, SyncError::MissingSnapshot(_)));
}

// ── Local writes ─────────────────────────────────────────────────

#[tokio::test]
async fn apply_and_append_updates_tree_and_position() {
    let content = MemoryContentStore::new();
    let registry = MemoryNameRegistry::new();
    let alice = Peer::new(&content, &registry);
    let tree = alice.create_tree().await;
    let cancel = CancellationToken::new();
    let root = tree.root_id().to_string();

    let outcome = tree
        .apply_and_append(&UpdateEvent::create_folder(&root, "docs", false), &cancel)
        .await
        .unwrap();

    assert_eq!(outcome, Applied::Changed);
    let docs_id = format!("{root}/docs");
    assert!(tree.folder(&docs_id).await.is_some());
    let position = tree.position(&root).await.unwrap();
    assert_eq!(position.entry.event_id, "create_folder_in_folder");
    assert_eq!(tree.applied_len().await, 1);
    assert_eq!(
        tree.local().snapshot(&cancel).await.unwrap().entries,
        vec![position.pointer]
    );
}

#[tokio::test]
async fn write_to_absent_node_appends_nothing() {
    let content = MemoryContentStore::new();
    let registry = MemoryNameRegistry::new();
    let alice = Peer::new(&content, &registry);
    let tree = alice.create_tree().await;
    let cancel = CancellationToken::new();

    let err = tree
        .apply_and_append(&UpdateEvent::create_file("nowhere", "a", false), &cancel)
        .await
        .unwrap_err();

    assert!(matches!(err, SyncError::NodeNotFound(_)));
    assert!(tree.local().snapshot(&cancel).await.unwrap().is_empty());
}

#[tokio::test]
async fn wrong_category_write_is_rejected() {
    let content = MemoryContentStore::new();
    let registry = MemoryNameRegistry::new();
    let alice = Peer::new(&content, &registry);
    let tree = alice.create_tree().await;
    let cancel = CancellationToken::new();
    let root = tree.root_id().to_string();

    let err = tree
        .apply_and_append(
            &UpdateEvent::file_update(&root, ContentPointer::of_bytes(b"x")),
            &cancel,
        )
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        SyncError::Applicator(ApplicatorError::WrongCategory { .. })
    ));
}

#[tokio::test]
async fn cancelled_write_leaves_tree_untouched() {
    let content = MemoryContentStore::new();
    let registry = MemoryNameRegistry::new();
    let alice = Peer::new(&content, &registry);
    let tree = alice.create_tree().await;
    let root = tree.root_id().to_string();
    let before = tree.snapshot().await;

    let cancel = CancellationToken::new();
    cancel.cancel();
    let err = tree
        .apply_and_append(&UpdateEvent::create_file(&root, "a", false), &cancel)
        .await
        .unwrap_err();

    assert!(matches!(err, SyncError::Cancelled));
    assert_eq!(tree.snapshot().await, before);
    assert_eq!(tree.applied_len().await, 0);
}

// ── Refresh ──────────────────────────────────────────────────────

#[tokio::test]
async fn refresh_after_local_writes_is_incremental() {
    let content = MemoryContentStore::new();
    let registry = MemoryNameRegistry::new();
    let alice = Peer::new(&content, &registry);
    let tree = alice.create_tree().await;
    let cancel = CancellationToken::new();
    let root = tree.root_id().to_string();

    tree.apply_and_append(&UpdateEvent::create_file(&root, "a", false), &cancel)
        .await
        .unwrap();
    tree.apply_and_append(&UpdateEvent::create_file(&root, "b", false), &cancel)
        .await
        .unwrap();
    let before = tree.snapshot().await;

    let outcome = tree.refresh(&cancel).await.unwrap();

    assert!(!outcome.rebuilt);
    assert_eq!(outcome.entries, 2);
    assert_eq!(outcome.changed, 0);
    assert_eq!(tree.snapshot().await, before);
}

#[tokio::test]
async fn fresh_replica_replays_published_history() {
    let content = MemoryContentStore::new();
    let registry = MemoryNameRegistry::new();
    let alice = Peer::new(&content, &registry);
    let tree = alice.create_tree().await;
    let cancel = CancellationToken::new();
    let root = tree.root_id().to_string();

    tree.apply_and_append(&UpdateEvent::create_folder(&root, "docs", false), &cancel)
        .await
        .unwrap();
    tree.apply_and_append(
        &UpdateEvent::create_file(&format!("{root}/docs"), "a.txt", false),
        &cancel,
    )
    .await
    .unwrap();
    tree.flush(&cancel).await.unwrap();

    let reopened = alice.open(tree.roaming_id(), alice_stream(&alice, &tree)).await;
    assert!(!reopened.has_resolved().await);
    reopened.ensure_replayed(&cancel).await.unwrap();

    assert!(reopened.has_resolved().await);
    assert_eq!(reopened.snapshot().await, tree.snapshot().await);
}

fn alice_stream(peer: &Peer, tree: &Replica) -> LocalEventStream {
    LocalEventStream::new(
        tree.local().key().clone(),
        tree.root_id(),
        "docs",
        Arc::new(peer.content.clone()),
        Arc::new(peer.names.clone()),
        ReplicaConfig::default(),
    )
}

#[tokio::test]
async fn earlier_remote_history_triggers_rebuild() {
    let content = MemoryContentStore::new();
    let registry = MemoryNameRegistry::new();
    let alice = Peer::new(&content, &registry);
    let bob = Peer::new(&content, &registry);
    let cancel = CancellationToken::new();

    let a = alice.create_tree().await;
    let b = bob.join(&alice, &a).await;
    let root = a.root_id().to_string();

    // Bob writes first, but alice has not admitted him yet.
    b.apply_and_append(&UpdateEvent::create_file(&root, "from-bob", false), &cancel)
        .await
        .unwrap();
    a.apply_and_append(&UpdateEvent::create_file(&root, "from-alice", false), &cancel)
        .await
        .unwrap();
    assert!(!a.refresh(&cancel).await.unwrap().rebuilt);

    a.admit_source(b.local().key().id.clone(), &cancel)
        .await
        .unwrap();
    let outcome = a.refresh(&cancel).await.unwrap();

    assert!(outcome.rebuilt);
    assert_eq!(outcome.sources, 2);
    assert_eq!(
        file_names(&a.snapshot().await),
        vec!["from-alice".to_string(), "from-bob".to_string()]
    );
}

#[tokio::test]
async fn refresh_follows_admitted_sources() {
    let content = MemoryContentStore::new();
    let registry = MemoryNameRegistry::new();
    let alice = Peer::new(&content, &registry);
    let bob = Peer::new(&content, &registry);
    let carol = Peer::new(&content, &registry);
    let cancel = CancellationToken::new();

    let a = alice.create_tree().await;
    a.flush(&cancel).await.unwrap();
    // Carol joins from the snapshot listing only alice's stream.
    let c = carol.join(&alice, &a).await;

    let b = bob.join(&alice, &a).await;
    let root = a.root_id().to_string();
    a.admit_source(b.local().key().id.clone(), &cancel)
        .await
        .unwrap();
    b.apply_and_append(&UpdateEvent::create_file(&root, "from-bob", false), &cancel)
        .await
        .unwrap();

    let outcome = c.refresh(&cancel).await.unwrap();

    assert_eq!(outcome.sources, 3);
    assert!(c.sources().await.contains(&b.local().key().id));
    assert_eq!(file_names(&c.snapshot().await), vec!["from-bob".to_string()]);
}

#[tokio::test]
async fn concurrent_updates_converge() {
    let content = MemoryContentStore::new();
    let registry = MemoryNameRegistry::new();
    let alice = Peer::new(&content, &registry);
    let bob = Peer::new(&content, &registry);
    let cancel = CancellationToken::new();

    let a = alice.create_tree().await;
    a.apply_and_append(
        &UpdateEvent::create_file(a.root_id(), "shared", false),
        &cancel,
    )
    .await
    .unwrap();
    a.flush(&cancel).await.unwrap();

    let b = bob.join(&alice, &a).await;
    a.admit_source(b.local().key().id.clone(), &cancel)
        .await
        .unwrap();
    b.refresh(&cancel).await.unwrap();

    let file_id = format!("{}/shared", a.root_id());
    let from_alice = content.put_bytes(b"alice", false).await.unwrap();
    let from_bob = content.put_bytes(b"bob", false).await.unwrap();
    a.apply_and_append(&UpdateEvent::file_update(&file_id, from_alice), &cancel)
        .await
        .unwrap();
    b.apply_and_append(&UpdateEvent::file_update(&file_id, from_bob.clone()), &cancel)
        .await
        .unwrap();

    a.refresh(&cancel).await.unwrap();
    b.refresh(&cancel).await.unwrap();

    let on_alice = a.file(&file_id).await.unwrap();
    let on_bob = b.file(&file_id).await.unwrap();
    assert_eq!(on_alice, on_bob);
    // Bob wrote last.
    assert_eq!(on_alice.content_id, Some(from_bob));
}

#[tokio::test]
async fn kind_collision_does_not_break_refresh() {
    let content = MemoryContentStore::new();
    let registry = MemoryNameRegistry::new();
    let alice = Peer::new(&content, &registry);
    let bob = Peer::new(&content, &registry);
    let cancel = CancellationToken::new();

    let a = alice.create_tree().await;
    a.flush(&cancel).await.unwrap();
    let b = bob.join(&alice, &a).await;
    a.admit_source(b.local().key().id.clone(), &cancel)
        .await
        .unwrap();
    b.refresh(&cancel).await.unwrap();

    let root = a.root_id().to_string();
    let id = format!("{root}/a");
    let bytes = content.put_bytes(b"alice", false).await.unwrap();

    // Bob makes a folder "a" first, alice a file "a" before seeing it.
    b.apply_and_append(&UpdateEvent::create_folder(&root, "a", false), &cancel)
        .await
        .unwrap();
    a.apply_and_append(&UpdateEvent::create_file(&root, "a", false), &cancel)
        .await
        .unwrap();
    a.apply_and_append(&UpdateEvent::file_update(&id, bytes), &cancel)
        .await
        .unwrap();

    a.refresh(&cancel).await.unwrap();
    b.refresh(&cancel).await.unwrap();

    for tree in [&a, &b] {
        assert!(tree.folder(&id).await.is_some());
        assert!(tree.file(&id).await.is_none());
        assert!(file_names(&tree.snapshot().await).is_empty());
    }
    assert_eq!(a.applied_len().await, b.applied_len().await);
}

#[tokio::test]
async fn admit_source_is_idempotent_in_the_source_set() {
    let content = MemoryContentStore::new();
    let registry = MemoryNameRegistry::new();
    let alice = Peer::new(&content, &registry);
    let tree = alice.create_tree().await;
    let cancel = CancellationToken::new();
    let peer = MutablePointer::generate();

    assert_eq!(
        tree.admit_source(peer.clone(), &cancel).await.unwrap(),
        Applied::Changed
    );
    assert!(!tree.has_resolved().await);
    assert_eq!(
        tree.admit_source(peer.clone(), &cancel).await.unwrap(),
        Applied::Unchanged
    );
    assert_eq!(tree.sources().await.len(), 2);
    assert!(tree.snapshot().await.sources.contains(&peer));
}

// ── Publish ──────────────────────────────────────────────────────

#[tokio::test]
async fn publish_roaming_exposes_current_tree() {
    let content = MemoryContentStore::new();
    let registry = MemoryNameRegistry::new();
    let alice = Peer::new(&content, &registry);
    let tree = alice.create_tree().await;
    let cancel = CancellationToken::new();
    let root = tree.root_id().to_string();
    tree.apply_and_append(&UpdateEvent::create_file(&root, "a", false), &cancel)
        .await
        .unwrap();

    let pointer = tree.publish_roaming(&cancel).await.unwrap().unwrap();
    let published = resolve_roaming_snapshot(tree.roaming_id(), &content, &alice.names, false, &cancel)
        .await
        .unwrap()
        .unwrap();

    assert_eq!(ContentPointer::of_value(&published).unwrap(), pointer);
    assert_eq!(published, tree.snapshot().await);
}

#[tokio::test]
async fn publish_roaming_without_key_is_skipped() {
    let content = MemoryContentStore::new();
    let registry = MemoryNameRegistry::new();
    let alice = Peer::new(&content, &registry);
    let tree = alice.create_tree().await;
    let snapshot = tree.snapshot().await;

    let local = alice_stream(&alice, &tree);
    let no_key = Replica::from_snapshot(
        &snapshot,
        tree.roaming_id().clone(),
        None,
        local,
        Arc::new(content.clone()) as Arc<dyn ContentStore>,
        Arc::new(alice.names.clone()),
        ReplicaConfig::default(),
    )
    .unwrap();

    assert!(!no_key.holds_roaming_key());
    assert_eq!(
        no_key
            .publish_roaming(&CancellationToken::new())
            .await
            .unwrap(),
        None
    );
}

use nomad_store::{
    ContentStoreExt, KeyAlgorithm, MemoryContentStore, MemoryNameRegistry, MemoryNameService,
    NameService, StoreError,
};
use nomad_sync::{
    resolve_event_stream, CancellationToken, LocalEventStream, ReplicaConfig, SyncError,
};
use nomad_types::{KeyInfo, MutablePointer, UpdateEvent};
use pretty_assertions::assert_eq;
use std::sync::Arc;

async fn make_stream(content: &MemoryContentStore, names: &MemoryNameService) -> LocalEventStream {
    let key = names
        .create_key("Nomad.Storage.Local.docs", KeyAlgorithm::default(), 0)
        .await
        .unwrap();
    stream_for(key, content, names)
}

fn stream_for(key: KeyInfo, content: &MemoryContentStore, names: &MemoryNameService) -> LocalEventStream {
    LocalEventStream::new(
        key,
        "kroaming",
        "docs",
        Arc::new(content.clone()),
        Arc::new(names.clone()),
        ReplicaConfig::default(),
    )
}

#[tokio::test]
async fn append_publishes_the_stream() {
    let content = MemoryContentStore::new();
    let names = MemoryNameRegistry::new().peer();
    let cancel = CancellationToken::new();
    let stream = make_stream(&content, &names).await;

    let appended = stream
        .append(&UpdateEvent::create_file("kroaming", "a", false), &cancel)
        .await
        .unwrap();

    let published = resolve_event_stream(&stream.key().id, &content, &names, false, &cancel)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(published.target_id, "kroaming");
    assert_eq!(published.label, "docs");
    assert_eq!(published.entries, vec![appended.pointer.clone()]);

    assert_eq!(appended.entry.target_id, "kroaming");
    assert_eq!(appended.entry.event_id, "create_file_in_folder");
    let payload: UpdateEvent = content
        .get_value(&appended.entry.content)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(payload, UpdateEvent::create_file("kroaming", "a", false));
}

#[tokio::test]
async fn timestamps_strictly_increase() {
    let content = MemoryContentStore::new();
    let names = MemoryNameRegistry::new().peer();
    let cancel = CancellationToken::new();
    let stream = make_stream(&content, &names).await;

    let mut last = None;
    for i in 0..50 {
        let appended = stream
            .append(&UpdateEvent::create_file("kroaming", &i.to_string(), false), &cancel)
            .await
            .unwrap();
        if let Some(previous) = last {
            assert!(appended.entry.timestamp_utc > previous);
        }
        last = Some(appended.entry.timestamp_utc);
    }
    assert_eq!(stream.snapshot(&cancel).await.unwrap().len(), 50);
}

#[tokio::test]
async fn identical_events_get_distinct_entries() {
    let content = MemoryContentStore::new();
    let names = MemoryNameRegistry::new().peer();
    let cancel = CancellationToken::new();
    let stream = make_stream(&content, &names).await;
    let event = UpdateEvent::delete("kroaming", "kroaming/a", "a");

    let first = stream.append(&event, &cancel).await.unwrap();
    let second = stream.append(&event, &cancel).await.unwrap();

    assert_eq!(first.entry.content, second.entry.content);
    assert_ne!(first.pointer, second.pointer);
}

#[tokio::test]
async fn reopened_stream_continues_after_published_entries() {
    let content = MemoryContentStore::new();
    let names = MemoryNameRegistry::new().peer();
    let cancel = CancellationToken::new();
    let stream = make_stream(&content, &names).await;
    let first = stream
        .append(&UpdateEvent::create_file("kroaming", "a", false), &cancel)
        .await
        .unwrap();

    let reopened = stream_for(stream.key().clone(), &content, &names);
    let second = reopened
        .append(&UpdateEvent::create_file("kroaming", "b", false), &cancel)
        .await
        .unwrap();

    assert!(second.entry.timestamp_utc > first.entry.timestamp_utc);
    assert_eq!(
        reopened.snapshot(&cancel).await.unwrap().entries,
        vec![first.pointer, second.pointer]
    );
}

#[tokio::test]
async fn cancelled_append_leaves_published_stream_intact() {
    let content = MemoryContentStore::new();
    let names = MemoryNameRegistry::new().peer();
    let stream = make_stream(&content, &names).await;
    let live = CancellationToken::new();
    stream
        .append(&UpdateEvent::create_file("kroaming", "a", false), &live)
        .await
        .unwrap();

    let cancelled = CancellationToken::new();
    cancelled.cancel();
    let err = stream
        .append(&UpdateEvent::create_file("kroaming", "b", false), &cancelled)
        .await
        .unwrap_err();
    assert!(matches!(err, SyncError::Cancelled));

    let published = resolve_event_stream(&stream.key().id, &content, &names, false, &live)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(published.len(), 1);
    assert_eq!(stream.snapshot(&live).await.unwrap().len(), 1);
}

#[tokio::test]
async fn append_without_owning_key_fails() {
    let registry = MemoryNameRegistry::new();
    let owner = registry.peer();
    let stranger = registry.peer();
    let content = MemoryContentStore::new();
    let key = owner
        .create_key("Nomad.Storage.Local.docs", KeyAlgorithm::default(), 0)
        .await
        .unwrap();

    let stream = stream_for(key, &content, &stranger);
    let err = stream
        .append(
            &UpdateEvent::create_file("kroaming", "a", false),
            &CancellationToken::new(),
        )
        .await
        .unwrap_err();

    assert!(matches!(err, SyncError::Store(StoreError::KeyNotOwned(_))));
}

#[tokio::test]
async fn publish_seeds_an_empty_stream() {
    let content = MemoryContentStore::new();
    let names = MemoryNameRegistry::new().peer();
    let cancel = CancellationToken::new();
    let stream = make_stream(&content, &names).await;

    stream.publish(&cancel).await.unwrap();

    let published = resolve_event_stream(&stream.key().id, &content, &names, false, &cancel)
        .await
        .unwrap()
        .unwrap();
    assert!(published.is_empty());
    assert_eq!(published.target_id, "kroaming");
}

#[tokio::test]
async fn concurrent_appends_are_not_lost() {
    let content = MemoryContentStore::new();
    let names = MemoryNameRegistry::new().peer();
    let stream = Arc::new(make_stream(&content, &names).await);

    let mut handles = Vec::new();
    for i in 0..10 {
        let stream = stream.clone();
        handles.push(tokio::spawn(async move {
            let event = UpdateEvent::create_file("kroaming", &format!("f{i}"), false);
            stream.append(&event, &CancellationToken::new()).await.unwrap();
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    let published = resolve_event_stream(
        &stream.key().id,
        &content,
        &names,
        false,
        &CancellationToken::new(),
    )
    .await
    .unwrap()
    .unwrap();
    assert_eq!(published.len(), 10);
}

#[tokio::test]
async fn key_identity_is_stream_identity() {
    let content = MemoryContentStore::new();
    let names = MemoryNameRegistry::new().peer();
    let stream = make_stream(&content, &names).await;
    let listed: Vec<MutablePointer> = names
        .list_keys()
        .await
        .unwrap()
        .into_iter()
        .map(|k| k.id)
        .collect();
    assert_eq!(listed, vec![stream.key().id.clone()]);
}

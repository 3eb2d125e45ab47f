use nomad_store::{AddOptions, ContentStore, ContentStoreExt, MemoryContentStore};
use nomad_types::{ContentPointer, NomadFileData};
use pretty_assertions::assert_eq;

#[tokio::test]
async fn put_then_get_bytes() {
    let store = MemoryContentStore::new();
    let pointer = store.put_bytes(b"hello", false).await.unwrap();

    assert_eq!(pointer, ContentPointer::of_bytes(b"hello"));
    assert_eq!(store.get_bytes(&pointer).await.unwrap(), Some(b"hello".to_vec()));
}

#[tokio::test]
async fn identical_bytes_are_stored_once() {
    let store = MemoryContentStore::new();
    let a = store.put_bytes(b"same", false).await.unwrap();
    let b = store.put_bytes(b"same", true).await.unwrap();

    assert_eq!(a, b);
    assert_eq!(store.len().await, 1);
    assert!(store.is_pinned(&a).await);
}

#[tokio::test]
async fn hash_only_does_not_store() {
    let store = MemoryContentStore::new();
    let pointer = store
        .add_bytes(b"probe", AddOptions::hash_only())
        .await
        .unwrap();

    assert_eq!(pointer, ContentPointer::of_bytes(b"probe"));
    assert!(store.is_empty().await);
    assert_eq!(store.get_bytes(&pointer).await.unwrap(), None);
}

#[tokio::test]
async fn missing_block_is_none_not_error() {
    let store = MemoryContentStore::new();
    let missing = ContentPointer::of_bytes(b"never stored");
    assert!(store.get_bytes(&missing).await.unwrap().is_none());
}

#[tokio::test]
async fn typed_value_roundtrip() {
    let store = MemoryContentStore::new();
    let file = NomadFileData::new("root/a", "a");

    let pointer = store.put_value(&file, false).await.unwrap();
    assert_eq!(pointer, ContentPointer::of_value(&file).unwrap());

    let loaded: Option<NomadFileData> = store.get_value(&pointer).await.unwrap();
    assert_eq!(loaded, Some(file));
}

#[tokio::test]
async fn get_value_of_wrong_shape_is_error() {
    let store = MemoryContentStore::new();
    let pointer = store.put_bytes(b"not json", false).await.unwrap();
    let loaded: Result<Option<NomadFileData>, _> = store.get_value(&pointer).await;
    assert!(loaded.is_err());
}

#[tokio::test]
async fn clones_share_blocks() {
    let store = MemoryContentStore::new();
    let other = store.clone();
    let pointer = store.put_bytes(b"shared", false).await.unwrap();
    assert!(other.contains(&pointer).await);
}

#[tokio::test]
async fn garbage_collection_keeps_pinned() {
    let store = MemoryContentStore::new();
    let pinned = store.put_bytes(b"keep", true).await.unwrap();
    let loose = store.put_bytes(b"drop", false).await.unwrap();

    assert_eq!(store.collect_garbage().await, 1);
    assert!(store.contains(&pinned).await);
    assert!(!store.contains(&loose).await);
}

#[tokio::test]
async fn usable_as_trait_object() {
    let store: std::sync::Arc<dyn ContentStore> = std::sync::Arc::new(MemoryContentStore::new());
    let pointer = store.put_value(&"text", false).await.unwrap();
    let back: Option<String> = store.get_value(&pointer).await.unwrap();
    assert_eq!(back.as_deref(), Some("text"));
}

//! Content-addressed block storage.

use crate::error::StoreResult;
use async_trait::async_trait;
use nomad_types::{canonical_bytes, ContentPointer};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

/// Options for [`ContentStore::add_bytes`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AddOptions {
    /// Keep the block across garbage collection.
    pub pin: bool,
    /// Only compute the pointer, do not store anything.
    pub only_hash: bool,
}

impl AddOptions {
    /// Options for a hash-only probe.
    #[must_use]
    pub const fn hash_only() -> Self {
        Self {
            pin: false,
            only_hash: true,
        }
    }
}

/// A content-addressed store of immutable blocks.
///
/// Adding identical bytes always yields the identical pointer.
#[async_trait]
pub trait ContentStore: Send + Sync {
    /// Adds raw bytes, optionally pinning them or only hashing.
    async fn add_bytes(&self, bytes: &[u8], options: AddOptions) -> StoreResult<ContentPointer>;

    /// Fetches the bytes behind a pointer, `None` if not available.
    async fn get_bytes(&self, pointer: &ContentPointer) -> StoreResult<Option<Vec<u8>>>;

    /// Stores raw bytes.
    async fn put_bytes(&self, bytes: &[u8], pin: bool) -> StoreResult<ContentPointer> {
        self.add_bytes(
            bytes,
            AddOptions {
                pin,
                only_hash: false,
            },
        )
        .await
    }
}

/// Typed helpers layered over any [`ContentStore`].
#[async_trait]
pub trait ContentStoreExt: ContentStore {
    /// Stores a value under the pointer of its canonical encoding.
    async fn put_value<T: Serialize + Sync>(&self, value: &T, pin: bool) -> StoreResult<ContentPointer> {
        let bytes = canonical_bytes(value)?;
        self.put_bytes(&bytes, pin).await
    }

    /// Fetches and decodes a value, `None` if not available.
    async fn get_value<T: DeserializeOwned + Send>(
        &self,
        pointer: &ContentPointer,
    ) -> StoreResult<Option<T>> {
        match self.get_bytes(pointer).await? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }
}

impl<S: ContentStore + ?Sized> ContentStoreExt for S {}

#[derive(Debug, Default)]
struct BlockMap {
    blocks: HashMap<ContentPointer, Vec<u8>>,
    pinned: HashSet<ContentPointer>,
}

/// In-memory block store shared by every peer of a simulated swarm.
///
/// Clones share the same blocks.
#[derive(Debug, Clone, Default)]
pub struct MemoryContentStore {
    inner: Arc<RwLock<BlockMap>>,
}

impl MemoryContentStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored blocks.
    pub async fn len(&self) -> usize {
        self.inner.read().await.blocks.len()
    }

    /// Whether no blocks are stored.
    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.blocks.is_empty()
    }

    /// Whether a block is present.
    pub async fn contains(&self, pointer: &ContentPointer) -> bool {
        self.inner.read().await.blocks.contains_key(pointer)
    }

    /// Whether a block is pinned.
    pub async fn is_pinned(&self, pointer: &ContentPointer) -> bool {
        self.inner.read().await.pinned.contains(pointer)
    }

    /// Drops every unpinned block.
    pub async fn collect_garbage(&self) -> usize {
        let mut map = self.inner.write().await;
        let BlockMap { blocks, pinned } = &mut *map;
        let before = blocks.len();
        blocks.retain(|pointer, _| pinned.contains(pointer));
        before - blocks.len()
    }
}

#[async_trait]
impl ContentStore for MemoryContentStore {
    async fn add_bytes(&self, bytes: &[u8], options: AddOptions) -> StoreResult<ContentPointer> {
        let pointer = ContentPointer::of_bytes(bytes);
        if options.only_hash {
            return Ok(pointer);
        }

        let mut map = self.inner.write().await;
        map.blocks
            .entry(pointer.clone())
            .or_insert_with(|| bytes.to_vec());
        if options.pin {
            map.pinned.insert(pointer.clone());
        }
        debug!(%pointer, len = bytes.len(), pin = options.pin, "stored block");
        Ok(pointer)
    }

    async fn get_bytes(&self, pointer: &ContentPointer) -> StoreResult<Option<Vec<u8>>> {
        Ok(self.inner.read().await.blocks.get(pointer).cloned())
    }
}

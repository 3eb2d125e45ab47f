//! Mutable-pointer naming: keys, publish and resolve.
//!
//! A key models a peer identity. Anyone can resolve a key's identity to the
//! content it currently points at, but only a peer holding the key's private
//! material can publish under it.

use crate::error::{StoreError, StoreResult};
use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use nomad_types::{ContentPointer, KeyInfo, MutablePointer};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, info};

/// Key algorithm requested when creating a key.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum KeyAlgorithm {
    #[default]
    Ed25519,
    Rsa,
}

/// Portable private key material, as handed to a paired peer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportedKey {
    /// Identity the key publishes under.
    pub id: MutablePointer,
    /// Hex-encoded private material.
    pub secret: String,
}

/// The mutable-pointer service.
#[async_trait]
pub trait NameService: Send + Sync {
    /// Lists the keys held in the local keyring.
    async fn list_keys(&self) -> StoreResult<Vec<KeyInfo>>;

    /// Creates a new key in the local keyring.
    async fn create_key(&self, name: &str, algorithm: KeyAlgorithm, size: u32)
    -> StoreResult<KeyInfo>;

    /// Points the key named `key_name` at `pointer` for `lifetime`.
    async fn publish(
        &self,
        pointer: &ContentPointer,
        key_name: &str,
        lifetime: Duration,
    ) -> StoreResult<()>;

    /// Resolves an identity to its latest published pointer.
    async fn resolve(
        &self,
        key_id: &MutablePointer,
        use_cache: bool,
    ) -> StoreResult<Option<ContentPointer>>;

    /// Exports a local key's private material.
    async fn export_key(&self, name: &str) -> StoreResult<ExportedKey>;

    /// Imports private material under a local name.
    async fn import_key(&self, name: &str, key: ExportedKey) -> StoreResult<KeyInfo>;

    /// Finds a local key by name.
    async fn get_key(&self, name: &str) -> StoreResult<Option<KeyInfo>> {
        Ok(self
            .list_keys()
            .await?
            .into_iter()
            .find(|key| key.name == name))
    }
}

fn identity_of(secret: &[u8]) -> MutablePointer {
    let mut hasher = Sha256::new();
    hasher.update(secret);
    MutablePointer::new(format!("k{}", hex::encode(hasher.finalize())))
}

fn expiry_after(lifetime: Duration) -> DateTime<Utc> {
    TimeDelta::from_std(lifetime)
        .ok()
        .and_then(|delta| Utc::now().checked_add_signed(delta))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

/// A published record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishedRecord {
    pub value: ContentPointer,
    /// Increments on every publish under the same identity.
    pub sequence: u64,
    pub expires_at: DateTime<Utc>,
}

impl PublishedRecord {
    /// Whether the record has outlived its lifetime.
    pub fn is_expired(&self) -> bool {
        self.expires_at <= Utc::now()
    }
}

/// Published records shared by every peer of a simulated swarm.
#[derive(Debug, Clone, Default)]
pub struct MemoryNameRegistry {
    records: Arc<RwLock<HashMap<MutablePointer, PublishedRecord>>>,
}

impl MemoryNameRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a peer with an empty keyring attached to this registry.
    pub fn peer(&self) -> MemoryNameService {
        MemoryNameService {
            registry: self.clone(),
            keyring: Arc::new(RwLock::new(HashMap::new())),
            cache: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Returns the current record for an identity, expired or not.
    pub async fn record(&self, id: &MutablePointer) -> Option<PublishedRecord> {
        self.records.read().await.get(id).cloned()
    }

    async fn put(&self, id: MutablePointer, value: ContentPointer, lifetime: Duration) -> u64 {
        let mut records = self.records.write().await;
        let sequence = records.get(&id).map_or(0, |r| r.sequence + 1);
        records.insert(
            id,
            PublishedRecord {
                value,
                sequence,
                expires_at: expiry_after(lifetime),
            },
        );
        sequence
    }

    async fn live_value(&self, id: &MutablePointer) -> Option<ContentPointer> {
        self.records
            .read()
            .await
            .get(id)
            .filter(|record| !record.is_expired())
            .map(|record| record.value.clone())
    }
}

#[derive(Debug, Clone)]
struct HeldKey {
    id: MutablePointer,
    secret: Vec<u8>,
}

/// One peer's view of a [`MemoryNameRegistry`]: its own keyring plus a
/// resolve cache.
#[derive(Debug, Clone)]
pub struct MemoryNameService {
    registry: MemoryNameRegistry,
    keyring: Arc<RwLock<HashMap<String, HeldKey>>>,
    cache: Arc<RwLock<HashMap<MutablePointer, ContentPointer>>>,
}

impl MemoryNameService {
    /// The registry this peer publishes to.
    pub fn registry(&self) -> &MemoryNameRegistry {
        &self.registry
    }
}

#[async_trait]
impl NameService for MemoryNameService {
    async fn list_keys(&self) -> StoreResult<Vec<KeyInfo>> {
        let keyring = self.keyring.read().await;
        let mut keys: Vec<KeyInfo> = keyring
            .iter()
            .map(|(name, key)| KeyInfo::new(name.clone(), key.id.clone()))
            .collect();
        keys.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(keys)
    }

    async fn create_key(
        &self,
        name: &str,
        algorithm: KeyAlgorithm,
        size: u32,
    ) -> StoreResult<KeyInfo> {
        let mut keyring = self.keyring.write().await;
        if keyring.contains_key(name) {
            return Err(StoreError::KeyExists(name.to_string()));
        }

        let mut secret = vec![0u8; 32];
        rand::thread_rng().fill_bytes(&mut secret);
        let id = identity_of(&secret);
        keyring.insert(
            name.to_string(),
            HeldKey {
                id: id.clone(),
                secret,
            },
        );

        info!(name, %id, ?algorithm, size, "created key");
        Ok(KeyInfo::new(name, id))
    }

    async fn publish(
        &self,
        pointer: &ContentPointer,
        key_name: &str,
        lifetime: Duration,
    ) -> StoreResult<()> {
        let id = self
            .keyring
            .read()
            .await
            .get(key_name)
            .map(|key| key.id.clone())
            .ok_or_else(|| StoreError::KeyNotOwned(key_name.to_string()))?;

        let sequence = self
            .registry
            .put(id.clone(), pointer.clone(), lifetime)
            .await;
        self.cache.write().await.insert(id.clone(), pointer.clone());

        debug!(key_name, %id, %pointer, sequence, "published");
        Ok(())
    }

    async fn resolve(
        &self,
        key_id: &MutablePointer,
        use_cache: bool,
    ) -> StoreResult<Option<ContentPointer>> {
        if use_cache {
            if let Some(hit) = self.cache.read().await.get(key_id) {
                return Ok(Some(hit.clone()));
            }
        }

        let resolved = self.registry.live_value(key_id).await;
        if let Some(value) = &resolved {
            self.cache
                .write()
                .await
                .insert(key_id.clone(), value.clone());
        }
        Ok(resolved)
    }

    async fn export_key(&self, name: &str) -> StoreResult<ExportedKey> {
        let keyring = self.keyring.read().await;
        let key = keyring
            .get(name)
            .ok_or_else(|| StoreError::KeyNotFound(name.to_string()))?;
        Ok(ExportedKey {
            id: key.id.clone(),
            secret: hex::encode(&key.secret),
        })
    }

    async fn import_key(&self, name: &str, key: ExportedKey) -> StoreResult<KeyInfo> {
        let secret =
            hex::decode(&key.secret).map_err(|_| StoreError::InvalidKey(key.id.to_string()))?;
        if identity_of(&secret) != key.id {
            return Err(StoreError::InvalidKey(key.id.to_string()));
        }

        let mut keyring = self.keyring.write().await;
        if keyring.contains_key(name) {
            return Err(StoreError::KeyExists(name.to_string()));
        }
        keyring.insert(
            name.to_string(),
            HeldKey {
                id: key.id.clone(),
                secret,
            },
        );

        info!(name, id = %key.id, "imported key");
        Ok(KeyInfo::new(name, key.id))
    }
}

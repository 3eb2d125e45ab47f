//! Key creation and seed values for a new roaming folder.
//!
//! A folder uses two keys. The roaming key is shared by every paired peer
//! and carries the consolidated snapshot. The local key is private to one
//! peer and carries its own event stream.

use crate::config::NomadOptions;
use crate::error::NomadResult;
use nomad_store::{ContentStore, ContentStoreExt, KeyAlgorithm, NameService, StoreError};
use nomad_sync::{ensure_live, resolve_event_stream};
use nomad_types::{EventStream, KeyInfo, MutablePointer, NomadFolderData};
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Key size passed to the name service for new keys.
const KEY_SIZE: u32 = 4096;

/// A freshly created local/roaming key pair with their seed values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageKeys {
    pub local: KeyInfo,
    /// Empty stream targeting the roaming id.
    pub local_seed: EventStream,
    pub roaming: KeyInfo,
    /// Empty folder whose sources hold the local stream.
    pub roaming_seed: NomadFolderData,
}

/// Creates both keys of a new folder.
///
/// Fails with [`StoreError::KeyExists`] if either name is taken. The roaming
/// seed already lists the local stream as a source, so exporting the roaming
/// key is enough to let another peer find this peer's history.
pub async fn create_storage_keys(
    names: &dyn NameService,
    local_key_name: &str,
    roaming_key_name: &str,
    folder_name: &str,
    label: &str,
    cancel: &CancellationToken,
) -> NomadResult<StorageKeys> {
    ensure_live(cancel)?;
    let existing = names.list_keys().await?;
    for name in [local_key_name, roaming_key_name] {
        if existing.iter().any(|key| key.name == name) {
            return Err(StoreError::KeyExists(name.to_string()).into());
        }
    }

    ensure_live(cancel)?;
    let local = names
        .create_key(local_key_name, KeyAlgorithm::Ed25519, KEY_SIZE)
        .await?;
    let roaming = names
        .create_key(roaming_key_name, KeyAlgorithm::Ed25519, KEY_SIZE)
        .await?;

    let local_seed = EventStream::new(roaming.id.as_str(), label);
    let roaming_seed =
        NomadFolderData::with_sources(roaming.id.as_str(), folder_name, [local.id.clone()]);

    info!(
        "Created storage keys {} and {} for {}",
        local.name, roaming.name, folder_name
    );
    Ok(StorageKeys {
        local,
        local_seed,
        roaming,
        roaming_seed,
    })
}

/// Publishes both seed values of a new folder.
pub async fn publish_seed(
    content: &dyn ContentStore,
    names: &dyn NameService,
    keys: &StorageKeys,
    options: &NomadOptions,
    cancel: &CancellationToken,
) -> NomadResult<()> {
    publish_value(content, names, &keys.local, &keys.local_seed, options, cancel).await?;
    publish_value(
        content,
        names,
        &keys.roaming,
        &keys.roaming_seed,
        options,
        cancel,
    )
    .await
}

/// Returns this peer's local key for a roaming folder, creating it if needed.
///
/// A newly created key gets an empty stream targeting `roaming_id`
/// published under it. An existing key keeps whatever it has published.
pub async fn get_or_create_local_key(
    content: &dyn ContentStore,
    names: &dyn NameService,
    local_key_name: &str,
    label: &str,
    roaming_id: &MutablePointer,
    options: &NomadOptions,
    cancel: &CancellationToken,
) -> NomadResult<(KeyInfo, EventStream)> {
    ensure_live(cancel)?;
    if let Some(key) = names.get_key(local_key_name).await? {
        let stream = resolve_event_stream(&key.id, content, names, options.use_cache, cancel)
            .await?
            .unwrap_or_else(|| EventStream::new(roaming_id.as_str(), label));
        return Ok((key, stream));
    }

    let key = names
        .create_key(local_key_name, KeyAlgorithm::Ed25519, KEY_SIZE)
        .await?;
    let stream = EventStream::new(roaming_id.as_str(), label);
    publish_value(content, names, &key, &stream, options, cancel).await?;
    info!("Created local key {} for {}", key.name, roaming_id);
    Ok((key, stream))
}

async fn publish_value<T: serde::Serialize + Sync>(
    content: &dyn ContentStore,
    names: &dyn NameService,
    key: &KeyInfo,
    value: &T,
    options: &NomadOptions,
    cancel: &CancellationToken,
) -> NomadResult<()> {
    ensure_live(cancel)?;
    let pointer = content.put_value(value, options.should_pin).await?;
    ensure_live(cancel)?;
    names
        .publish(&pointer, &key.name, options.ipns_lifetime)
        .await?;
    Ok(())
}

//! Locating, creating and pairing roaming folders.

use crate::config::NomadOptions;
use crate::error::{NomadError, NomadResult};
use crate::folder::NomadFolder;
use crate::keys::{create_storage_keys, get_or_create_local_key, publish_seed};
use crate::read_only::ReadOnlyNomadFolder;
use crate::traits::Storable;
use crate::watcher::FolderWatcher;
use nomad_store::{ContentStore, NameService, StoreError};
use nomad_sync::{LocalEventStream, PairingAnswer, PairingCode, PairingOffer, Replica};
use nomad_types::{EventStream, KeyInfo, MutablePointer};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// A folder returned by [`RoamingFolderRepository::get`].
#[derive(Debug, Clone)]
pub enum RepositoryFolder {
    /// This peer holds the roaming key.
    Modifiable(NomadFolder),
    /// Only the published snapshot is visible.
    ReadOnly(ReadOnlyNomadFolder),
}

impl RepositoryFolder {
    pub fn id(&self) -> &str {
        match self {
            Self::Modifiable(folder) => folder.id(),
            Self::ReadOnly(folder) => folder.id(),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Self::Modifiable(folder) => folder.name(),
            Self::ReadOnly(folder) => folder.name(),
        }
    }

    pub fn is_modifiable(&self) -> bool {
        matches!(self, Self::Modifiable(_))
    }

    pub fn into_modifiable(self) -> Option<NomadFolder> {
        match self {
            Self::Modifiable(folder) => Some(folder),
            Self::ReadOnly(_) => None,
        }
    }

    pub fn into_read_only(self) -> Option<ReadOnlyNomadFolder> {
        match self {
            Self::Modifiable(_) => None,
            Self::ReadOnly(folder) => Some(folder),
        }
    }
}

/// Opens roaming folders by id and keeps one replica per folder.
pub struct RoamingFolderRepository {
    content: Arc<dyn ContentStore>,
    names: Arc<dyn NameService>,
    options: NomadOptions,
    /// Open replicas keyed by roaming id.
    replicas: Mutex<HashMap<MutablePointer, Arc<Replica>>>,
}

impl RoamingFolderRepository {
    pub fn new(
        content: Arc<dyn ContentStore>,
        names: Arc<dyn NameService>,
        options: NomadOptions,
    ) -> Self {
        Self {
            content,
            names,
            options,
            replicas: Mutex::new(HashMap::new()),
        }
    }

    pub fn options(&self) -> &NomadOptions {
        &self.options
    }

    /// Roaming keys held by this peer under the configured prefix.
    pub async fn managed_keys(&self) -> NomadResult<Vec<KeyInfo>> {
        let keys = self.names.list_keys().await?;
        Ok(keys
            .into_iter()
            .filter(|key| self.options.folder_name_of(&key.name).is_some())
            .collect())
    }

    /// Creates a new roaming folder owned by this peer.
    pub async fn create(
        &self,
        folder_name: &str,
        cancel: &CancellationToken,
    ) -> NomadResult<NomadFolder> {
        let keys = create_storage_keys(
            self.names.as_ref(),
            &self.options.local_key_name(folder_name),
            &self.options.roaming_key_name(folder_name),
            folder_name,
            folder_name,
            cancel,
        )
        .await?;
        publish_seed(
            self.content.as_ref(),
            self.names.as_ref(),
            &keys,
            &self.options,
            cancel,
        )
        .await?;

        let replica = self.open_modifiable(&keys.roaming, cancel).await?;
        info!("Created roaming folder {} as {}", folder_name, keys.roaming.id);
        Ok(NomadFolder::from_replica(replica).await)
    }

    /// Opens the folder published under `roaming_id`.
    ///
    /// The folder is modifiable when this peer holds the roaming key, else it
    /// is a read-only view of the published snapshot.
    pub async fn get(
        &self,
        roaming_id: &MutablePointer,
        cancel: &CancellationToken,
    ) -> NomadResult<RepositoryFolder> {
        if let Some(roaming) = self.held_roaming_key(roaming_id).await? {
            let replica = self.open_modifiable(&roaming, cancel).await?;
            replica.ensure_replayed(cancel).await?;
            return Ok(RepositoryFolder::Modifiable(
                NomadFolder::from_replica(replica).await,
            ));
        }

        debug!("Roaming key {} not held, opening read-only", roaming_id);
        let folder = ReadOnlyNomadFolder::from_roaming(
            roaming_id,
            self.content.clone(),
            self.names.as_ref(),
            self.options.use_cache,
            cancel,
        )
        .await?;
        Ok(RepositoryFolder::ReadOnly(folder))
    }

    /// Returns this peer's local key for `roaming`, creating it if needed.
    pub async fn get_or_create_local_for(
        &self,
        roaming: &KeyInfo,
        cancel: &CancellationToken,
    ) -> NomadResult<(KeyInfo, EventStream)> {
        get_or_create_local_key(
            self.content.as_ref(),
            self.names.as_ref(),
            &self.options.local_key_name_for(&roaming.name),
            self.label_for(roaming),
            &roaming.id,
            &self.options,
            cancel,
        )
        .await
    }

    /// Drops the cached history of an open folder.
    ///
    /// The next read resolves every source again.
    pub async fn invalidate(&self, roaming_id: &MutablePointer) {
        let replica = self.replicas.lock().await.get(roaming_id).cloned();
        if let Some(replica) = replica {
            replica.invalidate_resolved().await;
            debug!("Invalidated resolved history of {}", roaming_id);
        }
    }

    /// A watcher polling `folder` at the configured update interval.
    pub async fn watch(&self, folder: NomadFolder) -> NomadResult<FolderWatcher> {
        FolderWatcher::new(folder, self.options.update_check_interval).await
    }

    // ── Pairing ──────────────────────────────────────────────────────

    /// Offers a held folder to another peer.
    ///
    /// The folder is flushed first so the joining peer resolves the current
    /// snapshot.
    pub async fn create_pairing_offer(
        &self,
        roaming_id: &MutablePointer,
        code: &PairingCode,
        cancel: &CancellationToken,
    ) -> NomadResult<PairingOffer> {
        let roaming = self
            .held_roaming_key(roaming_id)
            .await?
            .ok_or_else(|| NomadError::UnknownFolder(roaming_id.to_string()))?;
        let replica = self.open_modifiable(&roaming, cancel).await?;
        replica.flush(cancel).await?;

        let exported = self.names.export_key(&roaming.name).await?;
        let folder_name = self.label_for(&roaming).to_string();
        info!("Offering {} for pairing", roaming_id);
        Ok(PairingOffer::new(
            code,
            folder_name,
            exported,
            replica.local().key().id.clone(),
        ))
    }

    /// Joins a folder offered by another peer.
    ///
    /// Imports the roaming key, opens the folder with a fresh local stream
    /// and admits the offering peer's stream.
    pub async fn accept_pairing_offer(
        &self,
        offer: PairingOffer,
        code: &PairingCode,
        cancel: &CancellationToken,
    ) -> NomadResult<(NomadFolder, PairingAnswer)> {
        offer.verify(code)?;
        let roaming_name = self.options.roaming_key_name(&offer.folder_name);
        let roaming = match self.names.get_key(&roaming_name).await? {
            Some(existing) if existing.id == offer.roaming_key.id => existing,
            Some(_) => return Err(StoreError::KeyExists(roaming_name).into()),
            None => {
                self.names
                    .import_key(&roaming_name, offer.roaming_key)
                    .await?
            }
        };

        let replica = self.open_modifiable(&roaming, cancel).await?;
        if !replica.sources().await.contains(&offer.local_stream) {
            replica.admit_source(offer.local_stream.clone(), cancel).await?;
        }
        replica.refresh(cancel).await?;
        replica.flush(cancel).await?;

        let answer = PairingAnswer::new(code, roaming.id.clone(), replica.local().key().id.clone());
        info!("Joined {} from {}", roaming.id, offer.local_stream);
        Ok((NomadFolder::from_replica(replica).await, answer))
    }

    /// Admits the joining peer's stream on the offering side.
    pub async fn complete_pairing(
        &self,
        answer: PairingAnswer,
        code: &PairingCode,
        cancel: &CancellationToken,
    ) -> NomadResult<NomadFolder> {
        answer.verify(code)?;
        let roaming = self
            .held_roaming_key(&answer.roaming_id)
            .await?
            .ok_or_else(|| NomadError::UnknownFolder(answer.roaming_id.to_string()))?;

        let replica = self.open_modifiable(&roaming, cancel).await?;
        if !replica.sources().await.contains(&answer.local_stream) {
            replica.admit_source(answer.local_stream.clone(), cancel).await?;
        }
        replica.refresh(cancel).await?;
        replica.flush(cancel).await?;

        info!("Paired {} with {}", roaming.id, answer.local_stream);
        Ok(NomadFolder::from_replica(replica).await)
    }

    // ── Internals ────────────────────────────────────────────────────

    async fn held_roaming_key(&self, roaming_id: &MutablePointer) -> NomadResult<Option<KeyInfo>> {
        Ok(self
            .names
            .list_keys()
            .await?
            .into_iter()
            .find(|key| key.id == *roaming_id))
    }

    fn label_for<'a>(&self, roaming: &'a KeyInfo) -> &'a str {
        self.options
            .folder_name_of(&roaming.name)
            .unwrap_or(roaming.name.as_str())
    }

    async fn open_modifiable(
        &self,
        roaming: &KeyInfo,
        cancel: &CancellationToken,
    ) -> NomadResult<Arc<Replica>> {
        let mut replicas = self.replicas.lock().await;
        if let Some(replica) = replicas.get(&roaming.id) {
            return Ok(replica.clone());
        }

        let (local_key, _) = self.get_or_create_local_for(roaming, cancel).await?;
        let local = LocalEventStream::new(
            local_key,
            roaming.id.as_str(),
            self.label_for(roaming),
            self.content.clone(),
            self.names.clone(),
            self.options.replica_config(),
        );
        let replica = Replica::open(
            roaming.id.clone(),
            Some(roaming.name.clone()),
            local,
            self.content.clone(),
            self.names.clone(),
            self.options.replica_config(),
            cancel,
        )
        .await?;
        replica.refresh(cancel).await?;

        let replica = Arc::new(replica);
        replicas.insert(roaming.id.clone(), replica.clone());
        debug!("Opened replica {}", roaming.id);
        Ok(replica)
    }
}

impl std::fmt::Debug for RoamingFolderRepository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RoamingFolderRepository")
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

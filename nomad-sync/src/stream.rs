//! The local event stream: the single append-only log this peer owns.

use crate::error::{ensure_live, SyncResult};
use crate::resolver::{resolve_event_stream, ResolvedEntry};
use crate::ReplicaConfig;
use nomad_store::{ContentStore, ContentStoreExt, NameService};
use nomad_types::{
    ContentPointer, EntryTimestamp, EventStream, EventStreamEntry, KeyInfo, UpdateEvent,
};
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

#[derive(Debug, Default)]
struct StreamState {
    /// Last published snapshot, loaded on first use.
    stream: Option<EventStream>,
    /// Timestamp of the newest entry this stream holds.
    last_timestamp: Option<EntryTimestamp>,
}

/// Appends update events to this peer's own stream and publishes it.
///
/// Appends are serialized per stream. Publishing is the last step, so a
/// cancelled or failed append leaves the published stream untouched.
pub struct LocalEventStream {
    key: KeyInfo,
    target_id: String,
    label: String,
    content: Arc<dyn ContentStore>,
    names: Arc<dyn NameService>,
    config: ReplicaConfig,
    state: Mutex<StreamState>,
}

impl LocalEventStream {
    /// Creates a handle for the stream published under `key`.
    pub fn new(
        key: KeyInfo,
        target_id: impl Into<String>,
        label: impl Into<String>,
        content: Arc<dyn ContentStore>,
        names: Arc<dyn NameService>,
        config: ReplicaConfig,
    ) -> Self {
        Self {
            key,
            target_id: target_id.into(),
            label: label.into(),
            content,
            names,
            config,
            state: Mutex::new(StreamState::default()),
        }
    }

    /// The key this stream publishes under.
    pub fn key(&self) -> &KeyInfo {
        &self.key
    }

    /// Id of the tree this stream carries events for.
    pub fn target_id(&self) -> &str {
        &self.target_id
    }

    /// Returns the current stream snapshot, loading it if needed.
    pub async fn snapshot(&self, cancel: &CancellationToken) -> SyncResult<EventStream> {
        let mut state = self.state.lock().await;
        self.load(&mut state, cancel).await?;
        Ok(state
            .stream
            .clone()
            .unwrap_or_else(|| EventStream::new(self.target_id.clone(), self.label.clone())))
    }

    /// Appends `event` and publishes the new stream snapshot.
    ///
    /// Returns the new entry so the caller can advance its position without
    /// re-reading the stream.
    pub async fn append(
        &self,
        event: &UpdateEvent,
        cancel: &CancellationToken,
    ) -> SyncResult<ResolvedEntry> {
        let mut state = self.state.lock().await;
        self.load(&mut state, cancel).await?;

        ensure_live(cancel)?;
        let payload = self.content.put_value(event, self.config.should_pin).await?;

        let timestamp = state
            .last_timestamp
            .map_or_else(EntryTimestamp::now, |last| last.tick());
        let entry = EventStreamEntry::new(
            event.applies_to(),
            event.event_id(),
            timestamp,
            payload,
        );

        ensure_live(cancel)?;
        let pointer = self.content.put_value(&entry, self.config.should_pin).await?;

        let mut stream = state
            .stream
            .clone()
            .unwrap_or_else(|| EventStream::new(self.target_id.clone(), self.label.clone()));
        stream.append(pointer.clone());

        ensure_live(cancel)?;
        self.put_and_publish(&stream).await?;

        debug!(
            "Appended {} for {} to {} ({} entries)",
            entry.event_id,
            entry.target_id,
            self.key.name,
            stream.len()
        );
        state.stream = Some(stream);
        state.last_timestamp = Some(timestamp);

        Ok(ResolvedEntry { pointer, entry })
    }

    /// Republishes the current stream snapshot.
    pub async fn publish(&self, cancel: &CancellationToken) -> SyncResult<ContentPointer> {
        let mut state = self.state.lock().await;
        self.load(&mut state, cancel).await?;
        let stream = state
            .stream
            .get_or_insert_with(|| EventStream::new(self.target_id.clone(), self.label.clone()))
            .clone();

        ensure_live(cancel)?;
        let pointer = self.put_and_publish(&stream).await?;
        info!("Published local stream {} ({} entries)", self.key.name, stream.len());
        Ok(pointer)
    }

    async fn put_and_publish(&self, stream: &EventStream) -> SyncResult<ContentPointer> {
        let pointer = self.content.put_value(stream, self.config.should_pin).await?;
        self.names
            .publish(&pointer, &self.key.name, self.config.ipns_lifetime)
            .await?;
        Ok(pointer)
    }

    async fn load(&self, state: &mut StreamState, cancel: &CancellationToken) -> SyncResult<()> {
        if state.stream.is_some() {
            return Ok(());
        }

        let stream = resolve_event_stream(
            &self.key.id,
            self.content.as_ref(),
            self.names.as_ref(),
            false,
            cancel,
        )
        .await?;

        if let Some(last) = stream.as_ref().and_then(|s| s.entries.last()) {
            ensure_live(cancel)?;
            if let Some(entry) = self.content.get_value::<EventStreamEntry>(last).await? {
                state.last_timestamp = Some(entry.timestamp_utc);
            }
        }

        state.stream = stream;
        Ok(())
    }
}

impl std::fmt::Debug for LocalEventStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalEventStream")
            .field("key", &self.key)
            .field("target_id", &self.target_id)
            .field("label", &self.label)
            .finish_non_exhaustive()
    }
}

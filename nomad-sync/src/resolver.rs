//! Source resolution: merge every reachable entry of a set of event streams
//! into one time-ordered history.
//!
//! Content that has not propagated yet is treated as absent, so a pass may
//! observe a shorter history than a later one. Only genuine store failures
//! propagate.

use crate::error::{ensure_live, SyncResult};
use futures::future::try_join_all;
use nomad_store::{ContentStore, ContentStoreExt, NameService};
use nomad_types::{ContentPointer, EventStream, EventStreamEntry, MutablePointer, UpdateEvent};
use std::collections::HashSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// An entry together with the pointer it was resolved from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedEntry {
    pub pointer: ContentPointer,
    pub entry: EventStreamEntry,
}

/// Resolves the current snapshot of one event stream.
pub async fn resolve_event_stream(
    source: &MutablePointer,
    content: &dyn ContentStore,
    names: &dyn NameService,
    use_cache: bool,
    cancel: &CancellationToken,
) -> SyncResult<Option<EventStream>> {
    ensure_live(cancel)?;
    let Some(pointer) = names.resolve(source, use_cache).await? else {
        debug!("Source {} has not published yet", source);
        return Ok(None);
    };

    ensure_live(cancel)?;
    let stream = content.get_value::<EventStream>(&pointer).await?;
    if stream.is_none() {
        warn!("Stream snapshot {} for source {} is unavailable", pointer, source);
    }
    Ok(stream)
}

async fn resolve_source_entries(
    source: &MutablePointer,
    content: &dyn ContentStore,
    names: &dyn NameService,
    use_cache: bool,
    cancel: &CancellationToken,
) -> SyncResult<Vec<ResolvedEntry>> {
    let Some(stream) = resolve_event_stream(source, content, names, use_cache, cancel).await?
    else {
        return Ok(Vec::new());
    };

    let mut resolved = Vec::with_capacity(stream.entries.len());
    for pointer in stream.entries {
        ensure_live(cancel)?;
        match content.get_value::<EventStreamEntry>(&pointer).await? {
            Some(entry) => resolved.push(ResolvedEntry { pointer, entry }),
            None => warn!("Entry {} from source {} is unavailable", pointer, source),
        }
    }

    debug!("Resolved {} entries from source {}", resolved.len(), source);
    Ok(resolved)
}

/// Resolves every entry reachable from `sources` into one merged history.
///
/// Sources are resolved concurrently. The result is ordered by timestamp,
/// equal timestamps ordered by entry pointer, and holds each entry pointer
/// once even when several sources reference it.
pub async fn resolve_event_stream_entries<'a, I>(
    sources: I,
    content: &dyn ContentStore,
    names: &dyn NameService,
    use_cache: bool,
    cancel: &CancellationToken,
) -> SyncResult<Vec<ResolvedEntry>>
where
    I: IntoIterator<Item = &'a MutablePointer>,
{
    ensure_live(cancel)?;

    let per_source = try_join_all(
        sources
            .into_iter()
            .map(|source| resolve_source_entries(source, content, names, use_cache, cancel)),
    )
    .await?;

    let mut seen = HashSet::new();
    let mut merged: Vec<ResolvedEntry> = per_source
        .into_iter()
        .flatten()
        .filter(|resolved| seen.insert(resolved.pointer.clone()))
        .collect();

    sort_history(&mut merged);
    Ok(merged)
}

/// Orders entries by timestamp, then by entry pointer.
pub fn sort_history(entries: &mut [ResolvedEntry]) {
    entries.sort_by(|a, b| {
        a.entry
            .timestamp_utc
            .cmp(&b.entry.timestamp_utc)
            .then_with(|| a.pointer.cmp(&b.pointer))
    });
}

/// Resolves the payload of an entry. `None` if it has not propagated.
pub async fn resolve_event(
    entry: &EventStreamEntry,
    content: &dyn ContentStore,
    cancel: &CancellationToken,
) -> SyncResult<Option<UpdateEvent>> {
    ensure_live(cancel)?;
    let event = content.get_value::<UpdateEvent>(&entry.content).await?;
    if event.is_none() {
        warn!("Payload {} for {} is unavailable", entry.content, entry.target_id);
    }
    Ok(event)
}

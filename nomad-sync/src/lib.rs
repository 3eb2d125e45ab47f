//! Event stream replication engine for Nomad replicated storage.
//!
//! Every peer appends its own edits to a private, append-only event stream.
//! A folder tree's current state is reconstructed by merging the streams of
//! every known peer and replaying them in timestamp order.
//!
//! ## Components
//!
//! - **Resolver**: merges the entries of a set of source streams
//! - **Applicator**: folds update events onto a snapshot tree
//! - **Stream**: appends to and publishes this peer's own stream
//! - **Replica**: the replication context tying them together for one tree
//! - **Pairing**: messages that admit a second peer into a tree
//!
//! ## Write path
//!
//! 1. Build an [`UpdateEvent`](nomad_types::UpdateEvent)
//! 2. Apply it to a copy of the local tree
//! 3. Append it to the local stream and publish the stream
//! 4. Commit the new tree and advance the node's position
//!
//! ## Read path
//!
//! 1. Resolve every source stream, following newly admitted sources
//! 2. Merge and order the entries
//! 3. Replay whatever has not been applied yet

pub mod applicator;
mod error;
pub mod pairing;
pub mod replica;
pub mod resolver;
pub mod stream;

pub use applicator::{Applied, ApplicatorError, ApplicatorResult, EventApplicator};
pub use error::{ensure_live, SyncError, SyncResult};
pub use pairing::{PairingAnswer, PairingCode, PairingOffer};
pub use replica::{resolve_roaming_snapshot, RefreshOutcome, Replica, ReplicaConfig};
pub use resolver::{
    resolve_event, resolve_event_stream, resolve_event_stream_entries, sort_history,
    ResolvedEntry,
};
pub use stream::LocalEventStream;

pub use tokio_util::sync::CancellationToken;

//! Core type definitions for Nomad replicated storage.
//!
//! This crate defines the plain data shared by every layer:
//! - Content and mutable pointers
//! - Entry timestamps
//! - Update events, event stream entries and event streams
//! - Roaming folder/file snapshots
//!
//! Nothing here performs I/O. Encoding a value with [`canonical_bytes`] is
//! stable, so [`ContentPointer::of_value`] can be used for equality and dedup.

mod data;
mod event;
mod pointer;
mod timestamp;

pub use data::{ChildRef, NodeKind, NomadFileData, NomadFolderData};
pub use event::{child_id, EventCategory, EventStream, EventStreamEntry, UpdateEvent};
pub use pointer::{canonical_bytes, ContentPointer, KeyInfo, MutablePointer};
pub use timestamp::EntryTimestamp;

/// Result type alias using the crate's error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in type operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("invalid pointer: {0}")]
    InvalidPointer(String),

    #[error("invalid timestamp: {0}")]
    InvalidTimestamp(String),
}

//! Error types for the folder and file projections.

use nomad_store::StoreError;
use nomad_sync::SyncError;
use thiserror::Error;

/// Result type for folder and file operations.
pub type NomadResult<T> = Result<T, NomadError>;

/// Errors that can occur reading or modifying a Nomad folder tree.
#[derive(Debug, Error)]
pub enum NomadError {
    /// Error from the replication layer.
    #[error(transparent)]
    Sync(#[from] SyncError),

    /// Content store or name service error.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// No child with this id or name.
    #[error("item not found: {0}")]
    ItemNotFound(String),

    /// A child with this name already exists.
    #[error("item already exists: {0}")]
    AlreadyExists(String),

    /// The name cannot be used for a child item.
    #[error("invalid item name: {0:?}")]
    InvalidName(String),

    /// The bytes behind a file's content pointer are not available.
    #[error("content not available: {0}")]
    ContentUnavailable(String),

    /// No repository folder is known under this roaming id.
    #[error("unknown roaming folder: {0}")]
    UnknownFolder(String),

    /// Options could not be parsed.
    #[error("TOML deserialization error: {0}")]
    TomlDeserialize(#[from] toml::de::Error),

    /// I/O error from a file buffer.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl NomadError {
    /// Whether this error is a cancellation.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Sync(SyncError::Cancelled))
    }
}

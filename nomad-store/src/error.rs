//! Error types for the storage layer.

use thiserror::Error;

/// Result type for storage operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur talking to the content store or name service.
///
/// Content or records that simply have not been observed yet are reported
/// as `Ok(None)`, never as an error.
#[derive(Debug, Error)]
pub enum StoreError {
    /// No key with this name exists in the local keyring.
    #[error("key not found: {0}")]
    KeyNotFound(String),

    /// A key with this name already exists in the local keyring.
    #[error("key already exists: {0}")]
    KeyExists(String),

    /// The private material for this key is not held locally.
    #[error("key not owned by this peer: {0}")]
    KeyNotOwned(String),

    /// Imported key material does not match its claimed identity.
    #[error("invalid key material for {0}")]
    InvalidKey(String),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Error from the shared type layer.
    #[error(transparent)]
    Types(#[from] nomad_types::Error),

    /// I/O error from a backing store.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Any other backend failure.
    #[error("backend error: {0}")]
    Backend(String),
}

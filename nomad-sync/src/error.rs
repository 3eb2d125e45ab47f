//! Error types for the replication layer.

use crate::applicator::ApplicatorError;
use nomad_store::StoreError;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

/// Result type for replication operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Errors that can occur while resolving, applying or publishing.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Content store or name service error.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// Routing or integrity violation while applying an event.
    #[error("apply error: {0}")]
    Applicator(#[from] ApplicatorError),

    /// Error from the shared type layer.
    #[error(transparent)]
    Types(#[from] nomad_types::Error),

    /// The operation was cancelled.
    #[error("operation cancelled")]
    Cancelled,

    /// A required published snapshot is absent or malformed.
    #[error("missing snapshot: {0}")]
    MissingSnapshot(String),

    /// The event targets a node that is not in the tree.
    #[error("node not found: {0}")]
    NodeNotFound(String),

    /// Pairing material does not belong to the expected code.
    #[error("pairing mismatch: {0}")]
    PairingMismatch(String),

    /// Pairing code could not be parsed.
    #[error("invalid pairing code: {0}")]
    InvalidPairingCode(String),
}

/// Fails with [`SyncError::Cancelled`] once `cancel` has fired.
pub fn ensure_live(cancel: &CancellationToken) -> SyncResult<()> {
    if cancel.is_cancelled() {
        Err(SyncError::Cancelled)
    } else {
        Ok(())
    }
}

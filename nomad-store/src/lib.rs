//! Storage seams for Nomad replicated storage.
//!
//! The replication engine consumes two collaborators and never implements
//! them itself:
//! - a [`ContentStore`] that addresses immutable blocks by their digest
//! - a [`NameService`] that repoints key identities at content over time
//!
//! In-memory implementations ([`MemoryContentStore`], [`MemoryNameRegistry`],
//! [`MemoryNameService`]) model a swarm of peers inside one process. They
//! share blocks and published records but each peer keeps its own keyring and
//! resolve cache.
//!
//! # Example
//!
//! ```
//! use nomad_store::{MemoryContentStore, MemoryNameRegistry};
//!
//! let content = MemoryContentStore::new();
//! let registry = MemoryNameRegistry::new();
//! let alice = registry.peer();
//! let bob = registry.peer();
//! # let _ = (content, alice, bob);
//! ```

mod content;
mod error;
mod names;

pub use content::{AddOptions, ContentStore, ContentStoreExt, MemoryContentStore};
pub use error::{StoreError, StoreResult};
pub use names::{
    ExportedKey, KeyAlgorithm, MemoryNameRegistry, MemoryNameService, NameService,
    PublishedRecord,
};

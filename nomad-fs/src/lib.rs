//! Folder and file projections over Nomad replicated storage.
//!
//! A roaming folder is a tree whose state is rebuilt from the event streams
//! of every paired peer. This crate presents that tree through ordinary
//! folder and file operations:
//!
//! - [`ReadOnlyNomadFolder`] / [`ReadOnlyNomadFile`]: a published snapshot,
//!   listed and read as is
//! - [`NomadFolder`] / [`NomadFile`]: a tree this peer can modify. Every
//!   mutation is applied locally, then appended to this peer's stream
//! - [`RoamingFolderRepository`]: creates, opens and pairs roaming folders
//! - [`FolderWatcher`]: polls a folder for remote changes
//!
//! # Example
//!
//! ```no_run
//! use nomad_fs::{NomadOptions, RoamingFolderRepository, WritableFolder};
//! use nomad_store::{MemoryContentStore, MemoryNameRegistry};
//! use nomad_sync::CancellationToken;
//! use std::sync::Arc;
//!
//! # async fn example() -> nomad_fs::NomadResult<()> {
//! let content = Arc::new(MemoryContentStore::new());
//! let names = Arc::new(MemoryNameRegistry::new().peer());
//! let repo = RoamingFolderRepository::new(content, names, NomadOptions::default());
//! let cancel = CancellationToken::new();
//!
//! let docs = repo.create("docs", &cancel).await?;
//! let notes = docs.create_file("notes.txt", false, &cancel).await?;
//! notes.write_bytes(b"hello", &cancel).await?;
//! docs.flush(&cancel).await?;
//! # Ok(())
//! # }
//! ```

mod config;
mod copy;
mod error;
mod file;
mod folder;
mod keys;
mod read_only;
mod repository;
mod stream;
mod traits;
mod watcher;

pub use config::NomadOptions;
pub use copy::{copy_folder_into, CopyStats};
pub use error::{NomadError, NomadResult};
pub use file::NomadFile;
pub use folder::NomadFolder;
pub use keys::{create_storage_keys, get_or_create_local_key, publish_seed, StorageKeys};
pub use read_only::{ReadOnlyNomadFile, ReadOnlyNomadFolder};
pub use repository::{RepositoryFolder, RoamingFolderRepository};
pub use stream::{FileReader, FileWriter};
pub use traits::{
    Item, ItemKind, ReadableFile, ReadableFolder, Storable, WritableFile, WritableFolder,
};
pub use watcher::{FolderChange, FolderWatcher};

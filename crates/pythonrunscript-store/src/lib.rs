//! On-disk cache of script environments for pythonrunscript.
//!
//! `StoreLayout` names every path under the cache root and the trash root,
//! `MetadataStore` reads and writes the `entry.json` record of a finished
//! entry, and the `trash` module relocates failed or discarded entries
//! instead of deleting them.

pub mod layout;
pub mod metadata;
pub mod trash;

pub use layout::{default_cache_root, default_trash_root, StoreLayout};
pub use metadata::{CacheEntry, EntryKind, EntryMetadata, MetadataStore};
pub use trash::{clean_cache, trash_entry};

use std::path::{Path, PathBuf};
use thiserror::Error;

/// Fsync a directory so that a preceding `rename()` is durable.
pub(crate) fn fsync_dir(dir: &Path) -> Result<(), std::io::Error> {
    let f = std::fs::File::open(dir)?;
    f.sync_all()
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("cache I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("no cache entry for {0}")]
    EntryNotFound(String),
    #[error("entry metadata checksum mismatch for {fingerprint}: expected {expected}, got {actual}")]
    IntegrityFailure {
        fingerprint: String,
        expected: String,
        actual: String,
    },
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("failed to move {} to trash at {}: {source}", .from.display(), .to.display())]
    Trash {
        from: PathBuf,
        to: PathBuf,
        source: std::io::Error,
    },
}

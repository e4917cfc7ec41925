use crate::layout::StoreLayout;
use crate::{fsync_dir, StoreError};
use pythonrunscript_schema::{Fingerprint, ScriptIdentity, ShortId};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// Which installer built an entry.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    Pip,
    Conda,
}

impl EntryKind {
    pub fn env_dir_name(self) -> &'static str {
        match self {
            EntryKind::Pip => "venv",
            EntryKind::Conda => "condaenv",
        }
    }
}

impl std::fmt::Display for EntryKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EntryKind::Pip => write!(f, "pip"),
            EntryKind::Conda => write!(f, "conda"),
        }
    }
}

/// Record written into an entry once its creation has succeeded.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EntryMetadata {
    pub fingerprint: Fingerprint,
    pub short_id: ShortId,
    pub kind: EntryKind,
    /// The script whose invocation created the entry.
    pub script: PathBuf,
    pub tool_version: String,
    pub created_at: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checksum: Option<String>,
}

impl EntryMetadata {
    pub fn new(identity: &ScriptIdentity, kind: EntryKind, script: &Path) -> Self {
        Self {
            fingerprint: identity.fingerprint.clone(),
            short_id: identity.short_id.clone(),
            kind,
            script: script.to_path_buf(),
            tool_version: env!("CARGO_PKG_VERSION").to_owned(),
            created_at: chrono::Utc::now().to_rfc3339(),
            checksum: None,
        }
    }

    fn compute_checksum(&self) -> Result<String, StoreError> {
        let mut copy = self.clone();
        copy.checksum = None;
        let json = serde_json::to_string_pretty(&copy)?;
        Ok(blake3::hash(json.as_bytes()).to_hex().to_string())
    }
}

/// One directory under the cache root, as seen by a listing.
#[derive(Debug, Clone, Serialize)]
pub struct CacheEntry {
    pub name: String,
    pub path: PathBuf,
    /// `None` when `entry.json` is missing or unreadable.
    pub metadata: Option<EntryMetadata>,
}

impl CacheEntry {
    pub fn is_complete(&self) -> bool {
        self.metadata.is_some()
    }

    pub fn status(&self) -> &'static str {
        if self.is_complete() {
            "complete"
        } else {
            "incomplete"
        }
    }
}

pub struct MetadataStore {
    layout: StoreLayout,
}

impl MetadataStore {
    pub fn new(layout: StoreLayout) -> Self {
        Self { layout }
    }

    /// Atomically write `entry.json`, embedding a checksum. The entry
    /// directory must already exist.
    pub fn put(&self, meta: &EntryMetadata) -> Result<(), StoreError> {
        let dir = self.layout.entry_path(&meta.fingerprint);
        if !dir.is_dir() {
            return Err(StoreError::EntryNotFound(meta.fingerprint.to_string()));
        }

        let mut with_checksum = meta.clone();
        with_checksum.checksum = Some(with_checksum.compute_checksum()?);
        let content = serde_json::to_string_pretty(&with_checksum)?;

        let mut tmp = NamedTempFile::new_in(&dir)?;
        tmp.write_all(content.as_bytes())?;
        tmp.as_file().sync_all()?;
        tmp.persist(self.layout.metadata_file(&meta.fingerprint))
            .map_err(|e| StoreError::Io(e.error))?;
        fsync_dir(&dir)?;
        Ok(())
    }

    pub fn get(&self, fingerprint: &str) -> Result<EntryMetadata, StoreError> {
        let path = self.layout.metadata_file(fingerprint);
        if !path.exists() {
            return Err(StoreError::EntryNotFound(fingerprint.to_owned()));
        }
        let content = fs::read_to_string(&path)?;
        let meta: EntryMetadata = serde_json::from_str(&content)?;

        if let Some(ref expected) = meta.checksum {
            let actual = meta.compute_checksum()?;
            if actual != *expected {
                return Err(StoreError::IntegrityFailure {
                    fingerprint: fingerprint.to_owned(),
                    expected: expected.clone(),
                    actual,
                });
            }
        }
        Ok(meta)
    }

    /// Every entry directory under the cache root, sorted by name.
    /// Bookkeeping directories such as `.locks` are skipped.
    pub fn list(&self) -> Result<Vec<CacheEntry>, StoreError> {
        let root = self.layout.cache_root();
        if !root.exists() {
            return Ok(Vec::new());
        }
        let mut entries = Vec::new();
        for dirent in fs::read_dir(root)? {
            let dirent = dirent?;
            if !dirent.file_type()?.is_dir() {
                continue;
            }
            let name = dirent.file_name().to_string_lossy().into_owned();
            if StoreLayout::is_reserved(&name) {
                continue;
            }
            let metadata = match self.get(&name) {
                Ok(meta) => Some(meta),
                Err(StoreError::EntryNotFound(_)) => None,
                Err(e) => {
                    tracing::warn!("unreadable metadata for cache entry '{name}': {e}");
                    None
                }
            };
            entries.push(CacheEntry {
                name,
                path: dirent.path(),
                metadata,
            });
        }
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(entries)
    }
}

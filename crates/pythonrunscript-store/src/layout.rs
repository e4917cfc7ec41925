use crate::metadata::EntryKind;
use crate::StoreError;
use std::fs;
use std::path::{Path, PathBuf};

const APP_DIR: &str = "pythonrunscript";
const LOCKS_DIR: &str = ".locks";
const LOGS_DIR: &str = "logs";
const METADATA_FILE: &str = "entry.json";

/// Captured `pip list` output of a pip entry.
pub const PIP_LIST_FILE: &str = "piplist.txt";
/// Captured `conda env export` output of a conda entry.
pub const EXPORTED_ENV_FILE: &str = "exported-environment.yml";

/// Platform cache directory joined with the application name.
///
/// XDG cache home on Linux, `~/Library/Caches` on macOS.
pub fn default_cache_root() -> Option<PathBuf> {
    dirs_next::cache_dir().map(|d| d.join(APP_DIR))
}

pub fn default_trash_root() -> PathBuf {
    std::env::temp_dir().join(APP_DIR)
}

/// Directory layout of the environment cache.
///
/// ```text
/// <cache_root>/
///   .locks/<fingerprint>.lock
///   <fingerprint>/
///     venv/ | condaenv/
///     logs/<phase>.out, <phase>.err
///     requirements.txt, piplist.txt, environment.yml, ...
///     entry.json
/// <trash_root>/<entry name>/<stamp>/
/// ```
#[derive(Debug, Clone)]
pub struct StoreLayout {
    cache_root: PathBuf,
    trash_root: PathBuf,
}

impl StoreLayout {
    pub fn new(cache_root: impl Into<PathBuf>, trash_root: impl Into<PathBuf>) -> Self {
        Self {
            cache_root: cache_root.into(),
            trash_root: trash_root.into(),
        }
    }

    #[inline]
    pub fn cache_root(&self) -> &Path {
        &self.cache_root
    }

    #[inline]
    pub fn trash_root(&self) -> &Path {
        &self.trash_root
    }

    #[inline]
    pub fn locks_dir(&self) -> PathBuf {
        self.cache_root.join(LOCKS_DIR)
    }

    #[inline]
    pub fn lock_file(&self, fingerprint: &str) -> PathBuf {
        self.locks_dir().join(format!("{fingerprint}.lock"))
    }

    #[inline]
    pub fn entry_path(&self, fingerprint: &str) -> PathBuf {
        self.cache_root.join(fingerprint)
    }

    /// The venv or conda prefix inside an entry.
    #[inline]
    pub fn env_dir(&self, fingerprint: &str, kind: EntryKind) -> PathBuf {
        self.entry_path(fingerprint).join(kind.env_dir_name())
    }

    #[inline]
    pub fn logs_dir(&self, fingerprint: &str) -> PathBuf {
        self.entry_path(fingerprint).join(LOGS_DIR)
    }

    #[inline]
    pub fn artifact_path(&self, fingerprint: &str, file_name: &str) -> PathBuf {
        self.entry_path(fingerprint).join(file_name)
    }

    #[inline]
    pub fn metadata_file(&self, fingerprint: &str) -> PathBuf {
        self.entry_path(fingerprint).join(METADATA_FILE)
    }

    /// Whether `name` under the cache root is bookkeeping rather than an entry.
    pub(crate) fn is_reserved(name: &str) -> bool {
        name.starts_with('.')
    }

    /// Create the cache root and its lock directory.
    pub fn initialize(&self) -> Result<(), StoreError> {
        fs::create_dir_all(self.locks_dir())?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_paths_are_correct() {
        let layout = StoreLayout::new("/c/prs", "/t/prs");
        assert_eq!(layout.cache_root(), Path::new("/c/prs"));
        assert_eq!(layout.trash_root(), Path::new("/t/prs"));
        assert_eq!(layout.entry_path("abc"), PathBuf::from("/c/prs/abc"));
        assert_eq!(
            layout.env_dir("abc", EntryKind::Pip),
            PathBuf::from("/c/prs/abc/venv")
        );
        assert_eq!(
            layout.env_dir("abc", EntryKind::Conda),
            PathBuf::from("/c/prs/abc/condaenv")
        );
        assert_eq!(layout.logs_dir("abc"), PathBuf::from("/c/prs/abc/logs"));
        assert_eq!(
            layout.artifact_path("abc", PIP_LIST_FILE),
            PathBuf::from("/c/prs/abc/piplist.txt")
        );
        assert_eq!(
            layout.metadata_file("abc"),
            PathBuf::from("/c/prs/abc/entry.json")
        );
    }

    #[test]
    fn lock_files_live_outside_entries() {
        let layout = StoreLayout::new("/c/prs", "/t/prs");
        let lock = layout.lock_file("abc");
        assert_eq!(lock, PathBuf::from("/c/prs/.locks/abc.lock"));
        assert!(!lock.starts_with(layout.entry_path("abc")));
    }

    #[test]
    fn reserved_names() {
        assert!(StoreLayout::is_reserved(".locks"));
        assert!(!StoreLayout::is_reserved("0123abcd"));
    }

    #[test]
    fn initialize_creates_locks_dir() {
        let dir = tempfile::tempdir().unwrap();
        let layout = StoreLayout::new(dir.path().join("cache"), dir.path().join("trash"));
        layout.initialize().unwrap();
        assert!(layout.locks_dir().is_dir());
        assert!(!layout.trash_root().exists());
    }

    #[test]
    fn default_trash_root_is_under_temp_dir() {
        let trash = default_trash_root();
        assert!(trash.starts_with(std::env::temp_dir()));
        assert!(trash.ends_with(APP_DIR));
    }
}

//! Pseudo-deletion: entries are moved under the trash root, never removed.

use crate::layout::StoreLayout;
use crate::StoreError;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

fn unique_destination(base: &Path) -> PathBuf {
    let stamp = format!(
        "{}-{}",
        chrono::Utc::now().format("%Y%m%dT%H%M%S%.6f"),
        std::process::id()
    );
    let mut dest = base.join(&stamp);
    let mut n = 1u32;
    while dest.exists() {
        dest = base.join(format!("{stamp}-{n}"));
        n += 1;
    }
    dest
}

fn copy_tree(from: &Path, to: &Path) -> std::io::Result<()> {
    let meta = fs::symlink_metadata(from)?;
    if meta.file_type().is_symlink() {
        let target = fs::read_link(from)?;
        #[cfg(unix)]
        std::os::unix::fs::symlink(&target, to)?;
        #[cfg(not(unix))]
        fs::copy(from, to).map(|_| ())?;
        debug!("copied link {} -> {}", to.display(), target.display());
    } else if meta.is_dir() {
        fs::create_dir_all(to)?;
        for entry in fs::read_dir(from)? {
            let entry = entry?;
            copy_tree(&entry.path(), &to.join(entry.file_name()))?;
        }
    } else {
        fs::copy(from, to)?;
    }
    Ok(())
}

/// Move `path` to `<trash_root>/<basename>/<stamp>` and return the new
/// location. Falls back to copy-and-remove when a rename is impossible,
/// typically because the trash root is on another filesystem.
pub fn trash_entry(layout: &StoreLayout, path: &Path) -> Result<PathBuf, StoreError> {
    let basename = path
        .file_name()
        .map_or_else(|| "entry".into(), |n| n.to_string_lossy().into_owned());
    let bucket = layout.trash_root().join(basename);
    fs::create_dir_all(&bucket)?;
    let dest = unique_destination(&bucket);

    if let Err(e) = fs::rename(path, &dest) {
        debug!("rename into trash failed ({e}), copying instead");
        let moved = copy_tree(path, &dest).and_then(|()| fs::remove_dir_all(path));
        if let Err(source) = moved {
            return Err(StoreError::Trash {
                from: path.to_path_buf(),
                to: dest,
                source,
            });
        }
    }

    info!("moved {} to {}", path.display(), dest.display());
    Ok(dest)
}

/// Move the whole cache root to trash. Returns `None` if there was no cache.
pub fn clean_cache(layout: &StoreLayout) -> Result<Option<PathBuf>, StoreError> {
    if !layout.cache_root().exists() {
        return Ok(None);
    }
    trash_entry(layout, layout.cache_root()).map(Some)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup() -> (tempfile::TempDir, StoreLayout) {
        let dir = tempfile::tempdir().unwrap();
        let layout = StoreLayout::new(dir.path().join("cache"), dir.path().join("trash"));
        layout.initialize().unwrap();
        (dir, layout)
    }

    #[test]
    fn trash_moves_entry_under_its_basename() {
        let (_dir, layout) = setup();
        let entry = layout.entry_path("abc");
        fs::create_dir_all(entry.join("logs")).unwrap();
        fs::write(entry.join("logs").join("pip_install.err"), "boom").unwrap();

        let dest = trash_entry(&layout, &entry).unwrap();
        assert!(!entry.exists());
        assert!(dest.starts_with(layout.trash_root().join("abc")));
        assert_eq!(
            fs::read_to_string(dest.join("logs").join("pip_install.err")).unwrap(),
            "boom"
        );
    }

    #[test]
    fn repeated_trash_gets_distinct_destinations() {
        let (_dir, layout) = setup();
        let entry = layout.entry_path("abc");
        fs::create_dir_all(&entry).unwrap();
        let first = trash_entry(&layout, &entry).unwrap();
        fs::create_dir_all(&entry).unwrap();
        let second = trash_entry(&layout, &entry).unwrap();
        assert_ne!(first, second);
        assert!(first.exists());
        assert!(second.exists());
    }

    #[test]
    fn copy_tree_preserves_files_and_links() {
        let (dir, _layout) = setup();
        let src = dir.path().join("src");
        fs::create_dir_all(src.join("bin")).unwrap();
        fs::write(src.join("bin").join("tool"), "x").unwrap();
        #[cfg(unix)]
        std::os::unix::fs::symlink("tool", src.join("bin").join("alias")).unwrap();

        let dst = dir.path().join("dst");
        copy_tree(&src, &dst).unwrap();
        assert_eq!(fs::read_to_string(dst.join("bin").join("tool")).unwrap(), "x");
        #[cfg(unix)]
        assert_eq!(
            fs::read_link(dst.join("bin").join("alias")).unwrap(),
            PathBuf::from("tool")
        );
    }

    #[test]
    fn clean_cache_moves_whole_root() {
        let (_dir, layout) = setup();
        fs::create_dir_all(layout.entry_path("one")).unwrap();
        let dest = clean_cache(&layout).unwrap().unwrap();
        assert!(!layout.cache_root().exists());
        assert!(dest.join("one").is_dir());
        assert!(dest.join(".locks").is_dir());
    }

    #[test]
    fn clean_missing_cache_is_noop() {
        let dir = tempfile::tempdir().unwrap();
        let layout = StoreLayout::new(dir.path().join("cache"), dir.path().join("trash"));
        assert!(clean_cache(&layout).unwrap().is_none());
        assert!(!layout.trash_root().exists());
    }
}

use crate::CoreError;
use fs2::FileExt;
use std::fs::{File, OpenOptions};
use std::path::Path;

/// Exclusive advisory lock on one cache entry's lock file, released on drop.
///
/// Held from before the existence check until creation has finished or the
/// failed entry has been trashed.
pub struct EntryLock {
    lock_file: File,
}

fn open_lock_file(lock_path: &Path) -> Result<File, CoreError> {
    if let Some(parent) = lock_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    Ok(OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(false)
        .open(lock_path)?)
}

impl EntryLock {
    /// Block until the lock is held.
    pub fn acquire(lock_path: &Path) -> Result<Self, CoreError> {
        let file = open_lock_file(lock_path)?;
        file.lock_exclusive().map_err(|source| CoreError::Lock {
            path: lock_path.to_path_buf(),
            source,
        })?;
        Ok(Self { lock_file: file })
    }

    /// `None` if another holder has it.
    pub fn try_acquire(lock_path: &Path) -> Result<Option<Self>, CoreError> {
        let file = open_lock_file(lock_path)?;
        match file.try_lock_exclusive() {
            Ok(()) => Ok(Some(Self { lock_file: file })),
            Err(_) => Ok(None),
        }
    }
}

impl Drop for EntryLock {
    fn drop(&mut self) {
        let _ = self.lock_file.unlock();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn lock_acquire_creates_parent_and_file() {
        let dir = tempfile::tempdir().unwrap();
        let lock_path = dir.path().join(".locks").join("abc.lock");
        let _lock = EntryLock::acquire(&lock_path).unwrap();
        assert!(lock_path.exists());
    }

    #[test]
    fn try_acquire_returns_none_when_held() {
        let dir = tempfile::tempdir().unwrap();
        let lock_path = dir.path().join("abc.lock");

        let _lock = EntryLock::acquire(&lock_path).unwrap();
        assert!(EntryLock::try_acquire(&lock_path).unwrap().is_none());
    }

    #[test]
    fn lock_released_on_drop() {
        let dir = tempfile::tempdir().unwrap();
        let lock_path = dir.path().join("abc.lock");
        {
            let _lock = EntryLock::acquire(&lock_path).unwrap();
        }
        assert!(EntryLock::try_acquire(&lock_path).unwrap().is_some());
    }

    #[test]
    fn different_entries_do_not_contend() {
        let dir = tempfile::tempdir().unwrap();
        let _a = EntryLock::acquire(&dir.path().join("a.lock")).unwrap();
        assert!(EntryLock::try_acquire(&dir.path().join("b.lock"))
            .unwrap()
            .is_some());
    }

    #[test]
    fn waiter_blocks_until_holder_releases() {
        let dir = tempfile::tempdir().unwrap();
        let lock_path = dir.path().join("abc.lock");
        let held = EntryLock::acquire(&lock_path).unwrap();

        let (tx, rx) = mpsc::channel();
        let waiter_path = lock_path.clone();
        let waiter = thread::spawn(move || {
            let _lock = EntryLock::acquire(&waiter_path).unwrap();
            tx.send(()).unwrap();
        });

        assert!(rx.recv_timeout(Duration::from_millis(200)).is_err());
        drop(held);
        rx.recv_timeout(Duration::from_secs(10)).unwrap();
        waiter.join().unwrap();
    }
}

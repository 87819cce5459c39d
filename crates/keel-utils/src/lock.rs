//! File-based locking mechanism for preventing concurrent operations.
//!
//! Each lock is a `<name>.lock` file inside a caller-provided directory, held
//! with `flock`. Two handles on the same name conflict even within a single
//! process, which makes it usable to serialize threads as well.

use std::{
    fs::{File, OpenOptions},
    path::{Path, PathBuf},
};

use crate::{
    error::{LockError, LockResult},
    fs::ensure_dir_exists,
};

/// A file-based lock using `flock`.
///
/// The lock is automatically released when `FileLock` is dropped.
pub struct FileLock {
    _file: nix::fcntl::Flock<File>,
    path: PathBuf,
}

impl FileLock {
    /// Generate a lock file path for a resource name.
    fn lock_path(lock_dir: &Path, name: &str) -> LockResult<PathBuf> {
        ensure_dir_exists(lock_dir).map_err(|err| LockError::AcquireFailed(err.to_string()))?;

        // Sanitize the name to ensure a valid filename
        let sanitize = |s: &str| {
            s.chars()
                .map(|c| {
                    if c.is_alphanumeric() || c == '-' || c == '_' || c == '.' {
                        c
                    } else {
                        '_'
                    }
                })
                .collect::<String>()
        };

        let filename = format!("{}.lock", sanitize(name));
        Ok(lock_dir.join(filename))
    }

    fn open(lock_path: &Path) -> LockResult<File> {
        Ok(OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(false)
            .open(lock_path)?)
    }

    /// Acquire an exclusive lock on `name` inside `lock_dir`.
    ///
    /// This will block until the lock can be acquired.
    pub fn acquire<P: AsRef<Path>>(lock_dir: P, name: &str) -> LockResult<Self> {
        let lock_path = Self::lock_path(lock_dir.as_ref(), name)?;
        let file = Self::open(&lock_path)?;

        let file = nix::fcntl::Flock::lock(file, nix::fcntl::FlockArg::LockExclusive).map_err(
            |(_, err)| LockError::AcquireFailed(format!("{}: {}", lock_path.display(), err)),
        )?;

        Ok(FileLock {
            path: lock_path,
            _file: file,
        })
    }

    /// Try to acquire an exclusive lock without blocking.
    ///
    /// Returns `None` if the lock is already held elsewhere.
    pub fn try_acquire<P: AsRef<Path>>(lock_dir: P, name: &str) -> LockResult<Option<Self>> {
        let lock_path = Self::lock_path(lock_dir.as_ref(), name)?;
        let file = Self::open(&lock_path)?;

        match nix::fcntl::Flock::lock(file, nix::fcntl::FlockArg::LockExclusiveNonblock) {
            Ok(file) => {
                Ok(Some(FileLock {
                    path: lock_path,
                    _file: file,
                }))
            }
            Err((_, err)) => {
                if matches!(err, nix::errno::Errno::EWOULDBLOCK) {
                    return Ok(None);
                }
                Err(LockError::AcquireFailed(format!(
                    "{}: {}",
                    lock_path.display(),
                    err
                )))
            }
        }
    }

    /// Get the path to the lock file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    use std::{thread, time::Duration};

    use tempfile::tempdir;

    use super::*;

    #[test]
    fn test_lock_sanitization() {
        let dir = tempdir().unwrap();
        let path = FileLock::lock_path(dir.path(), "main/repo").unwrap();
        assert!(path.to_string_lossy().ends_with("main_repo.lock"));
    }

    #[test]
    fn test_exclusive_lock() {
        let dir = tempdir().unwrap();
        let lock1 = FileLock::acquire(dir.path(), "repo").unwrap();

        let lock2 = FileLock::try_acquire(dir.path(), "repo").unwrap();
        assert!(lock2.is_none(), "Should not be able to acquire lock");

        drop(lock1);

        let lock3 = FileLock::try_acquire(dir.path(), "repo").unwrap();
        assert!(lock3.is_some(), "Should acquire lock after release");
    }

    #[test]
    fn test_different_names_do_not_conflict() {
        let dir = tempdir().unwrap();
        let lock1 = FileLock::acquire(dir.path(), "repo-a").unwrap();
        let lock2 = FileLock::acquire(dir.path(), "repo-b").unwrap();

        assert!(lock1.path() != lock2.path());
    }

    #[test]
    fn test_lock_blocks_until_released() {
        let dir = tempdir().unwrap();
        let lock_dir = dir.path().to_path_buf();
        let lock1 = FileLock::acquire(&lock_dir, "block").unwrap();
        let path = lock1.path().to_path_buf();

        let handle = thread::spawn(move || {
            let lock2 = FileLock::acquire(&lock_dir, "block").unwrap();
            assert_eq!(lock2.path(), &path);
        });

        thread::sleep(Duration::from_millis(100));
        drop(lock1);

        handle.join().unwrap();
    }
}

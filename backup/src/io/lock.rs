//! Run lock: a marker file whose existence means "a backup run is in progress".
//!
//! Acquisition uses an exclusive create so two invocations racing on the same
//! working directory cannot both succeed. Content is informational only.

use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use chrono::Local;
use tracing::{debug, error, info};

use crate::error::BackupError;

/// Lock file name relative to the working directory.
pub const LOCK_FILE_NAME: &str = "backup.lock";

#[derive(Debug, Clone)]
pub struct RunLock {
    path: PathBuf,
}

impl RunLock {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Lock at the default location inside `workdir`.
    pub fn in_dir(workdir: &Path) -> Self {
        Self::new(workdir.join(LOCK_FILE_NAME))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Non-blocking presence check. Never touches the artifact.
    pub fn exists(&self) -> bool {
        fs::symlink_metadata(&self.path).is_ok()
    }

    /// Create the artifact, failing with `LockAlreadyHeld` if it is present.
    pub fn acquire(&self) -> Result<LockGuard<'_>, BackupError> {
        let mut file = match OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&self.path)
        {
            Ok(file) => file,
            Err(err) if err.kind() == ErrorKind::AlreadyExists => {
                return Err(BackupError::LockAlreadyHeld {
                    path: self.path.clone(),
                });
            }
            Err(source) => {
                return Err(BackupError::LockCreateFailed {
                    path: self.path.clone(),
                    source,
                });
            }
        };

        let stamp = format!(
            "pid={}\nstarted={}\n",
            std::process::id(),
            Local::now().to_rfc3339()
        );
        if let Err(source) = file.write_all(stamp.as_bytes()) {
            drop(file);
            // Best effort: the artifact is ours and must not outlive a failed acquire.
            let _ = fs::remove_file(&self.path);
            return Err(BackupError::LockCreateFailed {
                path: self.path.clone(),
                source,
            });
        }

        info!(path = %self.path.display(), "lock acquired");
        Ok(LockGuard {
            lock: self,
            released: false,
        })
    }

    /// Remove the artifact. Succeeds silently if it is already gone.
    pub fn release(&self) -> Result<(), BackupError> {
        match fs::remove_file(&self.path) {
            Ok(()) => {
                debug!(path = %self.path.display(), "lock file removed");
                Ok(())
            }
            Err(err) if err.kind() == ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "lock file already absent");
                Ok(())
            }
            Err(source) => Err(BackupError::LockReleaseFailed {
                path: self.path.clone(),
                source,
            }),
        }
    }
}

/// Scoped ownership of an acquired [`RunLock`].
///
/// Call [`LockGuard::release`] to observe release failures. A guard dropped
/// without an explicit release (early return, panic unwinding) still removes
/// the artifact and logs any failure.
#[derive(Debug)]
#[must_use = "dropping the guard releases the lock immediately"]
pub struct LockGuard<'a> {
    lock: &'a RunLock,
    released: bool,
}

impl LockGuard<'_> {
    pub fn path(&self) -> &Path {
        self.lock.path()
    }

    pub fn release(mut self) -> Result<(), BackupError> {
        self.released = true;
        self.lock.release()
    }
}

impl Drop for LockGuard<'_> {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        if let Err(err) = self.lock.release() {
            error!(err = %err, "lock file left behind; remove it manually before the next run");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Barrier};
    use std::thread;

    use super::*;

    #[test]
    fn acquire_creates_and_release_removes() {
        let temp = tempfile::tempdir().expect("tempdir");
        let lock = RunLock::in_dir(temp.path());
        assert!(!lock.exists());

        let guard = lock.acquire().expect("acquire");
        assert!(lock.exists());
        assert_eq!(guard.path(), temp.path().join(LOCK_FILE_NAME));

        guard.release().expect("release");
        assert!(!lock.exists());
    }

    #[test]
    fn second_acquire_reports_lock_held_and_leaves_artifact() {
        let temp = tempfile::tempdir().expect("tempdir");
        let lock = RunLock::in_dir(temp.path());
        let _guard = lock.acquire().expect("acquire");

        let other = RunLock::in_dir(temp.path());
        let err = other.acquire().expect_err("already held");
        assert!(matches!(err, BackupError::LockAlreadyHeld { .. }));
        assert!(lock.exists());
    }

    #[test]
    fn release_is_idempotent() {
        let temp = tempfile::tempdir().expect("tempdir");
        let lock = RunLock::in_dir(temp.path());
        lock.release().expect("release absent lock");
        let guard = lock.acquire().expect("acquire");
        lock.release().expect("release");
        guard.release().expect("release again");
    }

    #[test]
    fn dropping_guard_releases() {
        let temp = tempfile::tempdir().expect("tempdir");
        let lock = RunLock::in_dir(temp.path());
        {
            let _guard = lock.acquire().expect("acquire");
            assert!(lock.exists());
        }
        assert!(!lock.exists());
    }

    #[test]
    fn guard_releases_during_unwind() {
        let temp = tempfile::tempdir().expect("tempdir");
        let lock = RunLock::in_dir(temp.path());
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _guard = lock.acquire().expect("acquire");
            panic!("boom");
        }));
        assert!(result.is_err());
        assert!(!lock.exists());
    }

    #[test]
    fn concurrent_acquire_has_exactly_one_winner() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join(LOCK_FILE_NAME);
        let contenders = 8;
        let barrier = Arc::new(Barrier::new(contenders));

        let handles: Vec<_> = (0..contenders)
            .map(|_| {
                let barrier = Arc::clone(&barrier);
                let path = path.clone();
                thread::spawn(move || {
                    let lock = RunLock::new(path);
                    barrier.wait();
                    match lock.acquire() {
                        Ok(guard) => {
                            // Keep the artifact so late contenders still observe it.
                            std::mem::forget(guard);
                            true
                        }
                        Err(BackupError::LockAlreadyHeld { .. }) => false,
                        Err(other) => panic!("unexpected error: {other}"),
                    }
                })
            })
            .collect();

        let winners = handles
            .into_iter()
            .map(|h| h.join().expect("join"))
            .filter(|won| *won)
            .count();
        assert_eq!(winners, 1);
        assert!(path.exists());
    }

    #[test]
    fn missing_parent_dir_is_a_create_failure() {
        let temp = tempfile::tempdir().expect("tempdir");
        let lock = RunLock::new(temp.path().join("missing").join(LOCK_FILE_NAME));
        let err = lock.acquire().expect_err("no parent dir");
        assert!(matches!(err, BackupError::LockCreateFailed { .. }));
    }
}

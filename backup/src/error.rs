//! Typed failures surfaced by the run protocol.
//!
//! Per-item variants are recorded in that item's outcome and never abort
//! sibling jobs. Only the lock variants are fatal at run level.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum BackupError {
    /// Another invocation holds the lock artifact.
    #[error("backup is still running (delete {} if this isn't correct)", path.display())]
    LockAlreadyHeld { path: PathBuf },

    #[error("failed to create lock file {}: {source}", path.display())]
    LockCreateFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A stuck lock blocks every future run, so this is never swallowed.
    #[error("failed to remove lock file {}: {source}", path.display())]
    LockReleaseFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{label} command `{command}` failed: {reason}")]
    HookCommandFailed {
        label: String,
        command: String,
        reason: String,
    },

    #[error("no snapshot state for {item} in {} (run a full backup first)", dir.display())]
    MissingSnapshotState { item: String, dir: PathBuf },

    #[error("archive for {item} failed: {reason}")]
    ArchiveOperationFailed { item: String, reason: String },
}

impl BackupError {
    pub fn archive(item: &str, reason: impl Into<String>) -> Self {
        Self::ArchiveOperationFailed {
            item: item.to_string(),
            reason: reason.into(),
        }
    }

    pub fn hook(label: &str, command: &str, reason: impl Into<String>) -> Self {
        Self::HookCommandFailed {
            label: label.to_string(),
            command: command.to_string(),
            reason: reason.into(),
        }
    }
}

//! Lock polling for external observers (`backup status`).

use crate::exit_codes;
use crate::io::lock::RunLock;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockStatus {
    Running,
    Idle,
}

impl LockStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Idle => "idle",
        }
    }

    pub fn exit_code(self) -> i32 {
        match self {
            Self::Running => exit_codes::LOCKED,
            Self::Idle => exit_codes::OK,
        }
    }
}

/// Report whether a run is in progress. Never creates or removes the lock.
pub fn check_status(lock: &RunLock) -> LockStatus {
    if lock.exists() {
        LockStatus::Running
    } else {
        LockStatus::Idle
    }
}

//! Stable exit codes for backup CLI commands.

/// Every dispatched item succeeded, or `backup status` found no active run.
pub const OK: i32 = 0;
/// Invalid config/usage or any unexpected error.
pub const INVALID: i32 = 1;
/// At least one item failed, or a script-level hook failed.
pub const FAILED: i32 = 2;
/// Another run holds the lock (`run`), or a run is in progress (`status`).
pub const LOCKED: i32 = 3;
/// The lock file could not be removed at the end of a run.
pub const LOCK_STUCK: i32 = 4;

//! Concurrent per-directory tar backups guarded by a lock file.
//!
//! A run archives every enabled item from the config in parallel, one worker
//! per item, while a marker file (`backup.lock`) signals to other processes
//! that a run is active. The architecture keeps a strict separation:
//!
//! - **[`core`]**: Pure, deterministic logic (naming, validation, reporting).
//!   No I/O, fully testable in isolation.
//! - **[`io`]**: Side-effecting operations (lock file, child processes, tar,
//!   config and report files). Trait seams enable scripted doubles in tests.
//!
//! Orchestration modules ([`job`], [`pool`], [`coordinator`], [`status`])
//! coordinate core logic with I/O to implement CLI commands.

pub mod config;
pub mod coordinator;
pub mod core;
pub mod error;
pub mod exit_codes;
pub mod io;
pub mod job;
pub mod logging;
pub mod pool;
pub mod status;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

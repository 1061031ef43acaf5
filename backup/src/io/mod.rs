//! I/O helpers for backup commands.

pub mod archive;
pub mod config_store;
pub mod hooks;
pub mod lock;
pub mod process;
pub mod report;
pub mod snapshot;

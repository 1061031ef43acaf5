//! Backup configuration model (`config.json` / `config.toml`).
//!
//! Field names match the on-disk keys. Loading lives in [`crate::io::config_store`],
//! validation rules in [`crate::core::invariants`].

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BackupConfig {
    pub backup_list: Vec<ItemConfig>,

    /// Runs once before any item is dispatched.
    #[serde(default)]
    pub pre_script_action: Option<String>,

    /// Runs once after every item has finished.
    #[serde(default)]
    pub post_script_action: Option<String>,

    /// Report total wall-clock time of the run.
    #[serde(default)]
    pub show_script_time: bool,

    /// Upper bound for each hook/archive command. Absent means wait indefinitely.
    #[serde(default)]
    pub command_timeout_secs: Option<u64>,
}

impl BackupConfig {
    pub fn command_timeout(&self) -> Option<Duration> {
        self.command_timeout_secs.map(Duration::from_secs)
    }

    pub fn enabled_items(&self) -> impl Iterator<Item = &ItemConfig> {
        self.backup_list.iter().filter(|item| item.enabled)
    }
}

/// One source directory and where its archives go.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ItemConfig {
    pub name: String,
    pub src_path: PathBuf,
    pub dest_path: PathBuf,
    pub enabled: bool,
    #[serde(default)]
    pub pre_action: Option<String>,
    #[serde(default)]
    pub post_action: Option<String>,
    /// Extra `tar` flags, e.g. `"v"` or `"--exclude=*.tmp"`.
    #[serde(default)]
    pub tar_opts: Option<String>,
    #[serde(default)]
    pub show_time_taken: bool,
}

//! Shared types for run outcomes and reporting.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

use crate::exit_codes;

/// Which kind of archive a run produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunMode {
    /// Complete archive plus a fresh snapshot baseline.
    Full,
    /// Changes since the newest snapshot baseline.
    Incremental,
}

impl RunMode {
    pub fn from_full_flag(full: bool) -> Self {
        if full { Self::Full } else { Self::Incremental }
    }
}

impl fmt::Display for RunMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Full => f.write_str("full"),
            Self::Incremental => f.write_str("incremental"),
        }
    }
}

/// Coordinator lifecycle, reported to observers as the run advances.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunPhase {
    Idle,
    LockCheck,
    Aborted,
    Running,
    Draining,
    Released,
    Done,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemStatus {
    Succeeded,
    Failed,
}

/// The ordered phases of a single item job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    PreAction,
    Archive,
    PostAction,
    /// The worker itself could not start or died before reporting.
    Worker,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PreAction => f.write_str("pre_action"),
            Self::Archive => f.write_str("archive"),
            Self::PostAction => f.write_str("post_action"),
            Self::Worker => f.write_str("worker"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseFailure {
    pub phase: Phase,
    pub message: String,
}

/// Terminal result of one item job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemOutcome {
    pub name: String,
    pub status: ItemStatus,
    /// Failures in phase order. Empty iff `status` is `Succeeded`.
    pub failures: Vec<PhaseFailure>,
    pub started_at: DateTime<Local>,
    pub finished_at: DateTime<Local>,
    /// Archive phase duration, recorded only when `show_time_taken` is set.
    pub archive_elapsed: Option<Duration>,
    /// Archive written by a successful archive phase.
    pub archive_path: Option<PathBuf>,
}

impl ItemOutcome {
    pub fn succeeded(&self) -> bool {
        self.status == ItemStatus::Succeeded
    }

    /// Outcome for a worker that never reported back.
    pub fn worker_failure(name: &str, message: impl Into<String>) -> Self {
        let now = Local::now();
        Self {
            name: name.to_string(),
            status: ItemStatus::Failed,
            failures: vec![PhaseFailure {
                phase: Phase::Worker,
                message: message.into(),
            }],
            started_at: now,
            finished_at: now,
            archive_elapsed: None,
            archive_path: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScriptHook {
    PreScriptAction,
    PostScriptAction,
}

impl fmt::Display for ScriptHook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PreScriptAction => f.write_str("pre_script_action"),
            Self::PostScriptAction => f.write_str("post_script_action"),
        }
    }
}

/// Result of a script-level hook that was executed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HookReport {
    pub hook: ScriptHook,
    pub command: String,
    /// `None` when the command exited successfully.
    pub error: Option<String>,
}

impl HookReport {
    pub fn failed(&self) -> bool {
        self.error.is_some()
    }
}

/// Aggregate result of one invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunRecord {
    pub mode: RunMode,
    pub started_at: DateTime<Local>,
    pub finished_at: DateTime<Local>,
    pub elapsed: Duration,
    pub show_script_time: bool,
    pub script_hooks: Vec<HookReport>,
    /// Sorted by item name. Disabled items are absent.
    pub items: Vec<ItemOutcome>,
    /// Set when the lock file could not be removed after the run.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lock_release_error: Option<String>,
}

impl RunRecord {
    pub fn failed_items(&self) -> impl Iterator<Item = &ItemOutcome> {
        self.items.iter().filter(|item| !item.succeeded())
    }

    pub fn failed_hooks(&self) -> impl Iterator<Item = &HookReport> {
        self.script_hooks.iter().filter(|hook| hook.failed())
    }

    pub fn succeeded(&self) -> bool {
        self.failed_items().next().is_none()
            && self.failed_hooks().next().is_none()
            && self.lock_release_error.is_none()
    }

    /// A stuck lock outranks item failures since it blocks every later run.
    pub fn exit_code(&self) -> i32 {
        if self.lock_release_error.is_some() {
            exit_codes::LOCK_STUCK
        } else if self.succeeded() {
            exit_codes::OK
        } else {
            exit_codes::FAILED
        }
    }
}

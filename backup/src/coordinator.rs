//! Orchestration for one backup run.
//!
//! ```text
//! Idle -> LockCheck -> Aborted
//!                   -> Running -> Draining -> Released -> Done
//! ```
//!
//! The lock is held from `Running` until every item job has finished and the
//! post-script hook has run. It is released on every exit path, including
//! panics, through the scoped [`LockGuard`](crate::io::lock::LockGuard).

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use chrono::{Local, NaiveDate};
use tracing::{debug, error, info, warn};

use crate::config::{BackupConfig, ItemConfig};
use crate::core::elapsed::format_elapsed;
use crate::core::types::{HookReport, RunMode, RunPhase, RunRecord, ScriptHook};
use crate::error::BackupError;
use crate::io::archive::Archiver;
use crate::io::hooks::{HookRequest, HookRunner};
use crate::io::lock::RunLock;
use crate::job::JobContext;
use crate::pool::JobPool;

/// Per-invocation inputs decided outside the core.
#[derive(Debug, Clone)]
pub struct RunRequest {
    pub mode: RunMode,
    /// Date stamped into artifact names.
    pub date: NaiveDate,
    /// Base for relative paths and working directory for hooks.
    pub workdir: PathBuf,
}

impl RunRequest {
    pub fn today(mode: RunMode, workdir: impl Into<PathBuf>) -> Self {
        Self {
            mode,
            date: Local::now().date_naive(),
            workdir: workdir.into(),
        }
    }
}

/// Run every enabled item under the lock and return the aggregate record.
///
/// Returns `LockAlreadyHeld` without touching the lock or dispatching any job
/// when another run is active. Item failures, hook failures and a lock that
/// could not be removed afterwards never produce an `Err`; they are recorded in
/// the [`RunRecord`] so the per-item outcomes still reach the caller.
pub fn run_backup<A, H, F>(
    lock: &RunLock,
    config: &BackupConfig,
    request: &RunRequest,
    archiver: Arc<A>,
    hooks: Arc<H>,
    mut on_phase: F,
) -> Result<RunRecord, BackupError>
where
    A: Archiver + 'static,
    H: HookRunner + 'static,
    F: FnMut(RunPhase),
{
    on_phase(RunPhase::Idle);
    on_phase(RunPhase::LockCheck);
    if lock.exists() {
        on_phase(RunPhase::Aborted);
        return Err(BackupError::LockAlreadyHeld {
            path: lock.path().to_path_buf(),
        });
    }
    let guard = match lock.acquire() {
        Ok(guard) => guard,
        Err(err) => {
            if matches!(err, BackupError::LockAlreadyHeld { .. }) {
                on_phase(RunPhase::Aborted);
            }
            return Err(err);
        }
    };

    let started_at = Local::now();
    let start = Instant::now();
    info!(mode = %request.mode, date = %request.date, "backup run started");
    on_phase(RunPhase::Running);

    let mut script_hooks = Vec::new();
    if let Some(command) = config.pre_script_action.as_deref() {
        script_hooks.push(run_script_hook(
            hooks.as_ref(),
            ScriptHook::PreScriptAction,
            command,
            request,
            config,
        ));
    }

    let items = enabled_items(config);
    if items.is_empty() {
        info!("no backup jobs found");
    }
    let ctx = Arc::new(JobContext {
        mode: request.mode,
        date: request.date,
        workdir: request.workdir.clone(),
        timeout: config.command_timeout(),
        archiver,
        hooks: Arc::clone(&hooks),
    });
    let pool = JobPool::dispatch(ctx, items);
    debug!(outstanding = pool.outstanding(), "waiting for jobs");
    on_phase(RunPhase::Draining);
    let outcomes = pool.await_all();

    if let Some(command) = config.post_script_action.as_deref() {
        script_hooks.push(run_script_hook(
            hooks.as_ref(),
            ScriptHook::PostScriptAction,
            command,
            request,
            config,
        ));
    }

    let elapsed = start.elapsed();
    let finished_at = Local::now();
    let lock_release_error = match guard.release() {
        Ok(()) => {
            on_phase(RunPhase::Released);
            None
        }
        Err(err) => {
            error!(err = %err, "lock file was not removed, later runs will refuse to start");
            Some(err.to_string())
        }
    };

    let record = RunRecord {
        mode: request.mode,
        started_at,
        finished_at,
        elapsed,
        show_script_time: config.show_script_time,
        script_hooks,
        items: outcomes,
        lock_release_error,
    };
    if record.show_script_time {
        info!("Backup script took {} to complete", format_elapsed(elapsed));
    }
    info!(
        succeeded = record.succeeded(),
        items = record.items.len(),
        failed = record.failed_items().count(),
        "backup run finished"
    );
    on_phase(RunPhase::Done);
    Ok(record)
}

fn enabled_items(config: &BackupConfig) -> Vec<ItemConfig> {
    config
        .backup_list
        .iter()
        .filter(|item| {
            if !item.enabled {
                warn!(item = %item.name, "not enabled, skipping");
            }
            item.enabled
        })
        .cloned()
        .collect()
}

/// Script hooks are best effort: a failure is reported, never fatal.
fn run_script_hook<H: HookRunner>(
    hooks: &H,
    hook: ScriptHook,
    command: &str,
    request: &RunRequest,
    config: &BackupConfig,
) -> HookReport {
    let label = hook.to_string();
    let result = hooks.run(&HookRequest::new(
        &label,
        command,
        &request.workdir,
        config.command_timeout(),
    ));
    let error = match result {
        Ok(()) => None,
        Err(err) => {
            error!(hook = %label, err = %err, "script hook failed, continuing");
            Some(err.to_string())
        }
    };
    HookReport {
        hook,
        command: command.to_string(),
        error,
    }
}

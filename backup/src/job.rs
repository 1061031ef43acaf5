//! A single item's unit of work: pre_action, archive, post_action.
//!
//! Phase policy:
//! - pre_action failure skips the archive and post_action.
//! - archive failure still runs post_action, which pairs with a pre_action
//!   that succeeded (e.g. restarting a service it stopped).
//! - any failure marks the item failed; it never affects other items.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{Local, NaiveDate};
use tracing::{debug, info, info_span, warn};

use crate::config::ItemConfig;
use crate::core::elapsed::format_elapsed;
use crate::core::types::{ItemOutcome, ItemStatus, Phase, PhaseFailure, RunMode};
use crate::error::BackupError;
use crate::io::archive::{Archiver, prepare_archive};
use crate::io::hooks::{HookRequest, HookRunner};

/// Run-wide inputs shared by every item job.
pub struct JobContext<A, H> {
    pub mode: RunMode,
    /// Date stamped into artifact names.
    pub date: NaiveDate,
    /// Base for relative item paths and hook working directory.
    pub workdir: PathBuf,
    pub timeout: Option<Duration>,
    pub archiver: Arc<A>,
    pub hooks: Arc<H>,
}

impl<A: Archiver, H: HookRunner> JobContext<A, H> {
    fn run_hook(&self, label: &str, command: &str) -> Result<(), BackupError> {
        self.hooks
            .run(&HookRequest::new(label, command, &self.workdir, self.timeout))
    }
}

/// Run every phase for `item` and return its terminal outcome.
pub fn run_item<A: Archiver, H: HookRunner>(
    ctx: &JobContext<A, H>,
    item: &ItemConfig,
) -> ItemOutcome {
    let span = info_span!("item", item = %item.name, mode = %ctx.mode);
    let _enter = span.enter();

    let started_at = Local::now();
    let mut failures = Vec::new();
    let mut archive_elapsed = None;
    let mut archive_path = None;

    let pre_ok = match item.pre_action.as_deref() {
        Some(command) => record(
            &mut failures,
            Phase::PreAction,
            ctx.run_hook("pre_action", command),
        ),
        None => true,
    };

    if pre_ok {
        let start = Instant::now();
        let result = prepare_archive(item, ctx.mode, ctx.date, &ctx.workdir, ctx.timeout)
            .and_then(|request| {
                debug!(
                    archive = %request.archive_path.display(),
                    snapshot = %request.snapshot_path.display(),
                    "archive prepared"
                );
                ctx.archiver.archive(&request)?;
                Ok(request.archive_path)
            });
        let elapsed = start.elapsed();

        match result {
            Ok(path) => archive_path = Some(path),
            Err(err) => failures.push(failure(Phase::Archive, &err)),
        }
        if item.show_time_taken {
            info!("archive took {} to complete", format_elapsed(elapsed));
            archive_elapsed = Some(elapsed);
        }

        if let Some(command) = item.post_action.as_deref() {
            record(
                &mut failures,
                Phase::PostAction,
                ctx.run_hook("post_action", command),
            );
        }
    } else {
        debug!("skipping archive and post_action after pre_action failure");
    }

    let status = if failures.is_empty() {
        info!("item finished");
        ItemStatus::Succeeded
    } else {
        warn!(failures = failures.len(), "item failed");
        ItemStatus::Failed
    };

    ItemOutcome {
        name: item.name.clone(),
        status,
        failures,
        started_at,
        finished_at: Local::now(),
        archive_elapsed,
        archive_path,
    }
}

fn record(
    failures: &mut Vec<PhaseFailure>,
    phase: Phase,
    result: Result<(), BackupError>,
) -> bool {
    match result {
        Ok(()) => true,
        Err(err) => {
            failures.push(failure(phase, &err));
            false
        }
    }
}

fn failure(phase: Phase, err: &BackupError) -> PhaseFailure {
    warn!(%phase, err = %err, "phase failed");
    PhaseFailure {
        phase,
        message: err.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;
    use crate::test_support::{ScriptedArchiver, ScriptedHookRunner, TestWorkspace};

    fn context(
        ws: &TestWorkspace,
        mode: RunMode,
        archiver: &Arc<ScriptedArchiver>,
        hooks: &Arc<ScriptedHookRunner>,
    ) -> JobContext<ScriptedArchiver, ScriptedHookRunner> {
        JobContext {
            mode,
            date: ws.date(),
            workdir: ws.root().to_path_buf(),
            timeout: None,
            archiver: Arc::clone(archiver),
            hooks: Arc::clone(hooks),
        }
    }

    #[test]
    fn phases_run_in_order_and_succeed() {
        let ws = TestWorkspace::new().expect("workspace");
        let mut item = ws.item("docs").expect("item");
        item.pre_action = Some("dump".to_string());
        item.post_action = Some("notify".to_string());
        item.show_time_taken = true;

        let archiver = Arc::new(ScriptedArchiver::new());
        let hooks = Arc::new(ScriptedHookRunner::new());
        let outcome = run_item(&context(&ws, RunMode::Full, &archiver, &hooks), &item);

        assert!(outcome.succeeded(), "{outcome:?}");
        assert!(outcome.archive_elapsed.is_some());
        let archive = outcome.archive_path.expect("archive path");
        assert!(archive.exists());
        assert_eq!(hooks.executed(), vec!["dump", "notify"]);
        assert_eq!(archiver.archived(), vec!["docs"]);
    }

    #[test]
    fn elapsed_is_omitted_unless_requested() {
        let ws = TestWorkspace::new().expect("workspace");
        let item = ws.item("docs").expect("item");
        let archiver = Arc::new(ScriptedArchiver::new());
        let hooks = Arc::new(ScriptedHookRunner::new());

        let outcome = run_item(&context(&ws, RunMode::Full, &archiver, &hooks), &item);
        assert!(outcome.succeeded());
        assert_eq!(outcome.archive_elapsed, None);
    }

    #[test]
    fn pre_action_failure_skips_remaining_phases() {
        let ws = TestWorkspace::new().expect("workspace");
        let mut item = ws.item("docs").expect("item");
        item.pre_action = Some("dump".to_string());
        item.post_action = Some("notify".to_string());

        let archiver = Arc::new(ScriptedArchiver::new());
        let hooks = Arc::new(ScriptedHookRunner::failing(&["dump"]));
        let outcome = run_item(&context(&ws, RunMode::Full, &archiver, &hooks), &item);

        assert_eq!(outcome.status, ItemStatus::Failed);
        assert_eq!(outcome.failures.len(), 1);
        assert_eq!(outcome.failures[0].phase, Phase::PreAction);
        assert!(archiver.archived().is_empty());
        assert_eq!(hooks.executed(), vec!["dump"]);
    }

    #[test]
    fn archive_failure_still_runs_post_action() {
        let ws = TestWorkspace::new().expect("workspace");
        let mut item = ws.item("docs").expect("item");
        item.post_action = Some("restart db".to_string());

        let archiver = Arc::new(ScriptedArchiver::failing(&["docs"]));
        let hooks = Arc::new(ScriptedHookRunner::new());
        let outcome = run_item(&context(&ws, RunMode::Full, &archiver, &hooks), &item);

        assert_eq!(outcome.status, ItemStatus::Failed);
        assert_eq!(outcome.failures[0].phase, Phase::Archive);
        assert_eq!(outcome.archive_path, None);
        assert_eq!(hooks.executed(), vec!["restart db"]);
    }

    #[test]
    fn post_action_failure_fails_item() {
        let ws = TestWorkspace::new().expect("workspace");
        let mut item = ws.item("docs").expect("item");
        item.post_action = Some("notify".to_string());

        let archiver = Arc::new(ScriptedArchiver::new());
        let hooks = Arc::new(ScriptedHookRunner::failing(&["notify"]));
        let outcome = run_item(&context(&ws, RunMode::Full, &archiver, &hooks), &item);

        assert_eq!(outcome.status, ItemStatus::Failed);
        assert_eq!(outcome.failures[0].phase, Phase::PostAction);
        assert!(outcome.archive_path.is_some());
    }

    #[test]
    fn incremental_without_baseline_fails_without_artifacts() {
        let ws = TestWorkspace::new().expect("workspace");
        let item = ws.item("docs").expect("item");
        let archiver = Arc::new(ScriptedArchiver::new());
        let hooks = Arc::new(ScriptedHookRunner::new());

        let outcome = run_item(&context(&ws, RunMode::Incremental, &archiver, &hooks), &item);
        assert_eq!(outcome.status, ItemStatus::Failed);
        assert!(outcome.failures[0].message.contains("no snapshot state"));
        assert!(archiver.archived().is_empty());
        assert!(!ws.item_dir("docs").exists());
    }

    #[test]
    fn incremental_after_full_uses_baseline() {
        let ws = TestWorkspace::new().expect("workspace");
        let item = ws.item("docs").expect("item");
        let archiver = Arc::new(ScriptedArchiver::new());
        let hooks = Arc::new(ScriptedHookRunner::new());

        let full = run_item(&context(&ws, RunMode::Full, &archiver, &hooks), &item);
        assert!(full.succeeded());
        let incr = run_item(&context(&ws, RunMode::Incremental, &archiver, &hooks), &item);
        assert!(incr.succeeded(), "{incr:?}");

        let names: Vec<String> = fs::read_dir(ws.item_dir("docs"))
            .expect("read dir")
            .map(|e| e.expect("entry").file_name().to_string_lossy().into_owned())
            .collect();
        let date = crate::core::naming::format_date(ws.date());
        assert!(names.contains(&format!("full-docs-{date}.tar.gz")));
        assert!(names.contains(&format!("i.docs-{date}.tar.gz")));
        assert!(names.contains(&format!("docs-{date}.snar")));
    }
}

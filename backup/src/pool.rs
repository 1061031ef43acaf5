//! Fan-out of item jobs with a single completion barrier.
//!
//! One OS thread per enabled item; there is no concurrency cap. The set of
//! jobs is fixed at dispatch, and [`JobPool::await_all`] consumes the pool so
//! nothing can be added while draining.

use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};

use tracing::{debug, error};

use crate::config::ItemConfig;
use crate::core::types::ItemOutcome;
use crate::io::archive::Archiver;
use crate::io::hooks::HookRunner;
use crate::job::{JobContext, run_item};

/// Outstanding item jobs for one run.
pub struct JobPool {
    handles: Vec<(String, JoinHandle<()>)>,
    /// Workers append here when they finish; guarded only around the push.
    outcomes: Arc<Mutex<Vec<ItemOutcome>>>,
    /// Items whose worker thread could not be started.
    unstarted: Vec<ItemOutcome>,
}

impl JobPool {
    /// Start one worker per item.
    pub fn dispatch<A, H>(ctx: Arc<JobContext<A, H>>, items: Vec<ItemConfig>) -> Self
    where
        A: Archiver + 'static,
        H: HookRunner + 'static,
    {
        let outcomes = Arc::new(Mutex::new(Vec::with_capacity(items.len())));
        let mut handles = Vec::with_capacity(items.len());
        let mut unstarted = Vec::new();

        for (index, item) in items.into_iter().enumerate() {
            let name = item.name.clone();
            let ctx = Arc::clone(&ctx);
            let sink = Arc::clone(&outcomes);
            let spawned = thread::Builder::new()
                .name(format!("backup-item-{index}"))
                .spawn(move || {
                    let outcome = run_item(&ctx, &item);
                    sink.lock()
                        .unwrap_or_else(PoisonError::into_inner)
                        .push(outcome);
                });
            match spawned {
                Ok(handle) => {
                    debug!(item = %name, "job dispatched");
                    handles.push((name, handle));
                }
                Err(err) => {
                    error!(item = %name, err = %err, "failed to start worker");
                    unstarted.push(ItemOutcome::worker_failure(
                        &name,
                        format!("start worker: {err}"),
                    ));
                }
            }
        }

        Self {
            handles,
            outcomes,
            unstarted,
        }
    }

    /// Jobs dispatched and not yet finished.
    pub fn outstanding(&self) -> usize {
        self.handles
            .iter()
            .filter(|(_, handle)| !handle.is_finished())
            .count()
    }

    /// Block until every job reaches a terminal outcome, then return all
    /// outcomes sorted by item name. No timeout: archives take as long as they take.
    pub fn await_all(self) -> Vec<ItemOutcome> {
        let mut lost = self.unstarted;
        for (name, handle) in self.handles {
            if handle.join().is_err() {
                error!(item = %name, "worker panicked");
                lost.push(ItemOutcome::worker_failure(&name, "worker panicked"));
            }
        }

        let mut outcomes =
            std::mem::take(&mut *self.outcomes.lock().unwrap_or_else(PoisonError::into_inner));
        outcomes.extend(lost);
        outcomes.sort_by(|a, b| a.name.cmp(&b.name));
        debug!(count = outcomes.len(), "all jobs finished");
        outcomes
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::core::types::{ItemStatus, Phase, RunMode};
    use crate::test_support::{ScriptedArchiver, ScriptedHookRunner, TestWorkspace};

    fn context(
        ws: &TestWorkspace,
        archiver: ScriptedArchiver,
    ) -> Arc<JobContext<ScriptedArchiver, ScriptedHookRunner>> {
        Arc::new(JobContext {
            mode: RunMode::Full,
            date: ws.date(),
            workdir: ws.root().to_path_buf(),
            timeout: None,
            archiver: Arc::new(archiver),
            hooks: Arc::new(ScriptedHookRunner::new()),
        })
    }

    #[test]
    fn items_run_concurrently() {
        let ws = TestWorkspace::new().expect("workspace");
        let items = ws.items(&["a", "b", "c"]).expect("items");
        let ctx = context(&ws, ScriptedArchiver::new().with_delay(Duration::from_millis(300)));

        let pool = JobPool::dispatch(Arc::clone(&ctx), items);
        let outcomes = pool.await_all();

        assert_eq!(outcomes.len(), 3);
        assert!(outcomes.iter().all(ItemOutcome::succeeded));
        assert_eq!(ctx.archiver.max_concurrency(), 3);
    }

    #[test]
    fn failure_is_isolated_to_its_item() {
        let ws = TestWorkspace::new().expect("workspace");
        let mut items = ws.items(&["a", "b", "c"]).expect("items");
        items[1].src_path = "does/not/exist".into();
        let ctx = context(&ws, ScriptedArchiver::new());

        let outcomes = JobPool::dispatch(Arc::clone(&ctx), items).await_all();
        let statuses: Vec<(&str, ItemStatus)> = outcomes
            .iter()
            .map(|o| (o.name.as_str(), o.status))
            .collect();
        assert_eq!(
            statuses,
            vec![
                ("a", ItemStatus::Succeeded),
                ("b", ItemStatus::Failed),
                ("c", ItemStatus::Succeeded),
            ]
        );
        let mut archived = ctx.archiver.archived();
        archived.sort();
        assert_eq!(archived, vec!["a", "c"]);
    }

    #[test]
    fn panicking_worker_is_a_failed_outcome() {
        let ws = TestWorkspace::new().expect("workspace");
        let items = ws.items(&["a", "b"]).expect("items");
        let ctx = context(&ws, ScriptedArchiver::panicking(&["a"]));

        let outcomes = JobPool::dispatch(ctx, items).await_all();
        assert_eq!(outcomes.len(), 2);
        assert_eq!(outcomes[0].name, "a");
        assert_eq!(outcomes[0].failures[0].phase, Phase::Worker);
        assert!(outcomes[1].succeeded());
    }

    #[test]
    fn empty_pool_drains_immediately() {
        let ws = TestWorkspace::new().expect("workspace");
        let pool = JobPool::dispatch(context(&ws, ScriptedArchiver::new()), Vec::new());
        assert_eq!(pool.outstanding(), 0);
        assert!(pool.await_all().is_empty());
    }
}

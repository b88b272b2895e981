// src/engine/dispatcher.rs

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use tracing::{debug, error, info, warn};

use crate::engine::core::{plan_batch, BatchPlan};
use crate::engine::latch::PauseLatch;
use crate::engine::queue::{ChangeReceiver, Drained};
use crate::exec::TestRunner;
use crate::types::{DispatchStats, RunOutcome, RunScope};
use crate::watch::{AppIndex, PathFilter};

/// Default coalescing window.
pub const DEFAULT_COALESCE: Duration = Duration::from_millis(1000);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatcherState {
    Running,
    Halted,
}

/// Single consumer of the change queue.
///
/// Each cycle waits for the pause latch, blocks for the first change of a
/// burst, lets the coalescing window elapse, waits for the latch again and
/// then takes everything that arrived in the meantime as one batch. The
/// runner is awaited inside the cycle, so at most one run is in flight and
/// changes made during a run land in the next batch.
pub struct Dispatcher<R: TestRunner> {
    root: PathBuf,
    filter: PathFilter,
    index: AppIndex,
    queue: ChangeReceiver,
    latch: PauseLatch,
    runner: R,
    window: Duration,
    state: DispatcherState,
    stats: DispatchStats,
}

impl<R: TestRunner> fmt::Debug for Dispatcher<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher")
            .field("root", &self.root)
            .field("window", &self.window)
            .field("state", &self.state)
            .field("stats", &self.stats)
            .finish_non_exhaustive()
    }
}

impl<R: TestRunner> Dispatcher<R> {
    pub fn new(
        filter: PathFilter,
        index: AppIndex,
        queue: ChangeReceiver,
        latch: PauseLatch,
        runner: R,
        window: Duration,
    ) -> Self {
        Self {
            root: index.layout().root().to_path_buf(),
            filter,
            index,
            queue,
            latch,
            runner,
            window,
            state: DispatcherState::Running,
            stats: DispatchStats::default(),
        }
    }

    pub fn state(&self) -> DispatcherState {
        self.state
    }

    /// Run until the shutdown sentinel has been drained and acted on.
    pub async fn run(mut self) -> DispatchStats {
        info!("waiting for changes...");

        while self.state == DispatcherState::Running {
            let drained = self.collect_batch().await;
            self.stats.cycles += 1;
            let shutdown = drained.shutdown;

            self.dispatch(drained.changes).await;

            if shutdown {
                // The sentinel itself.
                self.queue.mark_consumed(1);
                self.state = DispatcherState::Halted;
            }
        }

        info!(
            runs = self.stats.runs,
            failed = self.stats.failed_runs,
            ignored = self.stats.ignored,
            "dispatcher halted"
        );
        self.stats
    }

    /// Gather one coalesced batch.
    async fn collect_batch(&mut self) -> Drained {
        self.latch.wait_open().await;
        let mut drained = self.queue.drain_available().await;

        if !drained.shutdown {
            debug!(
                first = drained.changes.len(),
                window = ?self.window,
                "change burst started; coalescing"
            );
            tokio::time::sleep(self.window).await;
            self.latch.wait_open().await;
            drained.extend(self.queue.try_drain());
        }

        drained
    }

    async fn dispatch(&mut self, changes: Vec<PathBuf>) {
        let plan = plan_batch(changes, &self.filter, &self.index);
        self.stats.ignored += plan.ignored;
        self.queue.mark_consumed(plan.ignored);

        let Some(scope) = plan.scope.clone() else {
            if plan.ignored > 0 {
                debug!(ignored = plan.ignored, "batch contained only ignored paths");
            }
            return;
        };

        log_changes(&plan);
        self.invoke(&scope).await;

        self.stats.dispatched += plan.included.len();
        self.queue.mark_consumed(plan.included.len());
        info!("waiting for changes...");
    }

    async fn invoke(&mut self, scope: &RunScope) {
        self.stats.runs += 1;
        let result = match scope {
            RunScope::All => {
                info!("running tests for all apps");
                self.runner.run_all(&self.root).await
            }
            RunScope::Subset(apps) => {
                info!(apps = %scope, "running tests for changed apps");
                self.runner.run_subset(&self.root, apps).await
            }
        };

        match result {
            Ok(RunOutcome::Passed) => info!(scope = %scope, "test run passed"),
            Ok(RunOutcome::Failed(code)) => {
                self.stats.failed_runs += 1;
                warn!(scope = %scope, exit_code = code, "test run failed");
            }
            Err(err) => {
                self.stats.runner_errors += 1;
                error!(scope = %scope, error = %err, "could not run tests");
            }
        }
    }
}

fn log_changes(plan: &BatchPlan) {
    let paths: Vec<String> = plan
        .distinct_paths()
        .iter()
        .map(|p| p.display().to_string())
        .collect();
    info!("changes detected in: {}", paths.join(", "));
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;
    use std::path::Path;
    use std::sync::{Arc, Mutex};

    use crate::engine::queue::change_queue;
    use crate::errors::{Result, TdaemonError};
    use crate::exec::RunFuture;
    use crate::types::AppName;
    use crate::watch::{IgnoreRules, ProjectLayout};

    #[derive(Clone, Default)]
    struct Recorder {
        calls: Arc<Mutex<Vec<RunScope>>>,
        fail_with: Option<i32>,
        error: bool,
    }

    impl Recorder {
        fn record(&self, scope: RunScope) -> Result<RunOutcome> {
            self.calls.lock().unwrap().push(scope);
            if self.error {
                return Err(TdaemonError::ConfigError("boom".into()));
            }
            Ok(match self.fail_with {
                Some(code) => RunOutcome::Failed(code),
                None => RunOutcome::Passed,
            })
        }
    }

    impl TestRunner for Recorder {
        fn run_all<'a>(&'a mut self, _root: &'a Path) -> RunFuture<'a> {
            Box::pin(async move { self.record(RunScope::All) })
        }

        fn run_subset<'a>(&'a mut self, _root: &'a Path, apps: &'a BTreeSet<AppName>) -> RunFuture<'a> {
            Box::pin(async move { self.record(RunScope::Subset(apps.clone())) })
        }
    }

    fn dispatcher(runner: Recorder) -> (crate::engine::queue::ChangeSender, Dispatcher<Recorder>) {
        let layout = ProjectLayout::new("/proj", ["app1", "app2"]).unwrap();
        let filter = PathFilter::new("/proj", &IgnoreRules::default()).unwrap();
        let (tx, rx) = change_queue();
        let d = Dispatcher::new(
            filter,
            AppIndex::new(layout),
            rx,
            PauseLatch::new(),
            runner,
            DEFAULT_COALESCE,
        );
        (tx, d)
    }

    #[tokio::test(start_paused = true)]
    async fn halts_on_sentinel_after_processing_preceding_changes() {
        let runner = Recorder::default();
        let calls = Arc::clone(&runner.calls);
        let (tx, d) = dispatcher(runner);
        assert_eq!(d.state(), DispatcherState::Running);

        tx.push_change("/proj/app1/models.py").unwrap();
        tx.push_change("/proj/app1/models.pyc").unwrap();
        tx.shutdown().unwrap();

        let stats = d.run().await;
        assert_eq!(
            *calls.lock().unwrap(),
            vec![RunScope::Subset(["app1".to_string()].into_iter().collect())]
        );
        assert_eq!(stats.runs, 1);
        assert_eq!(stats.ignored, 1);
        assert_eq!(stats.dispatched, 1);
        assert_eq!(tx.unfinished(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn runner_failures_and_errors_are_counted_not_fatal() {
        let runner = Recorder {
            fail_with: Some(1),
            ..Recorder::default()
        };
        let (tx, d) = dispatcher(runner);
        let worker = tokio::spawn(d.run());

        tx.push_change("/proj/settings.py").unwrap();
        tokio::time::sleep(Duration::from_secs(3)).await;
        tx.push_change("/proj/app2/views.py").unwrap();
        tx.shutdown().unwrap();

        let stats = worker.await.unwrap();
        assert_eq!(stats.runs, 2);
        assert_eq!(stats.failed_runs, 2);

        let erroring = Recorder {
            error: true,
            ..Recorder::default()
        };
        let (tx, d) = dispatcher(erroring);
        tx.push_change("/proj/app1/x.py").unwrap();
        tx.shutdown().unwrap();
        let stats = d.run().await;
        assert_eq!(stats.runner_errors, 1);
        assert_eq!(tx.unfinished(), 0);
    }
}

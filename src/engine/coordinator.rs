// src/engine/coordinator.rs

use std::fmt;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::engine::dispatcher::{Dispatcher, DEFAULT_COALESCE};
use crate::engine::latch::PauseLatch;
use crate::engine::queue::{change_queue, ChangeSender};
use crate::errors::{Result, TdaemonError};
use crate::exec::TestRunner;
use crate::types::DispatchStats;
use crate::watch::{AppIndex, EventSource, IgnoreRules, PathFilter, ProjectLayout};

/// Tunables for a [`Coordinator`].
#[derive(Debug, Clone)]
pub struct WatchSettings {
    pub ignore: IgnoreRules,
    pub coalesce: Duration,
}

impl Default for WatchSettings {
    fn default() -> Self {
        Self {
            ignore: IgnoreRules::default(),
            coalesce: DEFAULT_COALESCE,
        }
    }
}

/// Live pieces that only exist between `start` and `stop`.
struct Active {
    queue: ChangeSender,
    worker: JoinHandle<DispatchStats>,
}

/// Owns the event source, the change queue and the dispatcher as one unit.
///
/// `start` wires source → queue → dispatcher; `stop` shuts the source down,
/// queues the sentinel and waits until the dispatcher has acted on every
/// change that preceded it.
pub struct Coordinator<R, S>
where
    R: TestRunner + 'static,
    S: EventSource,
{
    index: AppIndex,
    filter: PathFilter,
    coalesce: Duration,
    runner: Option<R>,
    source: S,
    latch: PauseLatch,
    active: Option<Active>,
}

impl<R, S> fmt::Debug for Coordinator<R, S>
where
    R: TestRunner + 'static,
    S: EventSource,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Coordinator")
            .field("root", &self.index.layout().root())
            .field("coalesce", &self.coalesce)
            .field("paused", &self.latch.is_paused())
            .field("started", &self.active.is_some())
            .finish_non_exhaustive()
    }
}

impl<R, S> Coordinator<R, S>
where
    R: TestRunner + 'static,
    S: EventSource,
{
    /// Build a coordinator. Fails only if the ignore rules do not compile.
    pub fn new(layout: ProjectLayout, settings: WatchSettings, runner: R, source: S) -> Result<Self> {
        let filter = PathFilter::new(layout.root(), &settings.ignore)?;
        Ok(Self {
            index: AppIndex::new(layout),
            filter,
            coalesce: settings.coalesce,
            runner: Some(runner),
            source,
            latch: PauseLatch::new(),
            active: None,
        })
    }

    pub fn layout(&self) -> &ProjectLayout {
        self.index.layout()
    }

    pub fn is_started(&self) -> bool {
        self.active.is_some()
    }

    /// Start watching. Must be called from within a Tokio runtime.
    ///
    /// The source is started before the dispatcher is spawned, so a watch
    /// failure leaves the coordinator exactly as it was.
    pub fn start(&mut self) -> Result<()> {
        if self.active.is_some() || self.runner.is_none() {
            return Err(TdaemonError::AlreadyStarted);
        }

        let (tx, rx) = change_queue();
        let root = self.index.layout().root().to_path_buf();
        self.source.start(&root, tx.clone())?;

        let runner = self.runner.take().ok_or(TdaemonError::AlreadyStarted)?;
        let dispatcher = Dispatcher::new(
            self.filter.clone(),
            self.index.clone(),
            rx,
            self.latch.clone(),
            runner,
            self.coalesce,
        );
        let worker = tokio::spawn(dispatcher.run());

        info!(
            root = ?root,
            apps = ?self.index.layout().app_names().collect::<Vec<_>>(),
            "watching for changes"
        );
        self.active = Some(Active { queue: tx, worker });
        Ok(())
    }

    pub fn pause(&self) {
        self.latch.pause();
    }

    pub fn resume(&self) {
        self.latch.resume();
    }

    /// Flip between paused and running; returns `true` if now paused.
    pub fn toggle_pause(&self) -> bool {
        self.latch.toggle()
    }

    pub fn is_paused(&self) -> bool {
        self.latch.is_paused()
    }

    /// Handle for pausing from another task.
    pub fn pause_handle(&self) -> PauseLatch {
        self.latch.clone()
    }

    /// Stop watching and wait for the dispatcher to halt.
    ///
    /// Every change queued before this call is classified and dispatched
    /// first; a run already in progress is waited for. A paused coordinator
    /// is resumed so the sentinel can be reached. Returns empty stats if the
    /// coordinator was never started.
    pub async fn stop(&mut self) -> Result<DispatchStats> {
        let Some(active) = self.active.take() else {
            debug!("stop called on a coordinator that is not running");
            return Ok(DispatchStats::default());
        };

        self.source.stop();
        self.latch.resume();

        // The queue can only be closed already if the dispatcher died.
        if let Err(err) = active.queue.shutdown() {
            debug!(error = %err, "could not queue shutdown sentinel");
        }
        active.queue.join().await;

        let stats = active
            .worker
            .await
            .map_err(|e| TdaemonError::WorkerFailed(e.to_string()))?;
        info!(runs = stats.runs, "watcher stopped");
        Ok(stats)
    }
}

use std::collections::{BTreeSet, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tdaemon::errors::TdaemonError;
use tdaemon::exec::{RunFuture, TestRunner};
use tdaemon::types::{AppName, RunOutcome};

/// One invocation seen by a [`FakeRunner`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunCall {
    All(PathBuf),
    Subset(PathBuf, Vec<String>),
}

impl RunCall {
    /// App names of a scoped run; `None` for a full run.
    pub fn apps(&self) -> Option<&[String]> {
        match self {
            RunCall::All(_) => None,
            RunCall::Subset(_, apps) => Some(apps),
        }
    }
}

#[derive(Debug)]
enum Scripted {
    Outcome(RunOutcome),
    Error(String),
    Panic(String),
}

#[derive(Debug, Default)]
struct Shared {
    calls: Vec<RunCall>,
    in_flight: usize,
    max_in_flight: usize,
    script: VecDeque<Scripted>,
}

fn lock(shared: &Mutex<Shared>) -> MutexGuard<'_, Shared> {
    shared.lock().unwrap()
}

/// A fake test runner that:
/// - records every requested scope
/// - optionally sleeps (on the Tokio clock) to simulate a slow suite
/// - returns scripted outcomes, defaulting to `Passed`.
#[derive(Debug)]
pub struct FakeRunner {
    shared: Arc<Mutex<Shared>>,
    delay: Option<Duration>,
}

/// Inspection handle for a [`FakeRunner`] that has been moved elsewhere.
#[derive(Debug, Clone)]
pub struct RunLog {
    shared: Arc<Mutex<Shared>>,
}

impl FakeRunner {
    pub fn new() -> (Self, RunLog) {
        let shared = Arc::new(Mutex::new(Shared::default()));
        (
            Self {
                shared: Arc::clone(&shared),
                delay: None,
            },
            RunLog { shared },
        )
    }

    /// Make every run take `delay` before completing.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    fn record(&mut self, call: RunCall) -> RunFuture<'static> {
        let shared = Arc::clone(&self.shared);
        let delay = self.delay;

        Box::pin(async move {
            {
                let mut guard = lock(&shared);
                guard.calls.push(call);
                guard.in_flight += 1;
                guard.max_in_flight = guard.max_in_flight.max(guard.in_flight);
            }

            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }

            let next = {
                let mut guard = lock(&shared);
                guard.in_flight -= 1;
                guard.script.pop_front()
            };
            match next {
                None => Ok(RunOutcome::Passed),
                Some(Scripted::Outcome(outcome)) => Ok(outcome),
                Some(Scripted::Error(msg)) => Err(TdaemonError::Other(anyhow::anyhow!(msg))),
                // Lock already released, so the log stays readable.
                Some(Scripted::Panic(msg)) => panic!("{msg}"),
            }
        })
    }
}

impl TestRunner for FakeRunner {
    fn run_all<'a>(&'a mut self, root: &'a Path) -> RunFuture<'a> {
        self.record(RunCall::All(root.to_path_buf()))
    }

    fn run_subset<'a>(&'a mut self, root: &'a Path, apps: &'a BTreeSet<AppName>) -> RunFuture<'a> {
        self.record(RunCall::Subset(
            root.to_path_buf(),
            apps.iter().cloned().collect(),
        ))
    }
}

impl RunLog {
    pub fn calls(&self) -> Vec<RunCall> {
        lock(&self.shared).calls.clone()
    }

    pub fn call_count(&self) -> usize {
        lock(&self.shared).calls.len()
    }

    pub fn in_flight(&self) -> usize {
        lock(&self.shared).in_flight
    }

    /// Highest number of runs observed executing at the same time.
    pub fn max_in_flight(&self) -> usize {
        lock(&self.shared).max_in_flight
    }

    /// Queue the outcome of the next unscripted run.
    pub fn push_outcome(&self, outcome: RunOutcome) {
        lock(&self.shared).script.push_back(Scripted::Outcome(outcome));
    }

    /// Make the next unscripted run fail to execute at all.
    pub fn push_error(&self, msg: &str) {
        lock(&self.shared)
            .script
            .push_back(Scripted::Error(msg.to_string()));
    }

    /// Make the next unscripted run panic, taking the dispatcher down with it.
    pub fn push_panic(&self, msg: &str) {
        lock(&self.shared)
            .script
            .push_back(Scripted::Panic(msg.to_string()));
    }

    /// Poll until at least `n` runs have started.
    pub async fn wait_for_calls(&self, n: usize) {
        while self.call_count() < n {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }
}

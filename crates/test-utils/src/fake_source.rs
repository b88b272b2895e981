use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use tdaemon::engine::ChangeSender;
use tdaemon::errors::{Result, TdaemonError};
use tdaemon::watch::EventSource;

#[derive(Debug, Default)]
struct SourceState {
    sink: Mutex<Option<ChangeSender>>,
    root: Mutex<Option<PathBuf>>,
    starts: AtomicUsize,
    stops: AtomicUsize,
}

/// An event source driven by hand from the test body.
#[derive(Debug)]
pub struct FakeSource {
    state: Arc<SourceState>,
    fail_on_start: bool,
}

/// Test-side handle for emitting notifications into a [`FakeSource`].
#[derive(Debug, Clone)]
pub struct SourceHandle {
    state: Arc<SourceState>,
}

impl FakeSource {
    pub fn new() -> (Self, SourceHandle) {
        let state = Arc::new(SourceState::default());
        (
            Self {
                state: Arc::clone(&state),
                fail_on_start: false,
            },
            SourceHandle { state },
        )
    }

    /// Make `start` fail, as a watcher on a vanished directory would.
    pub fn failing() -> (Self, SourceHandle) {
        let (mut source, handle) = Self::new();
        source.fail_on_start = true;
        (source, handle)
    }
}

impl EventSource for FakeSource {
    fn start(&mut self, root: &Path, sink: ChangeSender) -> Result<()> {
        if self.fail_on_start {
            return Err(TdaemonError::Other(anyhow::anyhow!(
                "fake source refused to watch {}",
                root.display()
            )));
        }
        self.state.starts.fetch_add(1, Ordering::SeqCst);
        *self.state.root.lock().unwrap() = Some(root.to_path_buf());
        *self.state.sink.lock().unwrap() = Some(sink);
        Ok(())
    }

    fn stop(&mut self) {
        if self.state.sink.lock().unwrap().take().is_some() {
            self.state.stops.fetch_add(1, Ordering::SeqCst);
        }
    }
}

impl SourceHandle {
    /// Report `path` as changed. Returns `false` if the source is not running
    /// or the queue rejected it.
    pub fn emit(&self, path: impl Into<PathBuf>) -> bool {
        match self.state.sink.lock().unwrap().as_ref() {
            Some(sink) => sink.push_change(path).is_ok(),
            None => false,
        }
    }

    /// Report several paths, in order.
    pub fn emit_all<I, P>(&self, paths: I)
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        for path in paths {
            self.emit(path);
        }
    }

    pub fn is_active(&self) -> bool {
        self.state.sink.lock().unwrap().is_some()
    }

    pub fn watched_root(&self) -> Option<PathBuf> {
        self.state.root.lock().unwrap().clone()
    }

    pub fn starts(&self) -> usize {
        self.state.starts.load(Ordering::SeqCst)
    }

    pub fn stops(&self) -> usize {
        self.state.stops.load(Ordering::SeqCst)
    }
}

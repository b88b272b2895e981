// src/watch/source.rs

//! Event sources feeding the change queue.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use notify::event::{CreateKind, ModifyKind, RemoveKind, RenameMode};
use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tracing::{debug, info, trace, warn};

use crate::engine::queue::ChangeSender;
use crate::errors::Result;
use crate::fs::{FileSystem, RealFileSystem};
use crate::watch::path_utils::rebase;

/// Producer of changed paths for a watched tree.
///
/// Implementations push every changed file path into `sink`, one entry per
/// path; for renames both the old and the new path are pushed.
pub trait EventSource: Send {
    /// Begin watching `root` recursively.
    fn start(&mut self, root: &Path, sink: ChangeSender) -> Result<()>;

    /// Stop producing notifications. Idempotent.
    fn stop(&mut self);
}

/// [`EventSource`] backed by `notify`'s recommended platform watcher.
pub struct NotifySource {
    fs: Arc<dyn FileSystem>,
    watcher: Option<RecommendedWatcher>,
}

impl std::fmt::Debug for NotifySource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotifySource")
            .field("active", &self.watcher.is_some())
            .finish()
    }
}

impl Default for NotifySource {
    fn default() -> Self {
        Self::new()
    }
}

impl NotifySource {
    pub fn new() -> Self {
        Self::with_fs(Arc::new(RealFileSystem))
    }

    pub fn with_fs(fs: Arc<dyn FileSystem>) -> Self {
        Self { fs, watcher: None }
    }
}

impl EventSource for NotifySource {
    fn start(&mut self, root: &Path, sink: ChangeSender) -> Result<()> {
        let fs = Arc::clone(&self.fs);
        let mut renames = RenamePairing::default();

        // Called synchronously on notify's own thread.
        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) => {
                    trace!(?event, "received notify event");
                    for path in renames.paths(fs.as_ref(), &event) {
                        if sink.push_change(path).is_err() {
                            trace!("change queue closed; dropping notification");
                            break;
                        }
                    }
                }
                Err(err) => warn!("file watch error: {err}"),
            },
            Config::default(),
        )?;

        watcher.watch(root, RecursiveMode::Recursive)?;
        info!("file watcher started on {:?}", root);

        self.watcher = Some(watcher);
        Ok(())
    }

    fn stop(&mut self) {
        if self.watcher.take().is_some() {
            debug!("file watcher stopped");
        }
    }
}

/// Reports each rename once on backends that split it into halves.
///
/// inotify sends a `From` half and a `To` half sharing a tracker, then a
/// `Both` event for the pair. A tracked `From` path no longer exists, so a
/// renamed directory cannot be told apart from a file; it is dropped and the
/// `Both` event supplies the pair. A tracked `To` that completes the latest
/// `From` is dropped for the same reason. An unpaired `To` was moved in from
/// outside the root and is reported.
#[derive(Debug, Default)]
pub struct RenamePairing {
    pending_from: Option<usize>,
}

impl RenamePairing {
    /// Like [`notification_paths`], minus the duplicate rename halves.
    pub fn paths(&mut self, fs: &dyn FileSystem, event: &Event) -> Vec<PathBuf> {
        match (event.kind, event.tracker()) {
            (EventKind::Modify(ModifyKind::Name(RenameMode::From)), Some(tracker)) => {
                self.pending_from = Some(tracker);
                Vec::new()
            }
            (EventKind::Modify(ModifyKind::Name(RenameMode::To)), Some(tracker))
                if self.pending_from == Some(tracker) =>
            {
                self.pending_from = None;
                Vec::new()
            }
            _ => notification_paths(fs, event),
        }
    }
}

/// Translate one `notify` event into the file paths to enqueue.
///
/// - Access events carry no change and are dropped.
/// - Directory events are dropped; only files matter.
/// - A rename yields both paths. When a whole directory was renamed, each
///   file inside yields its old and its new location.
pub fn notification_paths(fs: &dyn FileSystem, event: &Event) -> Vec<PathBuf> {
    match event.kind {
        EventKind::Access(_) => Vec::new(),
        EventKind::Create(CreateKind::Folder) | EventKind::Remove(RemoveKind::Folder) => Vec::new(),
        EventKind::Modify(ModifyKind::Name(RenameMode::Both)) if event.paths.len() == 2 => {
            let (from, to) = (&event.paths[0], &event.paths[1]);
            if fs.is_dir(to) {
                expand_dir_rename(fs, from, to)
            } else {
                vec![from.clone(), to.clone()]
            }
        }
        EventKind::Modify(ModifyKind::Name(RenameMode::To)) => {
            let mut out = Vec::new();
            for path in &event.paths {
                if fs.is_dir(path) {
                    out.extend(fs.walk_files(path).unwrap_or_default());
                } else {
                    out.push(path.clone());
                }
            }
            out
        }
        _ => event
            .paths
            .iter()
            .filter(|path| !fs.is_dir(path))
            .cloned()
            .collect(),
    }
}

fn expand_dir_rename(fs: &dyn FileSystem, from: &Path, to: &Path) -> Vec<PathBuf> {
    let files = match fs.walk_files(to) {
        Ok(files) => files,
        Err(err) => {
            debug!(?to, error = %err, "renamed directory vanished before it could be listed");
            return Vec::new();
        }
    };

    let mut out = Vec::with_capacity(files.len() * 2);
    for file in files {
        if let Some(old) = rebase(&file, to, from) {
            out.push(old);
        }
        out.push(file);
    }
    out
}

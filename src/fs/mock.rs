// src/fs/mock.rs

use super::FileSystem;
use anyhow::{anyhow, Result};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockEntry {
    File,
    Dir,
}

/// In-memory tree of files and directories.
///
/// Adding a file implicitly creates every ancestor directory. Paths are used
/// verbatim, so tests should stick to absolute paths.
#[derive(Debug, Clone, Default)]
pub struct MockFileSystem {
    entries: Arc<Mutex<BTreeMap<PathBuf, MockEntry>>>,
}

impl MockFileSystem {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_file(&self, path: impl AsRef<Path>) {
        let path = path.as_ref();
        let mut entries = self.lock();
        if let Some(parent) = path.parent() {
            Self::insert_dirs(&mut entries, parent);
        }
        entries.insert(path.to_path_buf(), MockEntry::File);
    }

    pub fn add_dir(&self, path: impl AsRef<Path>) {
        let mut entries = self.lock();
        Self::insert_dirs(&mut entries, path.as_ref());
    }

    fn insert_dirs(entries: &mut BTreeMap<PathBuf, MockEntry>, dir: &Path) {
        for ancestor in dir.ancestors() {
            if ancestor.as_os_str().is_empty() {
                break;
            }
            entries.entry(ancestor.to_path_buf()).or_insert(MockEntry::Dir);
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BTreeMap<PathBuf, MockEntry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl FileSystem for MockFileSystem {
    fn is_dir(&self, path: &Path) -> bool {
        matches!(self.lock().get(path), Some(MockEntry::Dir))
    }

    fn canonicalize(&self, path: &Path) -> Result<PathBuf> {
        if self.lock().contains_key(path) {
            Ok(path.to_path_buf())
        } else {
            Err(anyhow!("No such file or directory: {:?}", path))
        }
    }

    fn walk_files(&self, dir: &Path) -> Result<Vec<PathBuf>> {
        let entries = self.lock();
        match entries.get(dir) {
            // BTreeMap keys are already sorted.
            Some(MockEntry::Dir) => Ok(entries
                .iter()
                .filter(|(path, entry)| **entry == MockEntry::File && path.starts_with(dir))
                .map(|(path, _)| path.clone())
                .collect()),
            _ => Err(anyhow!("Not a directory or not found: {:?}", dir)),
        }
    }
}

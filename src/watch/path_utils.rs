// src/watch/path_utils.rs

//! Utility functions for path handling in the watcher.

use std::path::{Path, PathBuf};

/// Convert a path into a string relative to `root`, with forward slashes.
///
/// Returns `None` if the path is not below `root`.
pub fn relative_str(root: &Path, path: &Path) -> Option<String> {
    path.strip_prefix(root)
        .ok()
        .map(|rel| rel.to_string_lossy().replace('\\', "/"))
}

/// Re-home `path` from one directory to another.
///
/// Used when a directory is renamed: the watcher only sees the directory,
/// but each file inside it moved as well.
pub fn rebase(path: &Path, from: &Path, to: &Path) -> Option<PathBuf> {
    path.strip_prefix(from).ok().map(|rel| to.join(rel))
}

// src/fs/mod.rs

use std::fmt::Debug;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use walkdir::WalkDir;

pub mod mock;

/// Abstract filesystem interface.
///
/// Only the read-side queries the watcher needs: resolving the project
/// layout and expanding directory renames into the files they carried.
pub trait FileSystem: Send + Sync + Debug {
    fn is_dir(&self, path: &Path) -> bool;
    fn canonicalize(&self, path: &Path) -> Result<PathBuf>;

    /// Every file below `dir`, sorted. Symlinked directories are not
    /// descended into. Fails only if `dir` itself cannot be read.
    fn walk_files(&self, dir: &Path) -> Result<Vec<PathBuf>>;
}

/// Implementation that uses `std::fs` and `walkdir`.
#[derive(Debug, Clone, Default)]
pub struct RealFileSystem;

impl FileSystem for RealFileSystem {
    fn is_dir(&self, path: &Path) -> bool {
        path.is_dir()
    }

    fn canonicalize(&self, path: &Path) -> Result<PathBuf> {
        fs::canonicalize(path).with_context(|| format!("canonicalizing {:?}", path))
    }

    fn walk_files(&self, dir: &Path) -> Result<Vec<PathBuf>> {
        let mut files = Vec::new();

        for entry in WalkDir::new(dir).follow_links(false) {
            let entry = match entry {
                Ok(entry) => entry,
                // Entries that vanish mid-walk are skipped; a rename burst
                // often races with further edits.
                Err(err) if err.depth() > 0 => continue,
                Err(err) => {
                    return Err(err).with_context(|| format!("walking {:?}", dir));
                }
            };

            let file_type = entry.file_type();
            if file_type.is_dir() || (file_type.is_symlink() && entry.path().is_dir()) {
                continue;
            }
            files.push(entry.into_path());
        }

        files.sort();
        Ok(files)
    }
}

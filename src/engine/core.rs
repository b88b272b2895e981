// src/engine/core.rs

//! Pure batch decision logic.
//!
//! Given the raw paths drained in one cycle, decide which survive the
//! inclusion filter and what scope of test run they call for. No channels,
//! no timers, no processes: the dispatcher is the IO shell around this.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use tracing::trace;

use crate::types::RunScope;
use crate::watch::{AppIndex, PathFilter};

/// Outcome of filtering and classifying one drained batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchPlan {
    /// Included paths, in arrival order (duplicates kept).
    pub included: Vec<PathBuf>,
    /// Number of paths dropped by the filter.
    pub ignored: usize,
    /// `None` when nothing survived the filter.
    pub scope: Option<RunScope>,
}

impl BatchPlan {
    /// Included paths with repeats removed, first occurrence first.
    pub fn distinct_paths(&self) -> Vec<&Path> {
        let mut seen = HashSet::new();
        self.included
            .iter()
            .map(PathBuf::as_path)
            .filter(|p| seen.insert(*p))
            .collect()
    }
}

/// Filter `changes` and decide the run scope for what is left.
pub fn plan_batch(changes: Vec<PathBuf>, filter: &PathFilter, index: &AppIndex) -> BatchPlan {
    let total = changes.len();
    let included: Vec<PathBuf> = changes
        .into_iter()
        .filter(|path| match filter.exclusion(path) {
            Some(reason) => {
                trace!(?path, %reason, "ignoring change");
                false
            }
            None => true,
        })
        .collect();
    let ignored = total - included.len();

    let scope = if included.is_empty() {
        None
    } else {
        Some(index.scope_for(included.iter().map(PathBuf::as_path)))
    };

    BatchPlan {
        included,
        ignored,
        scope,
    }
}

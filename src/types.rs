// src/types.rs

use std::collections::BTreeSet;
use std::fmt;

/// Canonical app (sub-project) name type.
pub type AppName = String;

/// Breadth of a single test invocation.
///
/// `Subset` keeps names sorted and deduplicated, so an app that appears many
/// times in a batch is still only tested once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunScope {
    All,
    Subset(BTreeSet<AppName>),
}

impl RunScope {
    pub fn is_all(&self) -> bool {
        matches!(self, RunScope::All)
    }
}

impl fmt::Display for RunScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunScope::All => write!(f, "all apps"),
            RunScope::Subset(names) => {
                let joined: Vec<&str> = names.iter().map(String::as_str).collect();
                write!(f, "{}", joined.join(", "))
            }
        }
    }
}

/// Exit outcome of a test run. Only logged and counted; never interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    Passed,
    Failed(i32),
}

/// Counters reported by the dispatcher once it halts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchStats {
    /// Drain cycles that observed at least one queue item.
    pub cycles: usize,
    /// Runner invocations (successful or not).
    pub runs: usize,
    /// Runs that reported a non-zero exit.
    pub failed_runs: usize,
    /// Runs whose invocation itself errored (spawn failure, IO error).
    pub runner_errors: usize,
    /// Paths dropped by the inclusion filter.
    pub ignored: usize,
    /// Paths that took part in a run decision.
    pub dispatched: usize,
}

// src/exec/backend.rs

//! Pluggable test runner abstraction.
//!
//! The dispatcher talks to a `TestRunner` instead of spawning processes
//! itself. Production code uses [`CommandRunner`](super::CommandRunner);
//! tests provide a fake that records which scopes were requested.

use std::collections::BTreeSet;
use std::future::Future;
use std::path::Path;
use std::pin::Pin;

use crate::errors::Result;
use crate::types::{AppName, RunOutcome};

/// Boxed future returned by [`TestRunner`] methods.
pub type RunFuture<'a> = Pin<Box<dyn Future<Output = Result<RunOutcome>> + Send + 'a>>;

/// How test runs are executed.
///
/// Both calls are awaited to completion by the dispatcher before it looks
/// at the queue again, so an implementation never sees two runs at once.
pub trait TestRunner: Send {
    /// Run the whole test suite of the project at `root`.
    fn run_all<'a>(&'a mut self, root: &'a Path) -> RunFuture<'a>;

    /// Run only the tests of the named apps. `apps` is never empty.
    fn run_subset<'a>(&'a mut self, root: &'a Path, apps: &'a BTreeSet<AppName>) -> RunFuture<'a>;
}

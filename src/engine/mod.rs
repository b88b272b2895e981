// src/engine/mod.rs

//! Change-coalescing engine for tdaemon.
//!
//! This module ties together:
//! - the change queue between the filesystem watcher and the dispatcher
//! - the pause latch
//! - the dispatcher loop that batches changes and invokes the test runner
//! - the coordinator that owns the whole lifecycle
//!
//! The pure batch decision lives in [`core`]; the async shell around it is
//! [`dispatcher`].

pub mod coordinator;
pub mod core;
pub mod dispatcher;
pub mod latch;
pub mod queue;

pub use coordinator::{Coordinator, WatchSettings};
pub use core::{plan_batch, BatchPlan};
pub use dispatcher::{Dispatcher, DispatcherState, DEFAULT_COALESCE};
pub use latch::{LatchState, PauseLatch};
pub use queue::{change_queue, ChangeReceiver, ChangeSender, Drained, QueueItem};

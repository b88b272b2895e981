// src/watch/mod.rs

//! File watching and change classification.
//!
//! This module is responsible for:
//! - Deciding which changed paths matter at all ([`filter`]).
//! - Mapping a changed path to the app that owns it ([`classify`]).
//! - Wiring up a cross-platform filesystem watcher (`notify`) that turns
//!   raw notifications into queued paths ([`source`]).
//!
//! It does **not** batch or dispatch anything; that is the engine's job.

pub mod classify;
pub mod filter;
pub mod path_utils;
pub mod source;

pub use classify::{AppIndex, Classification, ProjectLayout, SubProject};
pub use filter::{Exclusion, IgnoreRules, PathFilter};
pub use source::{notification_paths, EventSource, NotifySource, RenamePairing};

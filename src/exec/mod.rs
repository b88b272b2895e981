// src/exec/mod.rs

//! Test execution layer.
//!
//! - [`backend`] provides the `TestRunner` trait the dispatcher calls.
//! - [`command`] provides `CommandRunner`, which spawns the configured test
//!   command with `tokio::process::Command` and reports its exit status.

pub mod backend;
pub mod command;

pub use backend::{RunFuture, TestRunner};
pub use command::{CommandRunner, DEFAULT_TEST_COMMAND};

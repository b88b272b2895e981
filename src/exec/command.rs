// src/exec/command.rs

//! Test runner that spawns the configured command in the project root.

use std::collections::BTreeSet;
use std::path::Path;

use anyhow::Context;
use tokio::process::Command;
use tracing::info;

use crate::errors::{Result, TdaemonError};
use crate::exec::backend::{RunFuture, TestRunner};
use crate::types::{AppName, RunOutcome};

/// Default command: Django's test management command.
pub const DEFAULT_TEST_COMMAND: &[&str] = &["./manage.py", "test"];

/// Runs `program args... [apps...]` with the project root as working
/// directory. Output goes straight to the terminal.
#[derive(Debug, Clone)]
pub struct CommandRunner {
    program: String,
    args: Vec<String>,
}

impl Default for CommandRunner {
    fn default() -> Self {
        Self {
            program: DEFAULT_TEST_COMMAND[0].to_string(),
            args: DEFAULT_TEST_COMMAND[1..].iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl CommandRunner {
    pub fn new(command: &[String]) -> Result<Self> {
        let (program, args) = command.split_first().ok_or_else(|| {
            TdaemonError::ConfigError("test command must not be empty".to_string())
        })?;
        Ok(Self {
            program: program.clone(),
            args: args.to_vec(),
        })
    }

    /// Full argument vector for a run over `apps` (empty means all).
    pub fn command_line<'a>(&'a self, apps: impl IntoIterator<Item = &'a str>) -> Vec<&'a str> {
        let mut argv = vec![self.program.as_str()];
        argv.extend(self.args.iter().map(String::as_str));
        argv.extend(apps);
        argv
    }

    async fn invoke(&self, root: &Path, apps: Vec<&str>) -> Result<RunOutcome> {
        let argv = self.command_line(apps.iter().copied());
        info!(cwd = ?root, cmd = %argv.join(" "), "running tests");

        let status = Command::new(&self.program)
            .args(&self.args)
            .args(&apps)
            .current_dir(root)
            .kill_on_drop(true)
            .status()
            .await
            .with_context(|| format!("spawning test command '{}'", self.program))?;

        let code = status.code().unwrap_or(-1);
        Ok(if status.success() {
            RunOutcome::Passed
        } else {
            RunOutcome::Failed(code)
        })
    }
}

impl TestRunner for CommandRunner {
    fn run_all<'a>(&'a mut self, root: &'a Path) -> RunFuture<'a> {
        Box::pin(self.invoke(root, Vec::new()))
    }

    fn run_subset<'a>(&'a mut self, root: &'a Path, apps: &'a BTreeSet<AppName>) -> RunFuture<'a> {
        Box::pin(self.invoke(root, apps.iter().map(String::as_str).collect()))
    }
}

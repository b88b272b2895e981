#![allow(dead_code)]

use std::path::PathBuf;
use std::time::Duration;

use tdaemon::config::{ConfigFile, RawConfigFile};
use tdaemon::engine::{Coordinator, WatchSettings};
use tdaemon::watch::ProjectLayout;

use crate::fake_runner::{FakeRunner, RunLog};
use crate::fake_source::{FakeSource, SourceHandle};

/// Builder for `ConfigFile` to simplify test setup.
pub struct ConfigFileBuilder {
    config: RawConfigFile,
}

impl ConfigFileBuilder {
    pub fn new() -> Self {
        Self {
            config: RawConfigFile::default(),
        }
    }

    pub fn with_root(mut self, root: &str) -> Self {
        self.config.project.root = Some(PathBuf::from(root));
        self
    }

    pub fn with_app(mut self, name: &str) -> Self {
        self.config.project.apps.push(name.to_string());
        self
    }

    pub fn with_command(mut self, argv: &[&str]) -> Self {
        self.config.runner.command = argv.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn with_coalesce_ms(mut self, ms: u64) -> Self {
        self.config.watch.coalesce_ms = ms;
        self
    }

    pub fn with_ignore_glob(mut self, glob: &str) -> Self {
        self.config.watch.ignore_globs.push(glob.to_string());
        self
    }

    pub fn raw(self) -> RawConfigFile {
        self.config
    }

    pub fn build(self) -> ConfigFile {
        ConfigFile::try_from(self.config).expect("Failed to build valid config from builder")
    }
}

impl Default for ConfigFileBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A coordinator wired to fakes, plus the handles to drive and inspect it.
pub struct Harness {
    pub coordinator: Coordinator<FakeRunner, FakeSource>,
    pub runs: RunLog,
    pub source: SourceHandle,
}

/// Builder for a [`Harness`] rooted at a path that need not exist.
pub struct HarnessBuilder {
    root: PathBuf,
    apps: Vec<String>,
    settings: WatchSettings,
    run_delay: Option<Duration>,
    failing_source: bool,
}

impl HarnessBuilder {
    pub fn new(root: &str) -> Self {
        Self {
            root: PathBuf::from(root),
            apps: Vec::new(),
            settings: WatchSettings::default(),
            run_delay: None,
            failing_source: false,
        }
    }

    pub fn app(mut self, name: &str) -> Self {
        self.apps.push(name.to_string());
        self
    }

    pub fn coalesce_ms(mut self, ms: u64) -> Self {
        self.settings.coalesce = Duration::from_millis(ms);
        self
    }

    pub fn ignore_glob(mut self, glob: &str) -> Self {
        self.settings.ignore.globs.push(glob.to_string());
        self
    }

    /// Every test run takes `ms` on the Tokio clock.
    pub fn run_delay_ms(mut self, ms: u64) -> Self {
        self.run_delay = Some(Duration::from_millis(ms));
        self
    }

    pub fn failing_source(mut self) -> Self {
        self.failing_source = true;
        self
    }

    pub fn build(self) -> Harness {
        let layout = ProjectLayout::new(self.root, self.apps).expect("valid app names");

        let (mut runner, runs) = FakeRunner::new();
        if let Some(delay) = self.run_delay {
            runner = runner.with_delay(delay);
        }
        let (source, handle) = if self.failing_source {
            FakeSource::failing()
        } else {
            FakeSource::new()
        };

        let coordinator =
            Coordinator::new(layout, self.settings, runner, source).expect("valid ignore rules");
        Harness {
            coordinator,
            runs,
            source: handle,
        }
    }
}

// src/config/model.rs

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::engine::WatchSettings;
use crate::exec::DEFAULT_TEST_COMMAND;
use crate::watch::filter::{
    IgnoreRules, DEFAULT_IGNORE_DIRS, DEFAULT_IGNORE_EXTENSIONS, DEFAULT_IGNORE_PATTERNS,
};

/// Top-level configuration as read from a TOML file.
///
/// ```toml
/// [project]
/// root = "."
/// apps = ["app1", "app2"]
///
/// [runner]
/// command = ["./manage.py", "test"]
///
/// [watch]
/// coalesce_ms = 1000
/// ignore_extensions = ["pyc", "pyo", "tmp"]
/// ```
///
/// All sections are optional and have reasonable defaults.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawConfigFile {
    #[serde(default)]
    pub project: ProjectSection,

    #[serde(default)]
    pub runner: RunnerSection,

    #[serde(default)]
    pub watch: WatchSection,
}

/// Validated configuration.
///
/// Only obtainable through `TryFrom<RawConfigFile>`, so holders can rely on
/// the app names, command and ignore rules being well formed.
#[derive(Debug, Clone)]
pub struct ConfigFile {
    project: ProjectSection,
    runner: RunnerSection,
    watch: WatchSection,
}

impl ConfigFile {
    pub(crate) fn new_unchecked(project: ProjectSection, runner: RunnerSection, watch: WatchSection) -> Self {
        Self {
            project,
            runner,
            watch,
        }
    }

    pub fn project(&self) -> &ProjectSection {
        &self.project
    }

    pub fn runner(&self) -> &RunnerSection {
        &self.runner
    }

    pub fn watch(&self) -> &WatchSection {
        &self.watch
    }

    /// Project root, resolved against `base` when relative or absent.
    pub fn root_relative_to(&self, base: &Path) -> PathBuf {
        match &self.project.root {
            Some(root) if root.is_absolute() => root.clone(),
            Some(root) => base.join(root),
            None => base.to_path_buf(),
        }
    }

    pub fn coalesce(&self) -> Duration {
        Duration::from_millis(self.watch.coalesce_ms)
    }

    pub fn ignore_rules(&self) -> IgnoreRules {
        self.watch.ignore_rules()
    }

    pub fn watch_settings(&self) -> WatchSettings {
        WatchSettings {
            ignore: self.ignore_rules(),
            coalesce: self.coalesce(),
        }
    }
}

/// `[project]` section.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProjectSection {
    /// Directory to watch. Relative paths are taken from the config file's
    /// directory; if omitted, that directory itself is used.
    #[serde(default)]
    pub root: Option<PathBuf>,

    /// App directory names, each a direct child of the root.
    #[serde(default)]
    pub apps: Vec<String>,
}

/// `[runner]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct RunnerSection {
    /// Program and leading arguments; app names are appended per run.
    #[serde(default = "default_command")]
    pub command: Vec<String>,
}

impl Default for RunnerSection {
    fn default() -> Self {
        Self {
            command: default_command(),
        }
    }
}

/// `[watch]` section.
///
/// The ignore lists replace the built-in defaults when given.
#[derive(Debug, Clone, Deserialize)]
pub struct WatchSection {
    /// Coalescing window in milliseconds.
    #[serde(default = "default_coalesce_ms")]
    pub coalesce_ms: u64,

    #[serde(default = "default_ignore_extensions")]
    pub ignore_extensions: Vec<String>,

    #[serde(default = "default_ignore_dirs")]
    pub ignore_dirs: Vec<String>,

    /// Regular expressions matched from the start of the full path.
    #[serde(default = "default_ignore_patterns")]
    pub ignore_patterns: Vec<String>,

    /// Globs matched against the root-relative path.
    #[serde(default)]
    pub ignore_globs: Vec<String>,
}

impl Default for WatchSection {
    fn default() -> Self {
        Self {
            coalesce_ms: default_coalesce_ms(),
            ignore_extensions: default_ignore_extensions(),
            ignore_dirs: default_ignore_dirs(),
            ignore_patterns: default_ignore_patterns(),
            ignore_globs: Vec::new(),
        }
    }
}

impl WatchSection {
    pub fn ignore_rules(&self) -> IgnoreRules {
        IgnoreRules {
            extensions: self.ignore_extensions.clone(),
            dirs: self.ignore_dirs.clone(),
            patterns: self.ignore_patterns.clone(),
            globs: self.ignore_globs.clone(),
        }
    }
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

fn default_command() -> Vec<String> {
    strings(DEFAULT_TEST_COMMAND)
}

fn default_coalesce_ms() -> u64 {
    1000
}

fn default_ignore_extensions() -> Vec<String> {
    strings(DEFAULT_IGNORE_EXTENSIONS)
}

fn default_ignore_dirs() -> Vec<String> {
    strings(DEFAULT_IGNORE_DIRS)
}

fn default_ignore_patterns() -> Vec<String> {
    strings(DEFAULT_IGNORE_PATTERNS)
}

// src/watch/classify.rs

//! Mapping changed paths to the app (sub-project) that owns them.

use std::collections::{BTreeSet, HashSet};
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::errors::{Result, TdaemonError};
use crate::fs::FileSystem;
use crate::types::{AppName, RunScope};

/// A named app and the absolute directory its files live under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubProject {
    name: AppName,
    prefix: PathBuf,
}

impl SubProject {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn prefix(&self) -> &Path {
        &self.prefix
    }
}

/// Result of classifying one path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification<'a> {
    App(&'a str),
    /// Not inside any known app; forces a full run.
    Unscoped,
}

/// Watched root plus its apps, in registration order.
///
/// Every app directory is a direct child of the root. Names are validated so
/// no two prefixes can nest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectLayout {
    root: PathBuf,
    apps: Vec<SubProject>,
}

impl ProjectLayout {
    /// Build a layout without touching the filesystem.
    ///
    /// Only the app names are validated; `root` is used as given.
    pub fn new<I, S>(root: impl Into<PathBuf>, apps: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<AppName>,
    {
        let root = root.into();
        let mut seen = HashSet::new();
        let mut subprojects = Vec::new();

        for name in apps {
            let name = name.into();
            validate_app_name(&name)?;
            if !seen.insert(name.clone()) {
                return Err(TdaemonError::ConfigError(format!(
                    "app '{name}' is listed more than once"
                )));
            }
            subprojects.push(SubProject {
                prefix: root.join(&name),
                name,
            });
        }

        Ok(Self {
            root,
            apps: subprojects,
        })
    }

    /// Canonicalize `root`, check it is a directory, then build the layout.
    ///
    /// Apps whose directory does not exist are kept (changes can never map
    /// to them) but reported, since that is almost always a typo.
    pub fn resolve<I, S>(fs: &dyn FileSystem, root: &Path, apps: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<AppName>,
    {
        if !fs.is_dir(root) {
            return Err(TdaemonError::ConfigError(format!(
                "project root {:?} is not a directory",
                root
            )));
        }
        let root = fs.canonicalize(root)?;
        let layout = Self::new(root, apps)?;

        for app in &layout.apps {
            if !fs.is_dir(&app.prefix) {
                warn!(app = %app.name, dir = ?app.prefix, "app directory does not exist");
            }
        }
        if layout.apps.is_empty() {
            warn!("no apps configured; every change will run the full test suite");
        }

        debug!(root = ?layout.root, apps = layout.apps.len(), "resolved project layout");
        Ok(layout)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn apps(&self) -> &[SubProject] {
        &self.apps
    }

    pub fn app_names(&self) -> impl Iterator<Item = &str> {
        self.apps.iter().map(|a| a.name.as_str())
    }
}

fn validate_app_name(name: &str) -> Result<()> {
    let invalid = name.trim().is_empty()
        || name != name.trim()
        || name == "."
        || name == ".."
        || name.contains('/')
        || name.contains('\\');
    if invalid {
        return Err(TdaemonError::ConfigError(format!(
            "invalid app name '{name}': must be a single directory name below the project root"
        )));
    }
    Ok(())
}

/// Immutable prefix index over a [`ProjectLayout`].
#[derive(Debug, Clone)]
pub struct AppIndex {
    layout: ProjectLayout,
}

impl AppIndex {
    pub fn new(layout: ProjectLayout) -> Self {
        Self { layout }
    }

    pub fn layout(&self) -> &ProjectLayout {
        &self.layout
    }

    /// Owning app of `path`, matching whole path components.
    ///
    /// `app1` never claims `app10/x.py`. If prefixes ever overlapped, the
    /// longest one wins.
    pub fn classify(&self, path: &Path) -> Classification<'_> {
        self.layout
            .apps
            .iter()
            .filter(|app| path.starts_with(&app.prefix))
            .max_by_key(|app| app.prefix.components().count())
            .map(|app| Classification::App(app.name.as_str()))
            .unwrap_or(Classification::Unscoped)
    }

    /// Decide the run scope for a batch of included paths.
    ///
    /// Any unscoped path turns the whole batch into [`RunScope::All`].
    pub fn scope_for<'p, I>(&self, paths: I) -> RunScope
    where
        I: IntoIterator<Item = &'p Path>,
    {
        let mut names = BTreeSet::new();
        for path in paths {
            match self.classify(path) {
                Classification::App(name) => {
                    names.insert(name.to_string());
                }
                Classification::Unscoped => return RunScope::All,
            }
        }
        RunScope::Subset(names)
    }
}

// src/watch/filter.rs

//! Inclusion filter applied to every changed path before classification.

use std::collections::HashSet;
use std::fmt;
use std::path::{Component, Path, PathBuf};

use anyhow::{Context, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};
use regex::RegexSet;

use crate::watch::path_utils::relative_str;

/// Compiled/cache artifacts and temp files.
pub const DEFAULT_IGNORE_EXTENSIONS: &[&str] = &["pyc", "pyo", "tmp"];

/// Version-control metadata and build/doc directories.
pub const DEFAULT_IGNORE_DIRS: &[&str] = &[".bzr", ".git", ".hg", ".darcs", ".svn", ".tox", "docs"];

/// Coverage data files (`.coverage.<host>.<pid>`).
pub const DEFAULT_IGNORE_PATTERNS: &[&str] = &[r".*\.coverage\."];

/// Uncompiled ignore rules, as they come out of the config.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IgnoreRules {
    pub extensions: Vec<String>,
    pub dirs: Vec<String>,
    pub patterns: Vec<String>,
    pub globs: Vec<String>,
}

impl Default for IgnoreRules {
    fn default() -> Self {
        Self {
            extensions: to_strings(DEFAULT_IGNORE_EXTENSIONS),
            dirs: to_strings(DEFAULT_IGNORE_DIRS),
            patterns: to_strings(DEFAULT_IGNORE_PATTERNS),
            globs: Vec::new(),
        }
    }
}

fn to_strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

/// Which rule excluded a path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Exclusion {
    Extension(String),
    Directory(String),
    Pattern,
    Glob,
}

impl fmt::Display for Exclusion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Exclusion::Extension(ext) => write!(f, "ignored extension .{ext}"),
            Exclusion::Directory(dir) => write!(f, "inside ignored directory {dir}"),
            Exclusion::Pattern => write!(f, "matches an ignored pattern"),
            Exclusion::Glob => write!(f, "matches an ignored glob"),
        }
    }
}

/// Compiled form of [`IgnoreRules`] bound to a project root.
///
/// Directory segments and globs are checked against the root-relative path
/// so that a root living under e.g. `~/docs/` is not ignored wholesale.
/// Regex patterns must match from the start of the full path.
#[derive(Clone)]
pub struct PathFilter {
    root: PathBuf,
    extensions: HashSet<String>,
    dirs: HashSet<String>,
    patterns: RegexSet,
    globs: Option<GlobSet>,
}

impl fmt::Debug for PathFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PathFilter")
            .field("root", &self.root)
            .field("extensions", &self.extensions)
            .field("dirs", &self.dirs)
            .finish_non_exhaustive()
    }
}

impl PathFilter {
    pub fn new(root: impl Into<PathBuf>, rules: &IgnoreRules) -> Result<Self> {
        // Anchored at the start of the path, like `re.match`.
        let patterns = RegexSet::new(rules.patterns.iter().map(|p| format!("^(?:{p})")))
            .context("compiling ignore patterns")?;

        let globs = if rules.globs.is_empty() {
            None
        } else {
            let mut builder = GlobSetBuilder::new();
            for pat in &rules.globs {
                let glob = Glob::new(pat).with_context(|| format!("invalid glob pattern: {pat}"))?;
                builder.add(glob);
            }
            Some(builder.build()?)
        };

        Ok(Self {
            root: root.into(),
            extensions: rules.extensions.iter().cloned().collect(),
            dirs: rules.dirs.iter().cloned().collect(),
            patterns,
            globs,
        })
    }

    /// Returns `true` if the path is not ignored.
    pub fn is_included(&self, path: &Path) -> bool {
        self.exclusion(path).is_none()
    }

    /// The first rule that excludes `path`, if any.
    pub fn exclusion(&self, path: &Path) -> Option<Exclusion> {
        if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
            if self.extensions.contains(ext) {
                return Some(Exclusion::Extension(ext.to_string()));
            }
        }

        let scoped = path.strip_prefix(&self.root).unwrap_or(path);
        for component in scoped.components() {
            if let Component::Normal(segment) = component {
                if let Some(segment) = segment.to_str() {
                    if self.dirs.contains(segment) {
                        return Some(Exclusion::Directory(segment.to_string()));
                    }
                }
            }
        }

        if self.patterns.is_match(&path.to_string_lossy()) {
            return Some(Exclusion::Pattern);
        }

        if let Some(globs) = &self.globs {
            if let Some(rel) = relative_str(&self.root, path) {
                if globs.is_match(&rel) {
                    return Some(Exclusion::Glob);
                }
            }
        }

        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filter() -> PathFilter {
        PathFilter::new("/proj", &IgnoreRules::default()).unwrap()
    }

    #[test]
    fn plain_source_files_are_included() {
        let f = filter();
        assert!(f.is_included(Path::new("/proj/app1/models.py")));
        assert!(f.is_included(Path::new("/proj/settings.py")));
        assert!(f.is_included(Path::new("/proj/app1/templates/index.html")));
    }

    #[test]
    fn ignored_extensions_are_excluded() {
        let f = filter();
        assert_eq!(
            f.exclusion(Path::new("/proj/app1/admin.pyc")),
            Some(Exclusion::Extension("pyc".into()))
        );
        assert!(!f.is_included(Path::new("/proj/app1/admin.pyo")));
        assert!(!f.is_included(Path::new("/proj/app1/module.tmp")));
        // Only the final extension counts.
        assert!(f.is_included(Path::new("/proj/app1/tmp.py")));
    }

    #[test]
    fn ignored_directory_segments_are_excluded() {
        let f = filter();
        assert_eq!(
            f.exclusion(Path::new("/proj/.git/index")),
            Some(Exclusion::Directory(".git".into()))
        );
        assert!(!f.is_included(Path::new("/proj/app1/docs/intro.rst")));
        assert!(!f.is_included(Path::new("/proj/.tox/py3/lib/site.py")));
        // A segment that merely contains an ignored name is fine.
        assert!(f.is_included(Path::new("/proj/app1/gitlog.py")));
    }

    #[test]
    fn directory_rule_only_applies_below_the_root() {
        let f = PathFilter::new("/home/me/docs/proj", &IgnoreRules::default()).unwrap();
        assert!(f.is_included(Path::new("/home/me/docs/proj/app1/views.py")));
        assert!(!f.is_included(Path::new("/home/me/docs/proj/docs/index.rst")));
    }

    #[test]
    fn coverage_data_files_are_excluded() {
        let f = filter();
        assert_eq!(
            f.exclusion(Path::new("/proj/.coverage.host.1234.567")),
            Some(Exclusion::Pattern)
        );
        assert!(f.is_included(Path::new("/proj/coverage.py")));
    }

    #[test]
    fn patterns_match_from_the_start_of_the_path() {
        let bare = IgnoreRules {
            patterns: vec!["app1".into()],
            ..IgnoreRules::default()
        };
        let f = PathFilter::new("/proj", &bare).unwrap();
        assert!(f.is_included(Path::new("/proj/app1/models.py")));

        let rooted = IgnoreRules {
            patterns: vec!["/proj/app1/.*".into()],
            ..IgnoreRules::default()
        };
        let f = PathFilter::new("/proj", &rooted).unwrap();
        assert_eq!(
            f.exclusion(Path::new("/proj/app1/models.py")),
            Some(Exclusion::Pattern)
        );
        assert!(f.is_included(Path::new("/proj/app2/app1/models.py")));
    }

    #[test]
    fn alternations_are_anchored_as_a_whole() {
        let rules = IgnoreRules {
            patterns: vec!["/tmp/.*|.*~".into()],
            ..IgnoreRules::default()
        };
        let f = PathFilter::new("/proj", &rules).unwrap();
        assert!(!f.is_included(Path::new("/proj/app1/models.py~")));
        assert!(f.is_included(Path::new("/proj/tmp/models.py")));
    }

    #[test]
    fn globs_match_root_relative_paths() {
        let rules = IgnoreRules {
            globs: vec!["**/migrations/*.py".into()],
            ..IgnoreRules::default()
        };
        let f = PathFilter::new("/proj", &rules).unwrap();
        assert_eq!(
            f.exclusion(Path::new("/proj/app1/migrations/0001_initial.py")),
            Some(Exclusion::Glob)
        );
        assert!(f.is_included(Path::new("/proj/app1/models.py")));
    }

    #[test]
    fn invalid_rules_are_rejected() {
        let bad_regex = IgnoreRules {
            patterns: vec!["(unclosed".into()],
            ..IgnoreRules::default()
        };
        assert!(PathFilter::new("/proj", &bad_regex).is_err());

        let bad_glob = IgnoreRules {
            globs: vec!["a/[".into()],
            ..IgnoreRules::default()
        };
        assert!(PathFilter::new("/proj", &bad_glob).is_err());
    }
}

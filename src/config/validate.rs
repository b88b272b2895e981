// src/config/validate.rs

use crate::config::model::{ConfigFile, RawConfigFile};
use crate::errors::{Result, TdaemonError};
use crate::watch::{PathFilter, ProjectLayout};

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = crate::errors::TdaemonError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        validate_config(&raw)?;
        Ok(ConfigFile::new_unchecked(raw.project, raw.runner, raw.watch))
    }
}

/// Check every invariant `ConfigFile` promises.
pub fn validate_config(cfg: &RawConfigFile) -> Result<()> {
    validate_apps(cfg)?;
    validate_runner(cfg)?;
    validate_watch(cfg)?;
    Ok(())
}

fn validate_apps(cfg: &RawConfigFile) -> Result<()> {
    // Layout construction performs the name checks; the root is irrelevant.
    ProjectLayout::new(".", cfg.project.apps.iter().cloned())?;
    Ok(())
}

fn validate_runner(cfg: &RawConfigFile) -> Result<()> {
    match cfg.runner.command.first() {
        None => Err(TdaemonError::ConfigError(
            "[runner].command must contain at least the program to run".to_string(),
        )),
        Some(program) if program.trim().is_empty() => Err(TdaemonError::ConfigError(
            "[runner].command program must not be blank".to_string(),
        )),
        Some(_) => Ok(()),
    }
}

fn validate_watch(cfg: &RawConfigFile) -> Result<()> {
    if cfg.watch.coalesce_ms == 0 {
        return Err(TdaemonError::ConfigError(
            "[watch].coalesce_ms must be >= 1 (got 0)".to_string(),
        ));
    }

    for ext in &cfg.watch.ignore_extensions {
        if ext.is_empty() || ext.starts_with('.') {
            return Err(TdaemonError::ConfigError(format!(
                "[watch].ignore_extensions entry '{ext}' must be an extension without the leading dot"
            )));
        }
    }

    PathFilter::new(".", &cfg.watch.ignore_rules())
        .map_err(|e| TdaemonError::ConfigError(format!("[watch] ignore rules: {e:#}")))?;

    Ok(())
}

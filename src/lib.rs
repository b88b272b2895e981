// src/lib.rs

pub mod cli;
pub mod config;
pub mod control;
pub mod engine;
pub mod errors;
pub mod exec;
pub mod fs;
pub mod logging;
pub mod types;
pub mod watch;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::{debug, info};

use crate::cli::CliArgs;
use crate::config::{default_config_path, load_from_path, load_or_default, ConfigFile, RawConfigFile};
use crate::engine::Coordinator;
use crate::exec::CommandRunner;
use crate::fs::RealFileSystem;
use crate::watch::{NotifySource, ProjectLayout};

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - config loading and CLI overrides
/// - project layout resolution
/// - the coordinator (notify source, change queue, dispatcher)
/// - Ctrl-C and stdin control
pub async fn run(args: CliArgs) -> Result<()> {
    let (config_path, raw) = match &args.config {
        Some(path) => {
            let raw = load_from_path(path)
                .with_context(|| format!("loading config file {}", path.display()))?;
            (path.clone(), raw)
        }
        None => {
            let path = default_config_path();
            let raw = load_or_default(&path)
                .with_context(|| format!("loading config file {}", path.display()))?;
            (path, raw)
        }
    };

    let cfg = ConfigFile::try_from(apply_overrides(raw, &args))?;

    let root = match &args.path {
        Some(path) => path.clone(),
        None => cfg.root_relative_to(&config_root_dir(&config_path)),
    };
    let layout = ProjectLayout::resolve(&RealFileSystem, &root, cfg.project().apps.iter().cloned())?;

    if args.dry_run {
        print_dry_run(&cfg, &layout);
        return Ok(());
    }

    let runner = CommandRunner::new(&cfg.runner().command)?;
    let mut coordinator = Coordinator::new(layout, cfg.watch_settings(), runner, NotifySource::new())?;
    coordinator.start()?;

    control::wait_for_exit(coordinator.pause_handle(), !args.no_stdin).await;

    let stats = coordinator.stop().await?;
    info!(
        cycles = stats.cycles,
        runs = stats.runs,
        failed_runs = stats.failed_runs,
        ignored = stats.ignored,
        "shutdown complete"
    );
    Ok(())
}

/// Fold CLI flags over the file contents; flags win.
fn apply_overrides(mut raw: RawConfigFile, args: &CliArgs) -> RawConfigFile {
    if !args.apps.is_empty() {
        raw.project.apps = args.apps.clone();
    }
    if let Some(command) = &args.command {
        raw.runner.command = command.split_whitespace().map(str::to_string).collect();
    }
    if let Some(ms) = args.coalesce_ms {
        raw.watch.coalesce_ms = ms;
    }
    raw
}

/// Directory containing the config file, or `.`.
fn config_root_dir(config_path: &Path) -> PathBuf {
    match config_path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

fn print_dry_run(cfg: &ConfigFile, layout: &ProjectLayout) {
    println!("tdaemon dry-run");
    println!("  root = {}", layout.root().display());
    println!("  command = {}", cfg.runner().command.join(" "));
    println!("  coalesce_ms = {}", cfg.watch().coalesce_ms);
    println!();

    println!("apps ({}):", layout.apps().len());
    for app in layout.apps() {
        println!("  - {} ({})", app.name(), app.prefix().display());
    }
    println!();

    let rules = cfg.ignore_rules();
    println!("ignored:");
    println!("  extensions: {:?}", rules.extensions);
    println!("  dirs: {:?}", rules.dirs);
    println!("  patterns: {:?}", rules.patterns);
    if !rules.globs.is_empty() {
        println!("  globs: {:?}", rules.globs);
    }

    debug!("dry-run complete (nothing watched)");
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn cli_flags_override_file_values() {
        let mut raw = RawConfigFile::default();
        raw.project.apps = vec!["from_file".to_string()];
        let args = CliArgs::try_parse_from([
            "tdaemon",
            "--app",
            "a",
            "--command",
            "python  manage.py test",
            "--coalesce-ms",
            "5",
        ])
        .unwrap();

        let raw = apply_overrides(raw, &args);
        assert_eq!(raw.project.apps, vec!["a"]);
        assert_eq!(raw.runner.command, vec!["python", "manage.py", "test"]);
        assert_eq!(raw.watch.coalesce_ms, 5);
    }

    #[test]
    fn file_values_survive_without_flags() {
        let mut raw = RawConfigFile::default();
        raw.project.apps = vec!["kept".to_string()];
        let args = CliArgs::try_parse_from(["tdaemon"]).unwrap();

        let raw = apply_overrides(raw, &args);
        assert_eq!(raw.project.apps, vec!["kept"]);
        assert_eq!(raw.watch.coalesce_ms, 1000);
    }

    #[test]
    fn bare_config_name_resolves_to_cwd() {
        assert_eq!(config_root_dir(Path::new("Tdaemon.toml")), PathBuf::from("."));
        assert_eq!(
            config_root_dir(Path::new("/srv/proj/Tdaemon.toml")),
            PathBuf::from("/srv/proj")
        );
    }
}

// src/config/mod.rs

//! Configuration loading and validation for tdaemon.
//!
//! Responsibilities:
//! - Define the TOML-backed data model (`model.rs`).
//! - Load a config file from disk (`loader.rs`).
//! - Validate app names, the runner command and ignore rules (`validate.rs`).

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{default_config_path, load_and_validate, load_from_path, load_or_default};
pub use model::{ConfigFile, ProjectSection, RawConfigFile, RunnerSection, WatchSection};
pub use validate::validate_config;

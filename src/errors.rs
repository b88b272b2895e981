// src/errors.rs

//! Crate-wide error aliases and helpers.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum TdaemonError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("File watch error: {0}")]
    WatchError(#[from] notify::Error),

    #[error("Watcher already started")]
    AlreadyStarted,

    #[error("Change queue is closed")]
    QueueClosed,

    #[error("Dispatcher worker failed: {0}")]
    WorkerFailed(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, TdaemonError>;

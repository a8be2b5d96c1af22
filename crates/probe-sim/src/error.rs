//! Error types for miner process control and clock forging.
use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProcessError {
    #[error("empty miner command")] EmptyCommand,
    #[error("cannot open log {path}: {source}")] LogFile { path: PathBuf, source: std::io::Error },
    #[error("cannot spawn {program}: {source}")] Spawn { program: String, source: std::io::Error },
    #[error("cannot stop miner: {0}")] Kill(std::io::Error),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ClockError {
    #[error("setting the system clock is not supported on this platform")] Unsupported,
    #[error("timestamp out of range: {0}")] OutOfRange(i64),
    #[error("clock_settime failed: {0}")] Os(String),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{field} must be at least 1")] Zero { field: &'static str },
    #[error("poll interval must be positive")] ZeroPollInterval,
}

#[derive(Error, Debug)]
pub enum SimError {
    #[error(transparent)] Process(#[from] ProcessError),
    #[error(transparent)] Clock(#[from] ClockError),
    #[error(transparent)] Config(#[from] ConfigError),
}

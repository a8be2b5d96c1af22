//! Error types for block acquisition and persistence.
use probe_core::error::CompactError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SourceError {
    #[error("transport: {0}")] Transport(#[from] reqwest::Error),
    #[error("rpc {method} failed: {message}")] Rpc { method: String, message: String },
    #[error("malformed payload: {0}")] Malformed(String),
    #[error(transparent)] Compact(#[from] CompactError),
}

#[derive(Error, Debug)]
pub enum TabularError {
    #[error("io: {0}")] Io(#[from] std::io::Error),
    #[error("missing header row")] MissingHeader,
    #[error("unrecognized header: {0}")] Header(String),
    #[error("line {line}: {reason}")] Parse { line: usize, reason: String },
}

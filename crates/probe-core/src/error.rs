//! Error types for target arithmetic and retargeting.
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CompactError {
    #[error("target out of compact range: {0}")] OutOfRange(String),
    #[error("compact value {0:#010x} overflows 256 bits")] Overflow(u32),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RetargetError {
    #[error("insufficient window: have {have} records, need {need}")] InsufficientWindow { have: usize, need: usize },
    #[error("non-contiguous window: expected height {expected}, got {got}")] NonContiguous { expected: u64, got: u64 },
    #[error(transparent)] Compact(#[from] CompactError),
    #[error(transparent)] Params(#[from] ParamsError),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParamsError {
    #[error("unknown network: {0}")] UnknownNetwork(String),
    #[error("unknown retarget algorithm: {0}")] UnknownAlgorithm(String),
    #[error("{field} must be non-zero")] Zero { field: &'static str },
}

#[derive(Error, Debug)]
pub enum ProbeError {
    #[error(transparent)] Compact(#[from] CompactError),
    #[error(transparent)] Retarget(#[from] RetargetError),
    #[error(transparent)] Params(#[from] ParamsError),
}

//! # probe-sim
//! Drives external miners against a live node to reproduce hash-rate and
//! timestamp attacks on the retarget algorithms.

pub mod clock;
pub mod config;
pub mod error;
pub mod orchestrator;
pub mod process;

pub use clock::{Clock, SystemClock};
pub use config::AttackConfig;
pub use error::{ClockError, ConfigError, ProcessError, SimError};
pub use orchestrator::{AttackOrchestrator, Command, HeightSource, RunSummary};
pub use process::{CommandLauncher, MinerHandle, MinerLauncher, MinerRole};

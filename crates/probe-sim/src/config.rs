//! Attack simulation settings.

use std::time::Duration;

use probe_core::params::{NetworkParams, TARGET_SOLVETIME_SECS};

use crate::error::ConfigError;

pub const DEFAULT_ATTACK_SIZE: u32 = 10;
pub const DEFAULT_ATTACKER_THREADS: u32 = 4;
pub const DEFAULT_DEDICATED_THREADS: u32 = 1;
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// How the orchestrator splits hash rate between the dedicated and attack miners.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttackConfig {
    /// Expected seconds per block on the attacked chain.
    pub target_solvetime: u64,
    /// Multiple of the dedicated miner's hash rate the attacker represents.
    pub attack_size: u32,
    /// Threads given to the attack miner.
    pub attacker_threads: u32,
    /// Threads given to the dedicated miner.
    pub dedicated_threads: u32,
    /// Delay between chain height polls.
    pub poll_interval: Duration,
    /// Seconds added to the system clock after each attacker block.
    /// `None` leaves the clock alone.
    pub bad_timestamp_offset: Option<i64>,
}

impl Default for AttackConfig {
    fn default() -> Self {
        Self {
            target_solvetime: TARGET_SOLVETIME_SECS,
            attack_size: DEFAULT_ATTACK_SIZE,
            attacker_threads: DEFAULT_ATTACKER_THREADS,
            dedicated_threads: DEFAULT_DEDICATED_THREADS,
            poll_interval: DEFAULT_POLL_INTERVAL,
            bad_timestamp_offset: None,
        }
    }
}

impl AttackConfig {
    pub fn from_params(params: &NetworkParams) -> Self {
        Self {
            target_solvetime: params.target_solvetime,
            ..Self::default()
        }
    }

    /// Half a solve time.
    pub fn default_bad_timestamp_offset(&self) -> i64 {
        self.target_solvetime as i64 / 2
    }

    /// Enable clock forging with `offset` seconds, or the default offset.
    pub fn with_forged_timestamps(mut self, offset: Option<i64>) -> Self {
        let offset = offset.unwrap_or_else(|| self.default_bad_timestamp_offset());
        self.bad_timestamp_offset = Some(offset);
        self
    }

    /// Pause of the dedicated miner after each block it finds while dormant.
    ///
    /// `target_solvetime × (1 − attacker_threads / dedicated_threads / (attack_size + 1))`,
    /// truncated to whole seconds and never negative.
    pub fn off_time(&self) -> Duration {
        let ratio = self.attacker_threads as f64
            / self.dedicated_threads.max(1) as f64
            / (self.attack_size as f64 + 1.0);
        let secs = (1.0 - ratio) * self.target_solvetime as f64;
        if secs <= 0.0 {
            return Duration::ZERO;
        }
        Duration::from_secs(secs as u64)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.target_solvetime == 0 {
            return Err(ConfigError::Zero { field: "target_solvetime" });
        }
        if self.attacker_threads == 0 {
            return Err(ConfigError::Zero { field: "attacker_threads" });
        }
        if self.dedicated_threads == 0 {
            return Err(ConfigError::Zero { field: "dedicated_threads" });
        }
        if self.poll_interval.is_zero() {
            return Err(ConfigError::ZeroPollInterval);
        }
        Ok(())
    }
}

//! The attack control loop.
//!
//! The orchestrator alternates between two modes on operator command:
//!
//! - **Dormant**: only the dedicated miner runs. Every block it finds is
//!   followed by a pause of [`AttackConfig::off_time`] so that its share of
//!   hash rate matches a chain where an attacker `attack_size` times larger
//!   is mining intermittently.
//! - **Attacking**: the attack miner runs at `attacker_threads` and, when
//!   enabled, every new block pushes the system clock forward so the
//!   attacker's headers carry forged timestamps.
//!
//! New blocks are detected by polling chain height. A failed poll is a
//! non-event. The loop ends on [`Command::Shutdown`] or when every command
//! sender is dropped, and both miners are stopped on the way out. If the
//! future is dropped instead, the handles are dropped with it.

use async_trait::async_trait;
use probe_source::{BlockSource, SourceError};
use tokio::sync::mpsc;
use tokio::time::{Instant, MissedTickBehavior};

use crate::clock::{self, Clock};
use crate::config::AttackConfig;
use crate::process::{MinerHandle, MinerLauncher, MinerRole};

/// What the orchestrator polls for new blocks.
#[async_trait]
pub trait HeightSource: Send + Sync {
    async fn current_height(&self) -> Result<u64, SourceError>;
}

#[async_trait]
impl<T: BlockSource + ?Sized> HeightSource for T {
    async fn current_height(&self) -> Result<u64, SourceError> {
        self.chain_height().await
    }
}

/// Operator input to a running orchestrator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    ToggleAttack,
    Shutdown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Dormant,
    Attacking,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DedicatedState {
    Running,
    /// Stopped after finding a block; restarts once `until` passes.
    CoolingDown { until: Instant },
}

/// Mutable state of one orchestrator run.
pub struct AttackSession {
    pub mode: Mode,
    pub dedicated_state: DedicatedState,
    /// `None` until the first successful height poll.
    pub last_height: Option<u64>,
    dedicated: Option<Box<dyn MinerHandle>>,
    attack: Option<Box<dyn MinerHandle>>,
}

impl AttackSession {
    fn new() -> Self {
        Self {
            mode: Mode::Dormant,
            dedicated_state: DedicatedState::Running,
            last_height: None,
            dedicated: None,
            attack: None,
        }
    }

    pub fn dedicated_running(&self) -> bool {
        self.dedicated.is_some()
    }

    pub fn attack_running(&self) -> bool {
        self.attack.is_some()
    }
}

/// Counters reported when a run ends.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Blocks seen while dormant.
    pub dormant_blocks: u64,
    /// Blocks seen while attacking.
    pub attack_blocks: u64,
    /// Times the attack mode was entered.
    pub attacks: u64,
    /// Successful clock forgeries.
    pub forged_timestamps: u64,
}

pub struct AttackOrchestrator<H, L, C> {
    config: AttackConfig,
    heights: H,
    launcher: L,
    clock: C,
    commands: mpsc::Receiver<Command>,
    session: AttackSession,
    summary: RunSummary,
}

impl<H, L, C> AttackOrchestrator<H, L, C>
where
    H: HeightSource,
    L: MinerLauncher,
    C: Clock,
{
    pub fn new(
        config: AttackConfig,
        heights: H,
        launcher: L,
        clock: C,
        commands: mpsc::Receiver<Command>,
    ) -> Self {
        Self {
            config,
            heights,
            launcher,
            clock,
            commands,
            session: AttackSession::new(),
            summary: RunSummary::default(),
        }
    }

    pub fn session(&self) -> &AttackSession {
        &self.session
    }

    /// Drive the loop until shutdown. Both miners are stopped before returning.
    pub async fn run(mut self) -> RunSummary {
        let off_time = self.config.off_time();
        tracing::info!(
            off_time_secs = off_time.as_secs(),
            attack_size = self.config.attack_size,
            attacker_threads = self.config.attacker_threads,
            dedicated_threads = self.config.dedicated_threads,
            forge_offset = ?self.config.bad_timestamp_offset,
            "orchestrator starting"
        );

        self.start_miner(MinerRole::Dedicated).await;
        self.session.last_height = Self::poll_height(&self.heights, None).await;

        let mut ticker = tokio::time::interval(self.config.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately.
        ticker.tick().await;

        loop {
            tokio::select! {
                command = self.commands.recv() => match command {
                    Some(Command::ToggleAttack) => self.toggle_attack().await,
                    Some(Command::Shutdown) => {
                        tracing::info!("shutdown requested");
                        break;
                    }
                    None => {
                        tracing::info!("command channel closed");
                        break;
                    }
                },
                _ = ticker.tick() => self.tick().await,
            }
        }

        self.stop_miner(MinerRole::Attack).await;
        self.stop_miner(MinerRole::Dedicated).await;
        tracing::info!(summary = ?self.summary, "orchestrator stopped");
        self.summary
    }

    async fn tick(&mut self) {
        if let DedicatedState::CoolingDown { until } = self.session.dedicated_state {
            if Instant::now() >= until {
                tracing::info!("off time over, restarting dedicated miner");
                self.start_miner(MinerRole::Dedicated).await;
                self.session.dedicated_state = DedicatedState::Running;
            }
        }

        let Some(height) = Self::poll_height(&self.heights, self.session.last_height).await else {
            return;
        };
        match self.session.last_height {
            None => self.session.last_height = Some(height),
            Some(last) if height > last => {
                self.session.last_height = Some(height);
                self.on_new_block(height).await;
            }
            Some(last) if height < last => {
                tracing::warn!(height, last, "chain height went down");
                self.session.last_height = Some(height);
            }
            Some(_) => {}
        }
    }

    async fn on_new_block(&mut self, height: u64) {
        match self.session.mode {
            Mode::Attacking => {
                self.summary.attack_blocks += 1;
                tracing::info!(height, "attacker found block");
                if let Some(offset) = self.config.bad_timestamp_offset {
                    self.forge_clock(offset);
                }
            }
            Mode::Dormant => {
                self.summary.dormant_blocks += 1;
                tracing::info!(height, "dedicated miner found block");
                if self.session.dedicated_state != DedicatedState::Running {
                    return;
                }
                self.stop_miner(MinerRole::Dedicated).await;
                let off_time = self.config.off_time();
                if off_time.is_zero() {
                    self.start_miner(MinerRole::Dedicated).await;
                    return;
                }
                tracing::info!(secs = off_time.as_secs(), "dedicated miner cooling down");
                self.session.dedicated_state = DedicatedState::CoolingDown {
                    until: Instant::now() + off_time,
                };
            }
        }
    }

    async fn toggle_attack(&mut self) {
        match self.session.mode {
            Mode::Dormant => {
                tracing::info!("starting attack");
                self.session.mode = Mode::Attacking;
                self.summary.attacks += 1;
                self.start_miner(MinerRole::Attack).await;
            }
            Mode::Attacking => {
                self.stop_miner(MinerRole::Attack).await;
                self.session.mode = Mode::Dormant;
                tracing::info!("attack stopped");
            }
        }
    }

    fn forge_clock(&mut self, offset: i64) {
        match clock::advance(&self.clock, offset) {
            Ok(forged) => {
                self.summary.forged_timestamps += 1;
                tracing::info!(forged, offset, "system clock pushed forward");
            }
            Err(e) => tracing::warn!(offset, "clock forging failed: {e}"),
        }
    }

    /// Current height, or `None` after logging a failed query.
    async fn poll_height(heights: &H, last: Option<u64>) -> Option<u64> {
        match heights.current_height().await {
            Ok(height) => Some(height),
            Err(e) => {
                tracing::warn!(?last, "height query failed: {e}");
                None
            }
        }
    }

    fn slot(&mut self, role: MinerRole) -> &mut Option<Box<dyn MinerHandle>> {
        match role {
            MinerRole::Dedicated => &mut self.session.dedicated,
            MinerRole::Attack => &mut self.session.attack,
        }
    }

    fn threads(&self, role: MinerRole) -> u32 {
        match role {
            MinerRole::Dedicated => self.config.dedicated_threads,
            MinerRole::Attack => self.config.attacker_threads,
        }
    }

    /// Start `role`, stopping its predecessor first if one is still held.
    async fn start_miner(&mut self, role: MinerRole) {
        self.stop_miner(role).await;
        let threads = self.threads(role);
        match self.launcher.start(role, threads).await {
            Ok(handle) => *self.slot(role) = Some(handle),
            Err(e) => tracing::error!(%role, threads, "cannot start miner: {e}"),
        }
    }

    async fn stop_miner(&mut self, role: MinerRole) {
        if let Some(mut handle) = self.slot(role).take() {
            if let Err(e) = handle.stop().await {
                tracing::error!(%role, "cannot stop miner: {e}");
            }
        }
    }
}

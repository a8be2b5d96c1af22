//! hashprobe attack runner.
//!
//! Keeps a dedicated miner running against a node and, on operator command,
//! adds an attack miner (optionally pushing the system clock forward after
//! each of its blocks) to observe how the chain's retarget algorithm reacts.
//!
//! Controls: Ctrl+C toggles the attack. SIGTERM, or `q` on stdin, stops.
//! `a` on stdin also toggles.

use std::io::BufRead;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use probe_core::params::NetworkType;
use probe_sim::config::{DEFAULT_ATTACKER_THREADS, DEFAULT_ATTACK_SIZE, DEFAULT_DEDICATED_THREADS};
use probe_sim::process::{DEFAULT_STRATUM, DEFAULT_STRATUM_USER};
use probe_sim::{AttackConfig, AttackOrchestrator, Command, CommandLauncher, SystemClock};
use probe_source::RpcSettings;

#[derive(Debug, Parser)]
#[command(name = "probe-attack", version, about = "Hash-rate and timestamp attack simulator")]
struct Args {
    /// Network preset (mainnet, testnet, regtest)
    #[arg(long, default_value = "testnet")]
    network: NetworkType,

    /// Node JSON-RPC URL (overrides HASHPROBE_RPC_URL and the preset)
    #[arg(long)]
    rpc_url: Option<String>,

    /// RPC user (overrides HASHPROBE_RPC_USER and the preset)
    #[arg(long)]
    rpc_user: Option<String>,

    /// RPC password (overrides HASHPROBE_RPC_PASSWORD and the preset)
    #[arg(long)]
    rpc_password: Option<String>,

    /// Stratum server the miners connect to
    #[arg(long, default_value = DEFAULT_STRATUM)]
    stratum: String,

    /// Stratum user (payout address and worker)
    #[arg(long, default_value = DEFAULT_STRATUM_USER)]
    stratum_user: String,

    /// Full miner command line; `{threads}` is replaced by the thread count
    #[arg(long)]
    miner_command: Option<String>,

    /// Attacker hash rate as a multiple of the dedicated miner's
    #[arg(long, default_value_t = DEFAULT_ATTACK_SIZE)]
    attack_size: u32,

    /// Attack miner threads
    #[arg(long, default_value_t = DEFAULT_ATTACKER_THREADS)]
    attacker_threads: u32,

    /// Dedicated miner threads
    #[arg(long, default_value_t = DEFAULT_DEDICATED_THREADS)]
    dedicated_threads: u32,

    /// Chain height poll interval in milliseconds
    #[arg(long, default_value_t = 1000)]
    poll_interval_ms: u64,

    /// Push the system clock forward after every attacker block
    #[arg(long)]
    forge_timestamps: bool,

    /// Seconds to push the clock forward (default: half the target solve time)
    #[arg(long, requires = "forge_timestamps")]
    bad_timestamp_secs: Option<i64>,

    /// Directory for miner logs
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Log output format ("text" or "json")
    #[arg(long, default_value = "text")]
    log_format: String,
}

impl Args {
    fn attack_config(&self) -> AttackConfig {
        let config = AttackConfig {
            attack_size: self.attack_size,
            attacker_threads: self.attacker_threads,
            dedicated_threads: self.dedicated_threads,
            poll_interval: Duration::from_millis(self.poll_interval_ms),
            ..AttackConfig::from_params(&self.network.params())
        };
        if self.forge_timestamps {
            config.with_forged_timestamps(self.bad_timestamp_secs)
        } else {
            config
        }
    }

    fn data_dir(&self) -> PathBuf {
        self.data_dir.clone().unwrap_or_else(|| {
            dirs::data_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("hashprobe")
                .join(self.network.name())
        })
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(&args.log_level, &args.log_format);

    let config = args.attack_config();
    config.validate().context("invalid attack settings")?;

    let data_dir = args.data_dir();
    std::fs::create_dir_all(&data_dir)
        .with_context(|| format!("cannot create data dir {}", data_dir.display()))?;

    let rpc = RpcSettings::from_env(args.network).with_overrides(
        args.rpc_url.clone(),
        args.rpc_user.clone(),
        args.rpc_password.clone(),
    );
    let source = rpc.connect().context("cannot build RPC client")?;

    let launcher = match &args.miner_command {
        Some(command) => CommandLauncher::new(command, &data_dir),
        None => CommandLauncher::ccminer(&args.stratum, &args.stratum_user, &data_dir),
    }
    .context("invalid miner command")?;

    info!("probe-attack v{}", env!("CARGO_PKG_VERSION"));
    info!(network = %args.network, rpc = %rpc.url, data_dir = %data_dir.display(), "configured");
    if config.bad_timestamp_offset.is_some() {
        warn!("clock forging enabled: the system time will be changed");
    }
    info!("Ctrl+C toggles the attack; SIGTERM or `q` stops");

    let (tx, rx) = mpsc::channel(8);
    spawn_controls(tx);

    let summary = AttackOrchestrator::new(config, source, launcher, SystemClock, rx)
        .run()
        .await;
    info!(
        dormant_blocks = summary.dormant_blocks,
        attack_blocks = summary.attack_blocks,
        attacks = summary.attacks,
        forged_timestamps = summary.forged_timestamps,
        "probe-attack finished"
    );
    Ok(())
}

/// Wire Ctrl+C, SIGTERM and stdin to orchestrator commands.
fn spawn_controls(tx: mpsc::Sender<Command>) {
    let tx_ctrl_c = tx.clone();
    tokio::spawn(async move {
        loop {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("cannot listen for Ctrl+C: {e}");
                break;
            }
            info!("Ctrl+C received, toggling attack");
            if tx_ctrl_c.send(Command::ToggleAttack).await.is_err() {
                break;
            }
        }
    });

    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let tx_sigterm = tx.clone();
        tokio::spawn(async move {
            match signal(SignalKind::terminate()) {
                Ok(mut sigterm) => {
                    if sigterm.recv().await.is_some() {
                        info!("SIGTERM received, shutting down");
                        let _ = tx_sigterm.send(Command::Shutdown).await;
                    }
                }
                Err(e) => error!("cannot register SIGTERM handler: {e}"),
            }
        });
    }

    // Blocking stdin reader; must stay off the runtime so shutdown never waits on it.
    std::thread::spawn(move || {
        for line in std::io::stdin().lock().lines() {
            let Ok(line) = line else { break };
            let command = match line.trim() {
                "a" | "attack" => Command::ToggleAttack,
                "q" | "quit" => Command::Shutdown,
                "" => continue,
                other => {
                    warn!("unknown input {other:?}; `a` toggles, `q` quits");
                    continue;
                }
            };
            if tx.blocking_send(command).is_err() {
                break;
            }
        }
    });
}

/// Initialize tracing subscriber with the given log level and output format.
fn init_logging(level_str: &str, format: &str) {
    use tracing_subscriber::filter::EnvFilter;
    use tracing_subscriber::fmt;
    use tracing_subscriber::prelude::*;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level_str));

    if format == "json" {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(false))
            .init();
    }
}

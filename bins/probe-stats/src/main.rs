//! probe-stats: fetch block history from a node and inspect it.
//!
//! `fetch` writes the latest blocks to a CSV file; `summary`, `retarget` and
//! `audit` work offline on that file.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, ensure, Context, Result};
use chrono::{DateTime, Utc};
use clap::{Args, Parser, Subcommand};
use tracing::info;

use probe_core::chain::BlockChainView;
use probe_core::compact::CompactTarget;
use probe_core::difficulty::DifficultyCalculator;
use probe_core::params::{NetworkParams, NetworkType, RetargetAlgorithm};
use probe_core::stats::{self, SolveTimeHistogram, SolveTimeSummary};
use probe_core::types::BlockRecord;
use probe_source::{fetch_latest, tabular, RpcSettings};

/// Block history statistics and retarget replay.
#[derive(Parser)]
#[command(name = "probe-stats")]
#[command(version, about = "Solve-time, difficulty and retarget inspection")]
struct Cli {
    /// Network preset (mainnet, testnet, regtest).
    #[arg(short, long, default_value = "testnet", global = true)]
    network: NetworkType,

    /// Block history file (default: <data dir>/hashprobe/<network>/blocks.csv).
    #[arg(short, long, global = true)]
    file: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, default_value = "warn", global = true)]
    log_level: String,

    /// Log output format ("text" or "json").
    #[arg(long, default_value = "text", global = true)]
    log_format: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch the latest blocks over RPC and save them.
    Fetch(FetchArgs),
    /// Solve-time histogram and difficulty range of the saved blocks.
    Summary,
    /// Required nbits for the block after the saved tip.
    Retarget(RetargetArgs),
    /// Heights whose nbits differ from what the retarget algorithm requires.
    Audit(AuditArgs),
}

#[derive(Args)]
struct FetchArgs {
    /// Number of blocks before the tip.
    #[arg(short, long, default_value_t = 100)]
    count: u64,

    /// Height distance between fetched blocks. Use 1 for retarget and audit.
    #[arg(short, long, default_value_t = 1)]
    step: u64,

    /// Pause after each block, in milliseconds.
    #[arg(long, default_value_t = 200)]
    delay_ms: u64,

    /// Node JSON-RPC URL.
    #[arg(long)]
    rpc_url: Option<String>,

    /// RPC user.
    #[arg(long)]
    rpc_user: Option<String>,

    /// RPC password.
    #[arg(long)]
    rpc_password: Option<String>,
}

#[derive(Args)]
struct RetargetArgs {
    /// Replay with this algorithm instead of the network's (interval, lwma).
    #[arg(short, long)]
    algorithm: Option<RetargetAlgorithm>,
}

#[derive(Args)]
struct AuditArgs {
    /// Replay with this algorithm instead of the network's (interval, lwma).
    #[arg(short, long)]
    algorithm: Option<RetargetAlgorithm>,

    /// Print at most this many mismatches.
    #[arg(long, default_value_t = 20)]
    limit: usize,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(&cli.log_level, &cli.log_format);

    let params = cli.network.params();
    let file = cli.file.clone().unwrap_or_else(|| default_file(cli.network));

    match cli.command {
        Commands::Fetch(args) => fetch(cli.network, &params, &file, args).await,
        Commands::Summary => summary(&params, &file),
        Commands::Retarget(args) => retarget(params, &file, args.algorithm),
        Commands::Audit(args) => audit(params, &file, args),
    }
}

/// Initialize tracing on stderr so reports on stdout stay clean.
fn init_logging(level_str: &str, format: &str) {
    use tracing_subscriber::filter::EnvFilter;
    use tracing_subscriber::fmt;
    use tracing_subscriber::prelude::*;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level_str));

    if format == "json" {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
            .init();
    }
}

fn default_file(network: NetworkType) -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("hashprobe")
        .join(network.name())
        .join(tabular::DEFAULT_FILE_NAME)
}

fn load(params: &NetworkParams, file: &Path) -> Result<Vec<BlockRecord>> {
    let calc = DifficultyCalculator::from_params(params);
    let records = tabular::load(file, &calc).with_context(|| format!("cannot read {}", file.display()))?;
    ensure!(!records.is_empty(), "{} holds no blocks", file.display());
    Ok(records)
}

fn with_algorithm(params: NetworkParams, algorithm: Option<RetargetAlgorithm>) -> NetworkParams {
    match algorithm {
        Some(algorithm) => NetworkParams { algorithm, ..params },
        None => params,
    }
}

fn format_time(unix: i64) -> String {
    DateTime::<Utc>::from_timestamp(unix, 0)
        .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| unix.to_string())
}

/// Fetch blocks from the node and save them.
async fn fetch(network: NetworkType, params: &NetworkParams, file: &Path, args: FetchArgs) -> Result<()> {
    let rpc = RpcSettings::from_env(network).with_overrides(args.rpc_url, args.rpc_user, args.rpc_password);
    let source = rpc
        .connect()
        .context("cannot build RPC client")?
        .with_request_delay(Duration::from_millis(args.delay_ms));

    info!(rpc = %rpc.url, count = args.count, step = args.step, "fetching");
    let records = fetch_latest(&source, args.count, args.step)
        .await
        .with_context(|| format!("fetch from {} failed", rpc.url))?;

    if let Some(parent) = file.parent() {
        std::fs::create_dir_all(parent).with_context(|| format!("cannot create {}", parent.display()))?;
    }
    let calc = DifficultyCalculator::from_params(params);
    tabular::save(file, &records, &calc).with_context(|| format!("cannot write {}", file.display()))?;

    println!("Saved {} blocks to {}", records.len(), file.display());
    Ok(())
}

/// Average height distance between consecutive records, at least one.
fn sample_step(records: &[BlockRecord]) -> u64 {
    match (records.first(), records.last()) {
        (Some(first), Some(last)) if records.len() > 1 => {
            (last.height.saturating_sub(first.height) / (records.len() as u64 - 1)).max(1)
        }
        _ => 1,
    }
}

/// Print solve-time and difficulty statistics.
fn summary(params: &NetworkParams, file: &Path) -> Result<()> {
    let records = load(params, file)?;
    let calc = DifficultyCalculator::from_params(params);

    let (first, last) = (records[0], records[records.len() - 1]);
    println!("\n=== BLOCK HISTORY ===");
    println!("Network: {}", params.network);
    println!("Blocks:  {} ({} .. {})", records.len(), first.height, last.height);
    println!("From:    {}", format_time(first.time));
    println!("To:      {}", format_time(last.time));

    let solve_times: Vec<i64> = stats::solve_times(&records).into_iter().map(|(_, s)| s).collect();
    let step = sample_step(&records);
    if step > 1 {
        println!("Note:    sampled every {step} blocks; solve times span {step} blocks each");
    }

    if let Some(s) = SolveTimeSummary::from_solve_times(&solve_times) {
        println!("\n=== SOLVE TIMES ===");
        println!("Target:  {} s", params.target_solvetime);
        println!("Mean:    {:.1} s", s.mean_secs);
        println!("Min:     {} s", s.min_secs);
        println!("Max:     {} s", s.max_secs);

        let hist = SolveTimeHistogram::from_solve_times(solve_times.iter().copied());
        println!();
        for (i, (count, share)) in hist.buckets.iter().zip(hist.shares()).enumerate() {
            println!("  {:<14} {:>6}  {:>5.1}%", SolveTimeHistogram::label(i), count, share);
        }
        if hist.negative > 0 {
            println!("  {:<14} {:>6}", "negative", hist.negative);
        }
    }

    let series = stats::difficulty_series(&records, &calc);
    let (min, max) = series
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &(_, d)| (lo.min(d), hi.max(d)));
    println!("\n=== DIFFICULTY ===");
    println!("First:   {:.4}", series[0].1);
    println!("Last:    {:.4}", series[series.len() - 1].1);
    println!("Min:     {min:.4}");
    println!("Max:     {max:.4}");
    Ok(())
}

/// Print the nbits required after the saved tip.
fn retarget(params: NetworkParams, file: &Path, algorithm: Option<RetargetAlgorithm>) -> Result<()> {
    let params = with_algorithm(params, algorithm);
    let view = BlockChainView::new(load(&params, file)?)
        .context("retarget needs contiguous blocks; fetch with --step 1")?;
    let Some(tip) = view.tip() else {
        bail!("no blocks");
    };
    let nbits = view
        .next_nbits(&params)
        .with_context(|| format!("{} retarget failed", params.algorithm))?;
    let calc = DifficultyCalculator::from_params(&params);

    println!("Algorithm:   {}", params.algorithm);
    println!("Tip:         {} ({}, nbits {})", tip.height, format_time(tip.time), tip.compact());
    println!("Next height: {}", tip.height + 1);
    println!("Next nbits:  {}", CompactTarget(nbits));
    println!("Difficulty:  {:.4} (tip {:.4})", calc.difficulty(nbits), calc.difficulty(tip.nbits));
    Ok(())
}

/// Replay the retarget algorithm and print mismatching heights.
fn audit(params: NetworkParams, file: &Path, args: AuditArgs) -> Result<()> {
    let params = with_algorithm(params, args.algorithm);
    let view = BlockChainView::new(load(&params, file)?)
        .context("audit needs contiguous blocks; fetch with --step 1")?;
    let mismatches = view
        .audit(&params)
        .with_context(|| format!("{} replay failed", params.algorithm))?;

    println!("Algorithm:  {}", params.algorithm);
    println!("Blocks:     {}", view.len());
    println!("Mismatches: {}", mismatches.len());
    for m in mismatches.iter().take(args.limit) {
        println!(
            "  height {:>8}  expected {}  actual {}",
            m.height,
            CompactTarget(m.expected),
            CompactTarget(m.actual)
        );
    }
    if mismatches.len() > args.limit {
        println!("  ... {} more", mismatches.len() - args.limit);
    }
    Ok(())
}

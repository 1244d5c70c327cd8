use clap::{ArgAction, Args, Parser, Subcommand};
use color_eyre::eyre::{eyre, Context, Result};
use comfy_table::presets::UTF8_BORDERS_ONLY;
use comfy_table::Table;
use indicatif::{ProgressBar, ProgressStyle};
use market_analysis::metrics::{gini, to_f64};
use market_analysis::summary::{compute_run_stats, RunStats};
use market_sim::{RunOutput, Simulation};
use market_types::config::{
    AttackRewardModel, BroadcastMode, ClaimReset, ConsensusKind, NetworkConfig, SelectionPolicy,
    SimConfig,
};
use market_types::fees::SyntheticFeeSource;
use market_types::BlockRecord;
use tracing::{info, Level};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "market-sim")]
#[command(about = "Block-building market simulator: PBS auctions vs pure PoS")]
#[command(version)]
struct Cli {
    #[arg(long, short = 'v', action = ArgAction::Count, global = true)]
    verbose: u8,

    #[arg(long, short = 'q', global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run one simulation and print its block records and summary.
    Simulate(SimulateArgs),
    /// Sweep the attacker count over independent seeded runs.
    Sweep(SweepArgs),
}

#[derive(Args, Debug, Clone)]
struct SimulateArgs {
    /// Consensus design: pbs or pos.
    #[arg(long, default_value = "pbs")]
    consensus: String,

    #[arg(long, default_value_t = 100)]
    blocks: u64,

    #[arg(long, default_value_t = 30)]
    block_cap: usize,

    #[arg(long, default_value_t = 50)]
    users: usize,

    #[arg(long, default_value_t = 10)]
    builders: usize,

    #[arg(long, default_value_t = 20)]
    validators: usize,

    /// Attacking builders (PBS) or validators (PoS).
    #[arg(long, default_value_t = 0)]
    attackers: usize,

    /// Ordering policy for honest participants: greedy, random, or fcfs.
    #[arg(long, default_value = "greedy")]
    policy: String,

    /// Back-run funding model: builder-donates or user-pays.
    #[arg(long, default_value = "builder-donates")]
    reward_model: String,

    /// Claim-table reset granularity: per-run or per-block.
    #[arg(long, default_value = "per-run")]
    claim_reset: String,

    /// Gossip fan-out at the origin: all, half (50%), or most (80%).
    #[arg(long, default_value = "all")]
    broadcast: String,

    #[arg(long, default_value_t = 0)]
    seed: u64,

    /// Output format: table, json, or csv.
    #[arg(long, default_value = "table")]
    output: String,
}

#[derive(Args, Debug, Clone)]
struct SweepArgs {
    #[command(flatten)]
    base: SimulateArgs,

    /// Run one simulation per attacker count in 0..=max_attackers.
    #[arg(long, default_value_t = 5)]
    max_attackers: usize,
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.quiet)?;

    match cli.command {
        Commands::Simulate(args) => handle_simulate(args).await,
        Commands::Sweep(args) => handle_sweep(args).await,
    }
}

fn init_tracing(verbose: u8, quiet: bool) -> Result<()> {
    let level = if quiet {
        Level::WARN
    } else {
        match verbose {
            0 => Level::INFO,
            1 => Level::DEBUG,
            _ => Level::TRACE,
        }
    };

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level.as_str()))
        .wrap_err("failed to initialize tracing filter")?;

    tracing_subscriber::fmt().with_env_filter(filter).init();
    Ok(())
}

/// Translate CLI strings into a validated run configuration. Unknown
/// strategy names are fatal before the run starts.
fn build_config(args: &SimulateArgs, attackers: usize, seed: u64) -> Result<SimConfig> {
    let consensus = match args.consensus.to_lowercase().as_str() {
        "pbs" => ConsensusKind::Pbs,
        "pos" => ConsensusKind::Pos,
        other => return Err(eyre!("unknown consensus '{}'; use 'pbs' or 'pos'", other)),
    };

    let policy = match args.policy.to_lowercase().as_str() {
        "greedy" => SelectionPolicy::Greedy,
        "random" => SelectionPolicy::Random,
        "fcfs" => SelectionPolicy::Fcfs,
        other => {
            return Err(eyre!(
                "unknown policy '{}'; use 'greedy', 'random', or 'fcfs'",
                other
            ))
        }
    };

    let reward_model = match args.reward_model.to_lowercase().as_str() {
        "builder-donates" => AttackRewardModel::BuilderDonates,
        "user-pays" => AttackRewardModel::UserPays,
        other => {
            return Err(eyre!(
                "unknown reward model '{}'; use 'builder-donates' or 'user-pays'",
                other
            ))
        }
    };

    let claim_reset = match args.claim_reset.to_lowercase().as_str() {
        "per-run" => ClaimReset::PerRun,
        "per-block" => ClaimReset::PerBlock,
        other => {
            return Err(eyre!(
                "unknown claim reset '{}'; use 'per-run' or 'per-block'",
                other
            ))
        }
    };

    let broadcast = match args.broadcast.to_lowercase().as_str() {
        "all" => BroadcastMode::All,
        "half" => BroadcastMode::Sample(0.5),
        "most" => BroadcastMode::Sample(0.8),
        other => {
            return Err(eyre!(
                "unknown broadcast mode '{}'; use 'all', 'half', or 'most'",
                other
            ))
        }
    };

    Ok(SimConfig {
        consensus,
        blocks: args.blocks,
        block_cap: args.block_cap,
        num_users: args.users,
        num_builders: args.builders,
        num_validators: args.validators,
        attacker_builders: if consensus == ConsensusKind::Pbs {
            attackers
        } else {
            0
        },
        attacker_validators: if consensus == ConsensusKind::Pos {
            attackers
        } else {
            0
        },
        policy,
        reward_model,
        claim_reset,
        network: NetworkConfig {
            broadcast,
            ..NetworkConfig::default()
        },
        seed,
        ..SimConfig::default()
    })
}

/// Run one simulation to completion with a synthetic fee source derived from
/// the run seed.
fn run_one(cfg: SimConfig) -> Result<RunOutput> {
    let fees = SyntheticFeeSource::new(cfg.seed ^ 0x5eed_f00d);
    Simulation::new(cfg, fees)?.run()
}

async fn handle_simulate(args: SimulateArgs) -> Result<()> {
    let cfg = build_config(&args, args.attackers, args.seed)?;

    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::with_template("{spinner:.green} {msg}")
            .wrap_err("failed to create progress style")?,
    );
    pb.set_message(format!("simulating {} blocks", cfg.blocks));
    pb.enable_steady_tick(std::time::Duration::from_millis(100));

    let output = tokio::task::spawn_blocking(move || run_one(cfg))
        .await
        .wrap_err("simulation worker panicked")??;
    pb.finish_and_clear();

    let stats = compute_run_stats(&output.blocks);

    match args.output.to_lowercase().as_str() {
        "table" => {
            print_blocks_table(&output.blocks);
            print_summary_table(&stats);
        }
        "json" => print_run_json(&output.blocks, &stats)?,
        "csv" => print_run_csv(&output.blocks),
        other => {
            return Err(eyre!(
                "unknown output format '{}'; use 'table', 'json', or 'csv'",
                other
            ))
        }
    }

    info!(
        blocks = stats.block_count,
        skipped = stats.skipped_blocks,
        mev_captured_gwei = stats.total_mev_captured,
        finished_at = %chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
        "simulate command completed"
    );

    Ok(())
}

async fn handle_sweep(args: SweepArgs) -> Result<()> {
    let points = args.max_attackers + 1;
    let eligible = match args.base.consensus.to_lowercase().as_str() {
        "pos" => args.base.validators,
        _ => args.base.builders,
    };
    if args.max_attackers > eligible {
        return Err(eyre!(
            "max_attackers {} exceeds the {} eligible participants",
            args.max_attackers,
            eligible
        ));
    }

    let pb = ProgressBar::new(points as u64);
    pb.set_style(
        ProgressStyle::with_template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} runs")
            .wrap_err("failed to create progress style")?
            .progress_chars("#>-"),
    );

    // Each run owns fully independent state; only the summary comes back.
    let mut handles = Vec::with_capacity(points);
    for attackers in 0..points {
        let cfg = build_config(&args.base, attackers, args.base.seed + attackers as u64)?;
        handles.push(tokio::task::spawn_blocking(
            move || -> Result<(usize, RunStats)> {
                let output = run_one(cfg)?;
                Ok((attackers, compute_run_stats(&output.blocks)))
            },
        ));
    }

    let mut rows = Vec::with_capacity(points);
    for handle in handles {
        let (attackers, stats) = handle.await.wrap_err("sweep worker panicked")??;
        rows.push((attackers, stats));
        pb.inc(1);
    }
    pb.finish_and_clear();
    rows.sort_by_key(|(attackers, _)| *attackers);

    match args.base.output.to_lowercase().as_str() {
        "json" => {
            #[derive(serde::Serialize)]
            struct SweepPoint<'a> {
                attackers: usize,
                stats: &'a RunStats,
            }
            let points: Vec<SweepPoint<'_>> = rows
                .iter()
                .map(|(attackers, stats)| SweepPoint {
                    attackers: *attackers,
                    stats,
                })
                .collect();
            let json =
                serde_json::to_string_pretty(&points).wrap_err("failed to serialize sweep")?;
            println!("{json}");
        }
        _ => {
            let mut table = Table::new();
            table.load_preset(UTF8_BORDERS_ONLY);
            table.set_header(vec![
                "Attackers",
                "MEV Captured (Gwei)",
                "Gas Fees (Gwei)",
                "Skipped",
                "Final Gini",
                "Final HHI",
                "Top-1 Share",
            ]);
            for (attackers, stats) in &rows {
                table.add_row(vec![
                    attackers.to_string(),
                    stats.total_mev_captured.to_string(),
                    stats.total_gas_fee.to_string(),
                    stats.skipped_blocks.to_string(),
                    format!("{:.4}", stats.final_gini),
                    format!("{:.4}", stats.final_hhi),
                    format!("{:.4}", stats.final_top1_share),
                ]);
            }
            println!("\n{table}\n");
        }
    }

    info!(runs = rows.len(), "sweep command completed");
    Ok(())
}

fn print_blocks_table(records: &[BlockRecord]) {
    let mut table = Table::new();
    table.load_preset(UTF8_BORDERS_ONLY);
    table.set_header(vec![
        "Block", "Winner", "Type", "Txs", "Gas (Gwei)", "MEV (Gwei)", "Bid (Gwei)", "Gini",
    ]);

    for record in records.iter().take(20) {
        let (winner, kind) = match record.winner {
            Some(winner) => (winner.id.to_string(), winner.kind.to_string()),
            None => ("-".to_string(), "skipped".to_string()),
        };
        let bid = record
            .winning_bid
            .map(|b| b.to_string())
            .unwrap_or_else(|| "-".to_string());
        let block_gini = gini(&to_f64(&record.stake_snapshot));

        table.add_row(vec![
            record.block_number.to_string(),
            winner,
            kind,
            record.tx_count().to_string(),
            record.total_gas_fee.to_string(),
            record.total_mev_captured.to_string(),
            bid,
            format!("{block_gini:.4}"),
        ]);
    }

    println!("\n{table}");
    if records.len() > 20 {
        println!("(showing first 20 of {} blocks)", records.len());
    }
}

fn print_summary_table(stats: &RunStats) {
    let mut table = Table::new();
    table.load_preset(UTF8_BORDERS_ONLY);
    table.set_header(vec!["Metric", "Value"]);

    table.add_row(vec!["Blocks", &stats.block_count.to_string()]);
    table.add_row(vec!["Skipped slots", &stats.skipped_blocks.to_string()]);
    table.add_row(vec!["Included txs", &stats.txs_included.to_string()]);
    table.add_row(vec!["Gas fees (Gwei)", &stats.total_gas_fee.to_string()]);
    table.add_row(vec![
        "MEV captured (Gwei)",
        &stats.total_mev_captured.to_string(),
    ]);
    table.add_row(vec![
        "Attacks included",
        &stats.attacks_included.to_string(),
    ]);
    table.add_row(vec![
        "Failed attacks",
        &stats.failed_attacks_included.to_string(),
    ]);
    table.add_row(vec!["Final Gini", &format!("{:.4}", stats.final_gini)]);
    table.add_row(vec!["Final HHI", &format!("{:.4}", stats.final_hhi)]);
    table.add_row(vec![
        "Top-1 share",
        &format!("{:.4}", stats.final_top1_share),
    ]);
    table.add_row(vec![
        "Mean block Gini",
        &format!("{:.4}", stats.mean_block_gini),
    ]);

    println!("{table}\n");
}

fn print_run_json(records: &[BlockRecord], stats: &RunStats) -> Result<()> {
    #[derive(serde::Serialize)]
    struct JsonOutput<'a> {
        blocks: &'a [BlockRecord],
        summary: &'a RunStats,
    }

    let output = JsonOutput {
        blocks: records,
        summary: stats,
    };
    let json = serde_json::to_string_pretty(&output).wrap_err("failed to serialize JSON")?;
    println!("{json}");
    Ok(())
}

fn print_run_csv(records: &[BlockRecord]) {
    println!(
        "block_number,winner_id,winner_type,txs,total_gas_fee,total_mev_captured,winning_bid,gini"
    );

    for record in records {
        let (winner, kind) = match record.winner {
            Some(winner) => (winner.id.to_string(), winner.kind.to_string()),
            None => (String::new(), String::new()),
        };
        let bid = record
            .winning_bid
            .map(|b| b.to_string())
            .unwrap_or_default();
        let block_gini = gini(&to_f64(&record.stake_snapshot));

        println!(
            "{},{},{},{},{},{},{},{}",
            record.block_number,
            winner,
            kind,
            record.tx_count(),
            record.total_gas_fee,
            record.total_mev_captured,
            bid,
            block_gini,
        );
    }
}

//! Shared test helpers and utilities.
//!
//! Provides factory functions for small, fully deterministic simulation
//! configurations and fee sources with sensible defaults.

#![allow(dead_code)]

use market_sim::{RunOutput, Simulation};
use market_types::config::{ConsensusKind, NetworkConfig, SimConfig, StakeConfig};
use market_types::fees::{FeeSample, ReplayFeeSource, SyntheticFeeSource};

/// 32 ETH in Gwei, the default validator threshold.
pub const THRESHOLD: u64 = 32_000_000_000;

/// Creates a small PBS configuration with deterministic, fast-settling
/// gossip (unit latency, full fan-out).
///
/// # Arguments
/// * `attackers` - Number of attacking builders (of 3 total)
pub fn small_pbs_config(attackers: usize) -> SimConfig {
    SimConfig {
        consensus: ConsensusKind::Pbs,
        blocks: 20,
        block_cap: 12,
        num_users: 8,
        num_builders: 3,
        attacker_builders: attackers,
        user_txs_per_block: 2,
        network: NetworkConfig {
            latency_mean: 1.0,
            latency_std: 0.0,
            ..NetworkConfig::default()
        },
        seed: 1234,
        ..SimConfig::default()
    }
}

/// Creates a small PoS configuration where every validator starts with
/// exactly one whole validator slot.
pub fn small_pos_config(attackers: usize) -> SimConfig {
    SimConfig {
        consensus: ConsensusKind::Pos,
        blocks: 20,
        block_cap: 12,
        num_users: 8,
        num_validators: 4,
        attacker_validators: attackers,
        user_txs_per_block: 2,
        network: NetworkConfig {
            latency_mean: 1.0,
            latency_std: 0.0,
            ..NetworkConfig::default()
        },
        stake: StakeConfig {
            initial_capital: THRESHOLD,
            ..StakeConfig::default()
        },
        seed: 1234,
        ..SimConfig::default()
    }
}

/// Runs a configuration against the synthetic fee source and returns the
/// full output. Panics on setup or run failure (test configurations are
/// expected to be valid).
pub fn run_with_synthetic_fees(cfg: SimConfig) -> RunOutput {
    let fees = SyntheticFeeSource::new(cfg.seed ^ 0xfee5);
    Simulation::new(cfg, fees)
        .expect("test config should pass validation")
        .run()
        .expect("test run should complete")
}

/// Runs a configuration against a replayed sample list where every third
/// transaction carries MEV potential. The list is sized to cover the whole
/// run, so attack behavior is deterministic by construction.
pub fn run_with_mev_heavy_fees(cfg: SimConfig) -> RunOutput {
    let want = (cfg.blocks as usize) * cfg.num_users * cfg.user_txs_per_block;
    let samples: Vec<FeeSample> = (0..want)
        .map(|i| FeeSample {
            gas_fee: (i as u64 * 7) % 90 + 10,
            mev_potential: if i % 3 == 0 { (i as u64 % 50) + 25 } else { 0 },
        })
        .collect();

    let fees = ReplayFeeSource::new(samples);
    Simulation::new(cfg, fees)
        .expect("test config should pass validation")
        .run()
        .expect("test run should complete")
}

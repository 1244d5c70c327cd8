//! Run-level aggregation over the emitted block records.

use std::collections::BTreeMap;

use market_sim::RunOutput;
use market_types::{BlockRecord, ParticipantId, TxKind};
use serde::{Deserialize, Serialize};

use crate::metrics::{gini, hhi, to_f64, top_k_share};

/// Aggregated statistics over one run's block sequence.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RunStats {
    /// Block records aggregated.
    pub block_count: usize,
    /// Slots that resolved without a winner.
    pub skipped_blocks: usize,
    /// Total included transactions.
    pub txs_included: usize,
    /// Sum of included gas fees in Gwei.
    pub total_gas_fee: u64,
    /// Sum of captured MEV in Gwei.
    pub total_mev_captured: u64,
    /// Included live attacks.
    pub attacks_included: usize,
    /// Included failed attacks (slot wasted, no revenue).
    pub failed_attacks_included: usize,
    /// Blocks won per participant.
    pub blocks_won: BTreeMap<ParticipantId, u64>,
    /// Gini over the final stake snapshot.
    pub final_gini: f64,
    /// HHI over the final stake snapshot.
    pub final_hhi: f64,
    /// Share of the largest holder in the final snapshot.
    pub final_top1_share: f64,
    /// Mean per-block Gini across the run.
    pub mean_block_gini: f64,
}

/// Aggregate summary statistics across one run's block records.
pub fn compute_run_stats(records: &[BlockRecord]) -> RunStats {
    let block_count = records.len();
    let skipped_blocks = records.iter().filter(|r| r.is_skipped()).count();

    let txs_included = records.iter().map(BlockRecord::tx_count).sum();
    let total_gas_fee = records.iter().map(|r| r.total_gas_fee).sum();
    let total_mev_captured = records.iter().map(|r| r.total_mev_captured).sum();

    let attacks_included = records
        .iter()
        .flat_map(|r| r.included.iter())
        .filter(|tx| tx.kind == TxKind::Attack)
        .count();
    let failed_attacks_included = records
        .iter()
        .flat_map(|r| r.included.iter())
        .filter(|tx| tx.kind == TxKind::Failed)
        .count();

    let mut blocks_won: BTreeMap<ParticipantId, u64> = BTreeMap::new();
    for record in records {
        if let Some(winner) = record.winner {
            *blocks_won.entry(winner.id).or_default() += 1;
        }
    }

    let final_snapshot = records
        .last()
        .map(|r| to_f64(&r.stake_snapshot))
        .unwrap_or_default();
    let final_gini = gini(&final_snapshot);
    let final_hhi = hhi(&final_snapshot);
    let final_top1_share = top_k_share(&final_snapshot, 1);

    let mean_block_gini = if block_count == 0 {
        0.0
    } else {
        records
            .iter()
            .map(|r| gini(&to_f64(&r.stake_snapshot)))
            .sum::<f64>()
            / block_count as f64
    };

    RunStats {
        block_count,
        skipped_blocks,
        txs_included,
        total_gas_fee,
        total_mev_captured,
        attacks_included,
        failed_attacks_included,
        blocks_won,
        final_gini,
        final_hhi,
        final_top1_share,
        mean_block_gini,
    }
}

/// Summarize a full run output.
pub fn summarize(output: &RunOutput) -> RunStats {
    compute_run_stats(&output.blocks)
}

//! Benchmarks for market-sim core components.
//!
//! Uses pre-seeded in-memory state for reproducible performance testing.
//! Run with: `cargo bench --package market-sim`

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use market_analysis::metrics::gini;
use market_sim::arena::TxArena;
use market_sim::auction::{next_bid, AuctionEngine, BidderInput};
use market_sim::claims::ClaimTable;
use market_sim::mempool::Mempool;
use market_sim::selection::build_candidate;
use market_sim::Simulation;
use market_types::config::{
    AttackRewardModel, AuctionConfig, ClaimReset, ConsensusKind, SelectionPolicy, SimConfig,
};
use market_types::fees::SyntheticFeeSource;
use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;

/// Pre-populate an arena and mempool with `count` transactions; every fifth
/// carries MEV potential.
fn seeded_mempool(count: u64) -> (TxArena, Mempool) {
    let mut arena = TxArena::new();
    let mut pool = Mempool::new();
    for i in 0..count {
        let gas_fee = (i * 37 + 13) % 100 + 1;
        let mev = if i % 5 == 0 { 50 + i % 40 } else { 0 };
        let id = arena.create_normal(gas_fee, mev, 0, 0);
        pool.insert(id);
    }
    (arena, pool)
}

/// Benchmark: greedy selection over a 200-transaction mempool.
fn bench_greedy_selection_200_txs(c: &mut Criterion) {
    c.bench_function("greedy_selection_200_txs", |b| {
        b.iter_batched(
            || seeded_mempool(200),
            |(mut arena, pool)| {
                let mut claims = ClaimTable::new(ClaimReset::PerRun);
                let mut rng = ChaCha20Rng::seed_from_u64(0);
                build_candidate(
                    &mut arena,
                    black_box(&pool),
                    SelectionPolicy::Greedy,
                    false,
                    1,
                    0,
                    30,
                    AttackRewardModel::BuilderDonates,
                    &mut claims,
                    &mut rng,
                )
            },
            criterion::BatchSize::SmallInput,
        );
    });
}

/// Benchmark: attacker selection with claim bookkeeping over 200 txs.
fn bench_attacker_selection_200_txs(c: &mut Criterion) {
    c.bench_function("attacker_selection_200_txs", |b| {
        b.iter_batched(
            || seeded_mempool(200),
            |(mut arena, pool)| {
                let mut claims = ClaimTable::new(ClaimReset::PerRun);
                let mut rng = ChaCha20Rng::seed_from_u64(0);
                build_candidate(
                    &mut arena,
                    black_box(&pool),
                    SelectionPolicy::Greedy,
                    true,
                    1,
                    0,
                    30,
                    AttackRewardModel::BuilderDonates,
                    &mut claims,
                    &mut rng,
                )
            },
            criterion::BatchSize::SmallInput,
        );
    });
}

/// Benchmark: a full 24-round auction across 10 builders.
fn bench_auction_10_builders(c: &mut Criterion) {
    let bidders: Vec<BidderInput> = (0..10)
        .map(|i| BidderInput {
            builder: i,
            value: 1_000 + (i as u64) * 137,
        })
        .collect();

    c.bench_function("auction_10_builders", |b| {
        b.iter_batched(
            || {
                (
                    AuctionEngine::new(&AuctionConfig::default()),
                    ChaCha20Rng::seed_from_u64(7),
                )
            },
            |(mut engine, mut rng)| engine.run(black_box(&bidders), &mut rng),
            criterion::BatchSize::SmallInput,
        );
    });
}

/// Benchmark: the bid ladder itself, 10k calls.
fn bench_bid_ladder(c: &mut Criterion) {
    c.bench_function("bid_ladder_10k_calls", |b| {
        b.iter(|| {
            for i in 0..10_000u64 {
                let prior = [i % 500, (i * 3) % 500];
                next_bid(black_box(Some(i % 400)), black_box(500), black_box(&prior));
            }
        });
    });
}

/// Benchmark: Gini over a 1000-entry stake snapshot.
fn bench_gini_1000_entries(c: &mut Criterion) {
    let values: Vec<f64> = (0..1000).map(|i| ((i * 31) % 997) as f64).collect();
    c.bench_function("gini_1000_entries", |b| {
        b.iter(|| gini(black_box(&values)));
    });
}

/// Benchmark: a complete 20-block PBS run at small scale.
fn bench_small_pbs_run(c: &mut Criterion) {
    let cfg = SimConfig {
        consensus: ConsensusKind::Pbs,
        blocks: 20,
        block_cap: 15,
        num_users: 10,
        num_builders: 4,
        attacker_builders: 1,
        seed: 3,
        ..SimConfig::default()
    };

    c.bench_function("pbs_run_20_blocks", |b| {
        b.iter_batched(
            || {
                Simulation::new(cfg.clone(), SyntheticFeeSource::new(3))
                    .expect("bench config is valid")
            },
            |sim| sim.run().expect("bench run succeeds"),
            criterion::BatchSize::SmallInput,
        );
    });
}

criterion_group!(
    benches,
    bench_greedy_selection_200_txs,
    bench_attacker_selection_200_txs,
    bench_auction_10_builders,
    bench_bid_ladder,
    bench_gini_1000_entries,
    bench_small_pbs_run
);
criterion_main!(benches);

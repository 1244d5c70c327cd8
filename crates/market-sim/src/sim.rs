//! Per-run simulation driver.
//!
//! Single-threaded discrete-event loop advancing one block slot at a time.
//! Within a block every update happens in a fixed order (create, propagate,
//! select, resolve, update ledgers, purge), so a run is fully reproducible
//! from its seed. The claim table and the RNG stream belong to
//! exactly one run; fan-out across runs happens outside this type with
//! independent state.

use std::collections::{HashMap, HashSet};

use eyre::{eyre, Result, WrapErr};
use market_types::config::ConsensusKind;
use market_types::fees::FeeSource;
use market_types::{
    BlockRecord, ParticipantId, ParticipantKind, SimConfig, Transaction, TxId, TxKind, Winner,
};
use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;
use tracing::{debug, info};

use crate::arena::TxArena;
use crate::auction::{AuctionEngine, BidderInput};
use crate::claims::ClaimTable;
use crate::mempool::Mempool;
use crate::network::Network;
use crate::participants::Participant;
use crate::selection::{build_candidate, perceived_value, CandidateBlock};
use crate::stake::{stake_weighted_draw, validator_slots, Staker};

/// Everything a run emits: the per-slot record sequence and the full
/// transaction log, in creation order. External collaborators persist these;
/// the engine only produces them in memory.
#[derive(Clone, Debug)]
pub struct RunOutput {
    pub blocks: Vec<BlockRecord>,
    pub transactions: Vec<Transaction>,
}

/// How one slot resolved before sealing.
struct SlotResolution {
    winner: Option<Winner>,
    winning_bid: Option<u64>,
    txs: Vec<TxId>,
}

impl SlotResolution {
    fn skipped() -> Self {
        Self {
            winner: None,
            winning_bid: None,
            txs: Vec::new(),
        }
    }
}

/// One simulation run. Owns all mutable state; nothing is shared across runs.
pub struct Simulation<S> {
    cfg: SimConfig,
    fees: S,
    rng: ChaCha20Rng,
    arena: TxArena,
    network: Network,
    participants: Vec<Participant>,
    claims: ClaimTable,
    auction: AuctionEngine,
    /// PBS auctioneer, absent under PoS.
    proposer: Option<ParticipantId>,
    /// Global gossip round cursor.
    round: u64,
}

impl<S: FeeSource> Simulation<S> {
    /// Validate the configuration and assemble the run. Errors here are
    /// fatal: the run must not start.
    pub fn new(cfg: SimConfig, fees: S) -> Result<Self> {
        cfg.validate().wrap_err("invalid simulation config")?;
        if fees.is_exhausted() {
            return Err(eyre!("fee sample source is empty"));
        }

        let mut rng = ChaCha20Rng::seed_from_u64(cfg.seed);
        let threshold = cfg.stake.validator_threshold;
        let reinvest = cfg.stake.reinvestment_factor;

        let mut participants = Vec::with_capacity(cfg.participant_count());
        for _ in 0..cfg.num_users {
            let id = participants.len();
            participants.push(Participant::new(
                id,
                ParticipantKind::User,
                false,
                cfg.policy,
                Staker::new(0, threshold, reinvest),
            ));
        }

        let mut proposer = None;
        match cfg.consensus {
            ConsensusKind::Pbs => {
                for i in 0..cfg.num_builders {
                    let id = participants.len();
                    participants.push(Participant::new(
                        id,
                        ParticipantKind::Builder,
                        i < cfg.attacker_builders,
                        cfg.policy,
                        // Builders start with no capital; it tracks profit.
                        Staker::new(0, threshold, reinvest),
                    ));
                }
                let id = participants.len();
                participants.push(Participant::new(
                    id,
                    ParticipantKind::Proposer,
                    false,
                    cfg.policy,
                    Staker::new(0, threshold, reinvest),
                ));
                proposer = Some(id);
            }
            ConsensusKind::Pos => {
                for i in 0..cfg.num_validators {
                    let id = participants.len();
                    participants.push(Participant::new(
                        id,
                        ParticipantKind::Validator,
                        i < cfg.attacker_validators,
                        cfg.policy,
                        Staker::new(cfg.stake.initial_capital, threshold, reinvest),
                    ));
                }
            }
        }

        let network = Network::build(participants.len(), &cfg.network, &mut rng);
        let claims = ClaimTable::new(cfg.claim_reset);
        let auction = AuctionEngine::new(&cfg.auction);

        Ok(Self {
            cfg,
            fees,
            rng,
            arena: TxArena::new(),
            network,
            participants,
            claims,
            auction,
            proposer,
            round: 0,
        })
    }

    /// Participants in id order (read-only view for inspection).
    pub fn participants(&self) -> &[Participant] {
        &self.participants
    }

    /// Drive the run to completion.
    pub fn run(mut self) -> Result<RunOutput> {
        info!(
            consensus = ?self.cfg.consensus,
            blocks = self.cfg.blocks,
            participants = self.participants.len(),
            seed = self.cfg.seed,
            "starting run"
        );

        let mut blocks = Vec::with_capacity(self.cfg.blocks as usize);
        for block in 0..self.cfg.blocks {
            let record = self
                .step_block(block)
                .wrap_err_with(|| format!("block {block} failed"))?;
            blocks.push(record);
        }

        info!(
            blocks = blocks.len(),
            transactions = self.arena.len(),
            skipped = blocks.iter().filter(|b| b.is_skipped()).count(),
            "run completed"
        );

        Ok(RunOutput {
            blocks,
            transactions: self.arena.into_transactions(),
        })
    }

    fn step_block(&mut self, block: u64) -> Result<BlockRecord> {
        self.create_and_gossip(block);
        self.advance_gossip();

        let resolution = match self.cfg.consensus {
            ConsensusKind::Pbs => self.resolve_pbs(block)?,
            ConsensusKind::Pos => self.resolve_pos(block)?,
        };

        self.seal_block(block, resolution)
    }

    /// Users create this block's transactions and gossip them from their own
    /// node. The fee source may run short or dry; both are tolerated.
    fn create_and_gossip(&mut self, block: u64) {
        let want = self.cfg.num_users * self.cfg.user_txs_per_block;
        let samples = self.fees.sample(want);
        if samples.len() < want {
            debug!(
                block,
                requested = want,
                received = samples.len(),
                "fee source running short"
            );
        }

        for (i, sample) in samples.into_iter().enumerate() {
            let user = i % self.cfg.num_users;
            let tx = self
                .arena
                .create_normal(sample.gas_fee, sample.mev_potential, user, block);
            self.participants[user].mempool.insert(tx);
            self.network.broadcast(tx, user, self.round, &mut self.rng);
        }
    }

    /// Advance the gossip clock by one block's worth of rounds, applying due
    /// deliveries to mempools and letting first receipts re-forward.
    fn advance_gossip(&mut self) {
        let until = self.round + self.cfg.network.rounds_per_block;
        for round in (self.round + 1)..=until {
            for delivery in self.network.poll_due(round) {
                if self.network.accept(delivery) {
                    self.participants[delivery.to].mempool.insert(delivery.tx);
                }
            }
        }
        self.round = until;
    }

    /// Build every builder's candidate list, then sell the slot by auction.
    fn resolve_pbs(&mut self, block: u64) -> Result<SlotResolution> {
        let builder_ids: Vec<ParticipantId> = self
            .participants
            .iter()
            .filter(|p| p.kind == ParticipantKind::Builder)
            .map(|p| p.id)
            .collect();

        let mut candidates: HashMap<ParticipantId, CandidateBlock> = HashMap::new();
        let mut bidders = Vec::with_capacity(builder_ids.len());
        for &id in &builder_ids {
            let candidate = self.build_for(id, block);
            let value = perceived_value(&self.arena, &candidate.txs);
            bidders.push(BidderInput { builder: id, value });
            candidates.insert(id, candidate);
        }

        let Some(outcome) = self.auction.run(&bidders, &mut self.rng) else {
            debug!(block, "auction closed without a winner; slot skipped");
            return Ok(SlotResolution::skipped());
        };

        // A winning bid must map back to a bidder we hold a candidate for;
        // anything else would corrupt the stake updates.
        let candidate = candidates.remove(&outcome.winner).ok_or_else(|| {
            eyre!(
                "winning bid {} has no matching builder {}",
                outcome.winning_bid,
                outcome.winner
            )
        })?;

        Ok(SlotResolution {
            winner: Some(Winner {
                id: outcome.winner,
                kind: ParticipantKind::Builder,
            }),
            winning_bid: Some(outcome.winning_bid),
            txs: candidate.txs,
        })
    }

    /// Every validator builds a candidate, then the slot goes to a
    /// stake-weighted draw.
    fn resolve_pos(&mut self, block: u64) -> Result<SlotResolution> {
        let validator_ids: Vec<ParticipantId> = self
            .participants
            .iter()
            .filter(|p| p.kind == ParticipantKind::Validator)
            .map(|p| p.id)
            .collect();

        let mut candidates: HashMap<ParticipantId, CandidateBlock> = HashMap::new();
        for &id in &validator_ids {
            let candidate = self.build_for(id, block);
            candidates.insert(id, candidate);
        }

        let stakers: Vec<(ParticipantId, &Staker)> = validator_ids
            .iter()
            .map(|&id| (id, &self.participants[id].staker))
            .collect();
        let slots = validator_slots(&stakers);
        if slots.len() < self.cfg.stake.min_validator_nodes {
            debug!(
                block,
                slots = slots.len(),
                required = self.cfg.stake.min_validator_nodes,
                "no qualifying validator; slot skipped"
            );
            return Ok(SlotResolution::skipped());
        }

        let Some(winner) = stake_weighted_draw(&slots, &mut self.rng) else {
            return Ok(SlotResolution::skipped());
        };

        let candidate = candidates
            .remove(&winner)
            .ok_or_else(|| eyre!("drawn proposer {winner} has no candidate block"))?;
        if candidate.txs.is_empty() {
            debug!(block, winner, "empty candidate block; slot skipped");
            return Ok(SlotResolution::skipped());
        }

        Ok(SlotResolution {
            winner: Some(Winner {
                id: winner,
                kind: ParticipantKind::Validator,
            }),
            winning_bid: None,
            txs: candidate.txs,
        })
    }

    fn build_for(&mut self, id: ParticipantId, block: u64) -> CandidateBlock {
        let (policy, is_attacker) = {
            let p = &self.participants[id];
            (p.policy, p.is_attacker)
        };
        // The mempool borrow is disjoint from the arena/claims/rng borrows.
        let mempool: &Mempool = &self.participants[id].mempool;
        build_candidate(
            &mut self.arena,
            mempool,
            policy,
            is_attacker,
            id,
            block,
            self.cfg.block_cap,
            self.cfg.reward_model,
            &mut self.claims,
            &mut self.rng,
        )
    }

    /// Mark inclusions, settle payments, purge mempools, and emit the record.
    fn seal_block(&mut self, block: u64, resolution: SlotResolution) -> Result<BlockRecord> {
        let mut included_ids: HashSet<TxId> = HashSet::new();
        let mut total_gas_fee = 0u64;
        let mut total_mev_captured = 0u64;

        for (position, &tx_id) in resolution.txs.iter().enumerate() {
            if !self.arena.mark_included(tx_id, block, position as u32) {
                continue;
            }
            included_ids.insert(tx_id);

            let tx = self.arena.get(tx_id);
            total_gas_fee = total_gas_fee.saturating_add(tx.gas_fee);
            if tx.kind == TxKind::Attack {
                if let Some(target) = tx.target {
                    total_mev_captured =
                        total_mev_captured.saturating_add(self.arena.get(target).mev_potential);
                }
            }
        }

        match (self.cfg.consensus, resolution.winner) {
            (_, None) => {}
            (ConsensusKind::Pbs, Some(winner)) => {
                let bid = resolution
                    .winning_bid
                    .ok_or_else(|| eyre!("PBS winner {} without a winning bid", winner.id))?;
                let proposer = self
                    .proposer
                    .ok_or_else(|| eyre!("PBS run without a proposer"))?;
                self.participants[proposer].staker.update_stake(bid);

                let revenue = total_gas_fee.saturating_add(total_mev_captured);
                let profit = revenue.saturating_sub(bid);
                self.participants[winner.id].staker.update_stake(profit);
            }
            (ConsensusKind::Pos, Some(winner)) => {
                let reward = total_gas_fee.saturating_add(total_mev_captured);
                self.participants[winner.id].staker.update_stake(reward);
            }
        }

        let staleness = self.cfg.staleness_horizon;
        for participant in &mut self.participants {
            participant.mempool.remove_included(&included_ids);
            participant
                .mempool
                .purge_stale(&self.arena, block, staleness);
        }
        self.claims.end_of_block();

        let stake_snapshot: Vec<u64> = self
            .participants
            .iter()
            .filter(|p| p.builds_blocks())
            .map(|p| match self.cfg.consensus {
                ConsensusKind::Pos => p.staker.active_stake,
                ConsensusKind::Pbs => p.staker.capital,
            })
            .collect();

        let included: Vec<Transaction> = resolution
            .txs
            .iter()
            .filter(|id| included_ids.contains(id))
            .map(|&id| self.arena.get(id).clone())
            .collect();

        Ok(BlockRecord {
            block_number: block,
            winner: resolution.winner,
            winning_bid: resolution.winning_bid,
            included,
            total_gas_fee,
            total_mev_captured,
            stake_snapshot,
        })
    }
}

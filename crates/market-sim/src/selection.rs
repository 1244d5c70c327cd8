//! Selection & attack engine.
//!
//! Turns a mempool into an ordered inclusion list under a policy. Attackers
//! order by `gas_fee + mev_potential` and synthesize a front- or back-run
//! around each still-unclaimed profitable target, registering the claim so no
//! one else attacks it; an attack whose target is already claimed is created
//! failed with zeroed economics and still occupies a slot. Target and attack
//! count together toward the block cap.

use market_types::config::{AttackRewardModel, SelectionPolicy};
use market_types::{AttackKind, ParticipantId, TxId, TxKind};
use rand::seq::SliceRandom;
use rand::Rng;

use crate::arena::TxArena;
use crate::claims::ClaimTable;
use crate::mempool::Mempool;

/// Ordered inclusion list produced for one builder and one slot.
#[derive(Clone, Debug, Default)]
pub struct CandidateBlock {
    /// Transactions in block order, capped at the block capacity.
    pub txs: Vec<TxId>,
    /// Live attacks synthesized while building this list.
    pub attacks_created: usize,
    /// Attacks created failed because their target was already claimed.
    pub failed_attacks: usize,
}

/// Build the inclusion list for one participant.
///
/// Non-attackers order the mempool per `policy` and truncate at `cap`.
/// Attackers inject attack transactions; the claim table decides races.
#[allow(clippy::too_many_arguments)]
pub fn build_candidate<R: Rng>(
    arena: &mut TxArena,
    mempool: &Mempool,
    policy: SelectionPolicy,
    is_attacker: bool,
    builder: ParticipantId,
    block: u64,
    cap: usize,
    reward: AttackRewardModel,
    claims: &mut ClaimTable,
    rng: &mut R,
) -> CandidateBlock {
    let mut pending: Vec<TxId> = mempool
        .ids()
        .iter()
        .copied()
        .filter(|&id| arena.get(id).included_at.is_none())
        .collect();

    if is_attacker {
        return build_attacker_candidate(arena, pending, builder, block, cap, reward, claims, rng);
    }

    match policy {
        SelectionPolicy::Greedy => {
            pending.sort_by(|&a, &b| {
                arena
                    .get(b)
                    .gas_fee
                    .cmp(&arena.get(a).gas_fee)
                    .then(a.cmp(&b))
            });
        }
        SelectionPolicy::Fcfs => {
            pending.sort_by_key(|&id| (arena.get(id).created_at, id));
        }
        SelectionPolicy::Random => {
            pending.shuffle(rng);
        }
    }
    pending.truncate(cap);

    CandidateBlock {
        txs: pending,
        attacks_created: 0,
        failed_attacks: 0,
    }
}

/// Attacker path: fee+mev ordering with front/back-run injection.
#[allow(clippy::too_many_arguments)]
fn build_attacker_candidate<R: Rng>(
    arena: &mut TxArena,
    mut pending: Vec<TxId>,
    builder: ParticipantId,
    block: u64,
    cap: usize,
    reward: AttackRewardModel,
    claims: &mut ClaimTable,
    rng: &mut R,
) -> CandidateBlock {
    pending.sort_by(|&a, &b| {
        let score = |id: TxId| {
            let tx = arena.get(id);
            tx.gas_fee.saturating_add(tx.mev_potential)
        };
        score(b).cmp(&score(a)).then(a.cmp(&b))
    });

    let mut out = CandidateBlock::default();

    for id in pending {
        if out.txs.len() >= cap {
            break;
        }

        let (target_fee, mev_potential) = {
            let tx = arena.get(id);
            (tx.gas_fee, tx.mev_potential)
        };

        if mev_potential == 0 {
            out.txs.push(id);
            continue;
        }

        // Target plus attack count together toward the cap; stop rather than
        // split the pair.
        if out.txs.len() + 2 > cap {
            break;
        }

        let kind = if rng.gen_bool(0.5) {
            AttackKind::Front
        } else {
            AttackKind::Back
        };

        if claims.is_claimed(id) {
            // Lost the race: the attack is synthesized failed, zeroed, and
            // still occupies its slot.
            let attack = arena.create_attack(0, builder, block, id, kind, true);
            push_pair(&mut out.txs, id, attack, kind);
            out.failed_attacks += 1;
            continue;
        }

        let fee = match kind {
            AttackKind::Front => target_fee.saturating_add(1),
            AttackKind::Back => match reward {
                AttackRewardModel::BuilderDonates => 0,
                AttackRewardModel::UserPays => target_fee.saturating_sub(1),
            },
        };
        let attack = arena.create_attack(fee, builder, block, id, kind, false);
        claims.claim(id, attack);
        push_pair(&mut out.txs, id, attack, kind);
        out.attacks_created += 1;
    }

    out
}

fn push_pair(txs: &mut Vec<TxId>, target: TxId, attack: TxId, kind: AttackKind) {
    match kind {
        AttackKind::Front => {
            txs.push(attack);
            txs.push(target);
        }
        AttackKind::Back => {
            txs.push(target);
            txs.push(attack);
        }
    }
}

/// Perceived value of an inclusion list: the sum of gas fees, plus the target
/// MEV captured by each live attack in the list.
pub fn perceived_value(arena: &TxArena, txs: &[TxId]) -> u64 {
    txs.iter()
        .map(|&id| {
            let tx = arena.get(id);
            let mev = match (tx.kind, tx.target) {
                (TxKind::Attack, Some(target)) => arena.get(target).mev_potential,
                _ => 0,
            };
            tx.gas_fee.saturating_add(mev)
        })
        .fold(0u64, u64::saturating_add)
}

//! Per-run transaction arena.
//!
//! The arena is the single owner of every transaction payload created during
//! one run. Mempools and block lists hold ids; the payload itself is shared
//! and never deleted, only dropped from mempools when stale. Ids are assigned
//! monotonically, so the arena doubles as the creation-order log.

use market_types::{AttackKind, ParticipantId, Transaction, TxId, TxKind};

/// Owner of all transaction payloads for one run.
#[derive(Debug, Default)]
pub struct TxArena {
    txs: Vec<Transaction>,
}

impl TxArena {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an ordinary user transaction and return its id.
    pub fn create_normal(
        &mut self,
        gas_fee: u64,
        mev_potential: u64,
        creator: ParticipantId,
        created_at: u64,
    ) -> TxId {
        let id = self.txs.len() as TxId;
        self.txs.push(Transaction {
            id,
            gas_fee,
            mev_potential,
            creator,
            created_at,
            included_at: None,
            position: None,
            target: None,
            attack: None,
            kind: TxKind::Normal,
        });
        id
    }

    /// Synthesize an attack transaction around `target`.
    ///
    /// A failed attack (target already claimed) is created with zeroed
    /// economics; it may still occupy a block slot but yields no revenue.
    pub fn create_attack(
        &mut self,
        gas_fee: u64,
        creator: ParticipantId,
        created_at: u64,
        target: TxId,
        attack: AttackKind,
        failed: bool,
    ) -> TxId {
        let id = self.txs.len() as TxId;
        self.txs.push(Transaction {
            id,
            gas_fee: if failed { 0 } else { gas_fee },
            mev_potential: 0,
            creator,
            created_at,
            included_at: None,
            position: None,
            target: Some(target),
            attack: Some(attack),
            kind: if failed { TxKind::Failed } else { TxKind::Attack },
        });
        id
    }

    /// Look up a transaction. Ids are issued by this arena, so an
    /// out-of-range id is a caller bug.
    pub fn get(&self, id: TxId) -> &Transaction {
        &self.txs[id as usize]
    }

    /// Set the inclusion fields. Inclusion is set-once: a second call for the
    /// same id is ignored and reported, never overwritten.
    pub fn mark_included(&mut self, id: TxId, block: u64, position: u32) -> bool {
        let tx = &mut self.txs[id as usize];
        if tx.included_at.is_some() {
            tracing::warn!(tx = id, block, "ignoring duplicate inclusion");
            return false;
        }
        tx.included_at = Some(block);
        tx.position = Some(position);
        true
    }

    pub fn len(&self) -> usize {
        self.txs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.txs.is_empty()
    }

    /// Creation-ordered view of every transaction in the run.
    pub fn transactions(&self) -> &[Transaction] {
        &self.txs
    }

    /// Consume the arena into the final transaction log.
    pub fn into_transactions(self) -> Vec<Transaction> {
        self.txs
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_monotonic_and_unique() {
        let mut arena = TxArena::new();
        let a = arena.create_normal(10, 0, 0, 0);
        let b = arena.create_normal(20, 5, 1, 0);
        let c = arena.create_attack(21, 2, 0, b, AttackKind::Front, false);

        assert_eq!((a, b, c), (0, 1, 2));
        assert_eq!(arena.len(), 3);
    }

    #[test]
    fn failed_attack_has_zeroed_economics() {
        let mut arena = TxArena::new();
        let target = arena.create_normal(10, 5, 0, 0);
        let failed = arena.create_attack(11, 1, 0, target, AttackKind::Back, true);

        let tx = arena.get(failed);
        assert_eq!(tx.kind, TxKind::Failed);
        assert_eq!(tx.gas_fee, 0);
        assert_eq!(tx.mev_potential, 0);
        assert_eq!(tx.target, Some(target));
    }

    #[test]
    fn inclusion_is_set_exactly_once() {
        let mut arena = TxArena::new();
        let id = arena.create_normal(10, 0, 0, 0);

        assert!(arena.mark_included(id, 3, 0));
        assert!(!arena.mark_included(id, 4, 1), "second inclusion ignored");

        let tx = arena.get(id);
        assert_eq!(tx.included_at, Some(3));
        assert_eq!(tx.position, Some(0));
    }
}

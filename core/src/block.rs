use serde::{Deserialize, Serialize};
use shared::Hash512;

use crate::error::LedgerError;
use crate::merkle::merkle_root;
use crate::transaction::Transaction;

/// A block. The genesis block (`index == 0`) has `previous_hash` equal to
/// the all-zero sentinel and carries no proof of work.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Block {
    pub index: u64,
    pub timestamp: f64,
    pub transactions: Vec<Transaction>,
    pub previous_hash: Hash512,
    pub merkle_root: Hash512,
    pub proof: u64,
}

/// The fields hashed to produce a block's canonical `hash`. Deliberately
/// distinct from the proof-of-work search hash (`mining::pow_input`),
/// which omits `timestamp` — the two are constructed differently and
/// must not be confused.
#[derive(Serialize)]
struct CanonicalHeader {
    index: u64,
    timestamp: f64,
    previous_hash: Hash512,
    merkle_root: Hash512,
    proof: u64,
}

impl Block {
    #[must_use]
    pub fn new(
        index: u64,
        timestamp: f64,
        transactions: Vec<Transaction>,
        previous_hash: Hash512,
        proof: u64,
    ) -> Result<Self, LedgerError> {
        let txids = transactions
            .iter()
            .map(Transaction::txid)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            index,
            timestamp,
            merkle_root: merkle_root(&txids),
            transactions,
            previous_hash,
            proof,
        })
    }

    /// Builds the genesis block: a single coinbase paying
    /// `MINER_REWARD * 1000` to `miner_address`, with `previous_hash`
    /// equal to the all-zero sentinel and no proof-of-work search (height
    /// 0 is a trust anchor, not mined).
    pub fn genesis(
        timestamp: f64,
        tx_version: u32,
        miner_address: &str,
        genesis_reward: shared::Amount,
    ) -> Result<Self, LedgerError> {
        let coinbase = Transaction::coinbase(timestamp, tx_version, miner_address, genesis_reward);
        Self::new(0, timestamp, vec![coinbase], Hash512::zero(), 0)
    }

    pub fn hash(&self) -> Result<Hash512, LedgerError> {
        let canonical = CanonicalHeader {
            index: self.index,
            timestamp: self.timestamp,
            previous_hash: self.previous_hash,
            merkle_root: self.merkle_root,
            proof: self.proof,
        };
        Ok(shared::canonical_hash(&canonical)?)
    }

    /// Recomputes the Merkle root from `self.transactions` and compares
    /// it against the stored `merkle_root` field.
    pub fn merkle_root_matches(&self) -> Result<bool, LedgerError> {
        let txids = self
            .transactions
            .iter()
            .map(Transaction::txid)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(merkle_root(&txids) == self.merkle_root)
    }

    pub fn validate_basic(&self) -> Result<(), LedgerError> {
        if self.transactions.is_empty() {
            return Err(LedgerError::Validation("block has no transactions".into()));
        }
        if !self.transactions[0].is_coinbase() {
            return Err(LedgerError::Validation(
                "first transaction is not coinbase".into(),
            ));
        }
        for tx in &self.transactions[1..] {
            if tx.is_coinbase() {
                return Err(LedgerError::Validation(
                    "multiple coinbase transactions in block".into(),
                ));
            }
        }
        for tx in &self.transactions {
            tx.validate_basic()?;
        }
        if !self.merkle_root_matches()? {
            return Err(LedgerError::Validation("merkle root mismatch".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::Amount;

    #[test]
    fn genesis_has_zero_previous_hash_and_height() {
        let genesis = Block::genesis(0.0, 1, &"m".repeat(64), Amount::from_major(10_000.0).unwrap())
            .unwrap();
        assert_eq!(genesis.index, 0);
        assert_eq!(genesis.previous_hash, Hash512::zero());
        assert_eq!(genesis.transactions.len(), 1);
        assert!(genesis.transactions[0].is_coinbase());
    }

    #[test]
    fn hash_is_deterministic() {
        let genesis = Block::genesis(0.0, 1, &"m".repeat(64), Amount::from_major(10.0).unwrap())
            .unwrap();
        assert_eq!(genesis.hash().unwrap(), genesis.hash().unwrap());
    }

    #[test]
    fn merkle_root_matches_after_honest_construction() {
        let genesis = Block::genesis(0.0, 1, &"m".repeat(64), Amount::from_major(10.0).unwrap())
            .unwrap();
        assert!(genesis.merkle_root_matches().unwrap());
    }

    #[test]
    fn validate_basic_rejects_missing_coinbase() {
        let block = Block {
            index: 1,
            timestamp: 0.0,
            transactions: vec![],
            previous_hash: Hash512::zero(),
            merkle_root: Hash512::zero(),
            proof: 0,
        };
        assert!(block.validate_basic().is_err());
    }
}

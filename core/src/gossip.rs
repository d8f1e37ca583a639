//! Pure, synchronous decision logic for chain reconciliation (§4.5). The
//! actual peer I/O — fetching `/chain`, posting to `/block/receive` and
//! `/transactions/receive` — is driven by an async task elsewhere in the
//! workspace; everything here is plain, lock-free, and testable without a
//! runtime.

use shared::Hash512;

use crate::block::Block;
use crate::merkle::merkle_root;

/// Checks the structural-validity predicate for a foreign chain (§4.5):
/// for every block after the first, `previous_hash` links to its
/// predecessor's hash, the Merkle root matches the transaction list, and
/// the block's hash has at least one leading zero hex char. This is a
/// deliberately relaxed proof-of-work check for foreign history, since
/// no per-block difficulty target is recorded (§9).
#[must_use]
pub fn is_structurally_valid_chain(chain: &[Block]) -> bool {
    if chain.is_empty() {
        return false;
    }
    for window in chain.windows(2) {
        let (previous, current) = (&window[0], &window[1]);
        let Ok(previous_hash) = previous.hash() else {
            return false;
        };
        if current.previous_hash != previous_hash {
            return false;
        }
        let Ok(txids) = current
            .transactions
            .iter()
            .map(crate::transaction::Transaction::txid)
            .collect::<Result<Vec<_>, _>>()
        else {
            return false;
        };
        if current.merkle_root != merkle_root(&txids) {
            return false;
        }
        let Ok(hash) = current.hash() else {
            return false;
        };
        if hash.leading_zero_hex_chars() < 1 {
            return false;
        }
    }
    true
}

/// Folds one peer's chain into the running "best chain seen so far"
/// during a reconcile pass (§4.5 steps 1-3). Returns `Some` replacement
/// only if `candidate` is strictly longer than `best_len` and
/// structurally valid.
#[must_use]
pub fn consider_candidate(best_len: usize, candidate: &[Block]) -> bool {
    candidate.len() > best_len && is_structurally_valid_chain(candidate)
}

/// Decides whether an out-of-band inbound block extends the tip (§4.5
/// "Inbound block from a peer"): its `previous_hash` must equal the
/// tip's hash, and its own hash must meet the node's current difficulty.
pub fn accepts_inbound_block(
    block: &Block,
    tip_hash: Hash512,
    current_difficulty: u32,
) -> Result<bool, crate::error::LedgerError> {
    if block.previous_hash != tip_hash {
        return Ok(false);
    }
    Ok(block.hash()?.meets_difficulty(current_difficulty))
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::Amount;

    fn genesis() -> Block {
        Block::genesis(0.0, 1, &"m".repeat(64), Amount::from_major(1000.0).unwrap()).unwrap()
    }

    #[test]
    fn single_block_chain_is_valid() {
        assert!(is_structurally_valid_chain(&[genesis()]));
    }

    #[test]
    fn empty_chain_is_invalid() {
        assert!(!is_structurally_valid_chain(&[]));
    }

    #[test]
    fn tampering_with_previous_hash_breaks_validity() {
        let first = genesis();
        let mut second = genesis();
        second.index = 1;
        second.previous_hash = Hash512::sha3_512(b"not the real previous hash");
        assert!(!is_structurally_valid_chain(&[first, second]));
    }

    #[test]
    fn consider_candidate_requires_strictly_longer_and_valid() {
        let chain = vec![genesis()];
        assert!(!consider_candidate(1, &chain));
        assert!(consider_candidate(0, &chain));
    }

    #[test]
    fn inbound_block_must_extend_the_tip() {
        let genesis = genesis();
        // genesis.previous_hash is the zero sentinel, so it "extends" a
        // tip whose hash is the zero sentinel...
        assert!(accepts_inbound_block(&genesis, Hash512::zero(), 0).unwrap());
        // ...but not some other tip.
        let unrelated_tip_hash = Hash512::sha3_512(b"some other tip");
        assert!(!accepts_inbound_block(&genesis, unrelated_tip_hash, 0).unwrap());
    }
}

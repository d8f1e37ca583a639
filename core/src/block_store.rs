use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use shared::Hash512;

use crate::block::Block;
use crate::error::LedgerError;

/// A known peer's base URL, last-contact timestamp, and reputation. The
/// `reputation` column is carried for forward compatibility but nothing
/// in this implementation reads or writes it beyond the default (see
/// DESIGN.md — broadcast is fire-and-forget and there is no scoring).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PeerRecord {
    pub address: String,
    pub last_seen: f64,
    pub reputation: i32,
}

const DEFAULT_REPUTATION: i32 = 10;

#[derive(Default)]
struct BlockStoreInner {
    blocks: Vec<Block>,
    hashes: HashSet<Hash512>,
    peers: HashMap<String, PeerRecord>,
}

/// Stable store of blocks keyed by height, with a side table of known
/// peers. Guarded by a single mutex, independent of the UTXO store's
/// lock so the two can be read concurrently.
#[derive(Default)]
pub struct BlockStore {
    inner: Mutex<BlockStoreInner>,
}

impl BlockStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `block`. Fails with `AlreadyExists` if a block at this
    /// height is already stored, or if its hash collides with one
    /// already present.
    pub fn append(&self, block: Block) -> Result<(), LedgerError> {
        let hash = block.hash()?;
        let mut guard = self.inner.lock().expect("block store mutex poisoned");
        if guard.blocks.len() as u64 != block.index {
            return Err(LedgerError::AlreadyExists);
        }
        if guard.hashes.contains(&hash) {
            return Err(LedgerError::AlreadyExists);
        }
        guard.hashes.insert(hash);
        guard.blocks.push(block);
        Ok(())
    }

    #[must_use]
    pub fn load_last(&self) -> Option<Block> {
        let guard = self.inner.lock().expect("block store mutex poisoned");
        guard.blocks.last().cloned()
    }

    #[must_use]
    pub fn load_all(&self) -> Vec<Block> {
        let guard = self.inner.lock().expect("block store mutex poisoned");
        guard.blocks.clone()
    }

    /// Drops every stored block. Used only as part of the atomic
    /// clear-and-rewrite sequence during chain replacement.
    pub fn clear(&self) {
        let mut guard = self.inner.lock().expect("block store mutex poisoned");
        guard.blocks.clear();
        guard.hashes.clear();
    }

    pub fn upsert_peer(&self, address: &str, last_seen: f64) {
        let mut guard = self.inner.lock().expect("block store mutex poisoned");
        guard
            .peers
            .entry(address.to_string())
            .and_modify(|peer| peer.last_seen = last_seen)
            .or_insert_with(|| PeerRecord {
                address: address.to_string(),
                last_seen,
                reputation: DEFAULT_REPUTATION,
            });
    }

    #[must_use]
    pub fn list_peers(&self) -> Vec<PeerRecord> {
        let guard = self.inner.lock().expect("block store mutex poisoned");
        guard.peers.values().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::Amount;

    fn genesis() -> Block {
        Block::genesis(0.0, 1, &"m".repeat(64), Amount::from_major(1000.0).unwrap()).unwrap()
    }

    #[test]
    fn append_then_load_round_trips() {
        let store = BlockStore::new();
        store.append(genesis()).unwrap();
        assert_eq!(store.load_all().len(), 1);
        assert_eq!(store.load_last().unwrap().index, 0);
    }

    #[test]
    fn append_rejects_height_collision() {
        let store = BlockStore::new();
        store.append(genesis()).unwrap();
        let err = store.append(genesis()).unwrap_err();
        assert_eq!(err, LedgerError::AlreadyExists);
    }

    #[test]
    fn clear_empties_the_chain() {
        let store = BlockStore::new();
        store.append(genesis()).unwrap();
        store.clear();
        assert!(store.load_all().is_empty());
    }

    #[test]
    fn peer_upsert_updates_last_seen_without_duplicating() {
        let store = BlockStore::new();
        store.upsert_peer("http://peer-a", 1.0);
        store.upsert_peer("http://peer-a", 2.0);
        let peers = store.list_peers();
        assert_eq!(peers.len(), 1);
        assert_eq!(peers[0].last_seen, 2.0);
        assert_eq!(peers[0].reputation, DEFAULT_REPUTATION);
    }
}

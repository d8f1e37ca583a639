use std::collections::HashMap;
use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use shared::{Amount, Hash512};

/// Identifies a transaction output: `(txid, output_index)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OutPoint {
    pub txid: Hash512,
    pub output_index: u32,
}

impl OutPoint {
    #[must_use]
    pub fn new(txid: Hash512, output_index: u32) -> Self {
        Self { txid, output_index }
    }
}

/// A single UTXO record. Spending never removes a row — it sets
/// `spent_txid`/`spent_index`, which is also the predicate `is_spent`
/// checks. This mirrors the persisted-state shape in the external
/// interface sketch even though the store backing it is in-memory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UtxoRecord {
    pub txid: Hash512,
    pub output_index: u32,
    pub address: String,
    pub amount: Amount,
    pub spent_txid: Option<Hash512>,
    pub spent_index: Option<i64>,
}

impl UtxoRecord {
    #[must_use]
    pub fn new_unspent(txid: Hash512, output_index: u32, address: String, amount: Amount) -> Self {
        Self {
            txid,
            output_index,
            address,
            amount,
            spent_txid: None,
            spent_index: None,
        }
    }

    #[must_use]
    pub fn is_spent(&self) -> bool {
        self.spent_txid.is_some()
    }

    #[must_use]
    pub fn outpoint(&self) -> OutPoint {
        OutPoint::new(self.txid, self.output_index)
    }
}

/// The UTXO index: every output ever produced, keyed by `(txid,
/// output_index)`, each carrying its own spent marker. Guarded by a
/// single mutex — the hot path is proof-of-work and network I/O, not
/// store throughput, so one lock per store is coarse-grained but
/// sufficient.
#[derive(Default)]
pub struct UtxoStore {
    records: Mutex<HashMap<OutPoint, UtxoRecord>>,
}

impl UtxoStore {
    #[must_use]
    pub fn new() -> Self {
        Self {
            records: Mutex::new(HashMap::new()),
        }
    }

    /// Inserts newly produced outputs. Duplicates (same outpoint already
    /// present) are silently ignored, matching an idempotent replay.
    pub fn add(&self, records: impl IntoIterator<Item = UtxoRecord>) {
        let mut guard = self.records.lock().expect("utxo store mutex poisoned");
        for record in records {
            guard.entry(record.outpoint()).or_insert(record);
        }
    }

    /// The double-spend guard: marks `(txid, output_index)` spent by
    /// `(spender_txid, spender_input_index)` only if it is currently
    /// unspent, atomically. Returns whether the row actually changed.
    pub fn mark_spent(
        &self,
        txid: Hash512,
        output_index: u32,
        spender_txid: Hash512,
        spender_input_index: i64,
    ) -> bool {
        let mut guard = self.records.lock().expect("utxo store mutex poisoned");
        match guard.get_mut(&OutPoint::new(txid, output_index)) {
            Some(record) if !record.is_spent() => {
                record.spent_txid = Some(spender_txid);
                record.spent_index = Some(spender_input_index);
                true
            }
            _ => false,
        }
    }

    #[must_use]
    pub fn get(&self, txid: Hash512, output_index: u32) -> Option<UtxoRecord> {
        let guard = self.records.lock().expect("utxo store mutex poisoned");
        guard.get(&OutPoint::new(txid, output_index)).cloned()
    }

    /// All currently unspent records, optionally filtered by address.
    #[must_use]
    pub fn list_unspent(&self, address: Option<&str>) -> Vec<UtxoRecord> {
        let guard = self.records.lock().expect("utxo store mutex poisoned");
        guard
            .values()
            .filter(|record| !record.is_spent())
            .filter(|record| address.map_or(true, |addr| record.address == addr))
            .cloned()
            .collect()
    }

    #[must_use]
    pub fn balance(&self, address: &str) -> Amount {
        self.list_unspent(Some(address))
            .into_iter()
            .map(|record| record.amount)
            .sum()
    }

    /// Drops every record. Used before a full chain-replay rebuild.
    pub fn clear(&self) {
        self.records.lock().expect("utxo store mutex poisoned").clear();
    }
}

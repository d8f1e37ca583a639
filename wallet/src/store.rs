use std::collections::HashMap;
use std::sync::Mutex;

use shared::{Amount, PqcScheme, PrivateKeyHex, PublicKeyHex};

use ledger_core::{Transaction, TxInput, TxOutput, UtxoStore};

use crate::error::WalletError;

struct WalletRecord {
    public_key: PublicKeyHex,
    private_key: PrivateKeyHex,
}

/// Alias-keyed key storage and transaction construction (§4.6). Not a
/// consensus component: a convenience collaborator so an end user can
/// hold funds and sign transactions without managing key material
/// directly. Storage is process-local and in-memory, matching the
/// Persistent Stores' deviation from the original's SQLite-backed
/// wallet table (DESIGN.md).
pub struct Wallet {
    scheme: Box<dyn PqcScheme>,
    records: Mutex<HashMap<String, WalletRecord>>,
}

impl Wallet {
    #[must_use]
    pub fn new(scheme: Box<dyn PqcScheme>) -> Self {
        Self {
            scheme,
            records: Mutex::new(HashMap::new()),
        }
    }

    /// Generates a fresh keypair under the configured scheme, stores it
    /// keyed by `alias`, and returns the public-key address. Rejects a
    /// duplicate alias rather than overwriting it.
    pub fn create_wallet(&self, alias: &str) -> Result<String, WalletError> {
        let mut guard = self.records.lock().expect("wallet store mutex poisoned");
        if guard.contains_key(alias) {
            return Err(WalletError::DuplicateAlias);
        }
        let (keypair, private_key) = self.scheme.generate_keypair();
        let address = keypair.public_key.clone();
        guard.insert(
            alias.to_string(),
            WalletRecord {
                public_key: keypair.public_key,
                private_key,
            },
        );
        Ok(address)
    }

    #[must_use]
    pub fn get_address(&self, alias: &str) -> Option<String> {
        let guard = self.records.lock().expect("wallet store mutex poisoned");
        guard.get(alias).map(|record| record.public_key.clone())
    }

    /// Sums unspent outputs at `alias`'s address. `None` if `alias` has
    /// no wallet.
    #[must_use]
    pub fn balance(&self, alias: &str, utxo_store: &UtxoStore) -> Option<Amount> {
        let address = self.get_address(alias)?;
        Some(utxo_store.balance(&address))
    }

    /// Builds and signs a transaction paying `amount` to `recipient_address`
    /// from `alias`'s funds, with `fee` covered alongside it (§4.6).
    /// Selects unspent outputs greedily, largest first, to minimize the
    /// number of inputs; returns change back to the sender when the
    /// selected inputs overshoot `amount + fee`. Returns `None` on an
    /// unknown alias or insufficient funds rather than constructing an
    /// unpayable transaction.
    #[must_use]
    pub fn build_transaction(
        &self,
        alias: &str,
        recipient_address: &str,
        amount: Amount,
        fee: Amount,
        utxo_store: &UtxoStore,
        transaction_version: u32,
        timestamp: f64,
    ) -> Option<Transaction> {
        let guard = self.records.lock().expect("wallet store mutex poisoned");
        let record = guard.get(alias)?;
        let needed = amount.checked_add(fee)?;

        let mut spendable = utxo_store.list_unspent(Some(&record.public_key));
        spendable.sort_by(|a, b| b.amount.cmp(&a.amount));

        let mut selected = Vec::new();
        let mut accumulated = Amount::ZERO;
        for utxo in spendable {
            if accumulated >= needed {
                break;
            }
            accumulated = accumulated.checked_add(utxo.amount)?;
            selected.push(utxo);
        }
        if accumulated < needed {
            return None;
        }

        let unsigned_inputs: Vec<TxInput> = selected
            .iter()
            .map(|utxo| {
                TxInput::new(
                    utxo.txid,
                    i64::from(utxo.output_index),
                    record.public_key.clone(),
                    String::new(),
                )
            })
            .collect();

        let mut outputs = vec![TxOutput::new(recipient_address.to_string(), amount)];
        let change = accumulated.checked_sub(needed)?;
        if change > Amount::ZERO {
            outputs.push(TxOutput::new(record.public_key.clone(), change));
        }

        let draft = Transaction::new(transaction_version, timestamp, unsigned_inputs, outputs.clone());
        let txid = draft.txid().ok()?;

        let signed_inputs: Vec<TxInput> = selected
            .iter()
            .map(|utxo| {
                let signature = self.scheme.sign(&record.private_key, &txid);
                TxInput::new(utxo.txid, i64::from(utxo.output_index), record.public_key.clone(), signature)
            })
            .collect();

        Some(Transaction::new(transaction_version, timestamp, signed_inputs, outputs))
    }
}

use serde::{Deserialize, Serialize};
use shared::{canonical_hash, Amount, Hash512};

use crate::error::LedgerError;

/// The literal tag carried by a coinbase input's signature field. Not an
/// opaque signature at all — a sentinel marking "this input mints coins".
pub const COINBASE_SIGNATURE_TAG: &str = "COINBASE";

fn sentinel_hex_128() -> String {
    "0".repeat(128)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxInput {
    pub txid: Hash512,
    pub output_index: i64,
    pub pub_key: String,
    pub signature: String,
}

impl TxInput {
    #[must_use]
    pub fn new(txid: Hash512, output_index: i64, pub_key: String, signature: String) -> Self {
        Self {
            txid,
            output_index,
            pub_key,
            signature,
        }
    }

    #[must_use]
    pub fn coinbase() -> Self {
        Self {
            txid: Hash512::zero(),
            output_index: -1,
            pub_key: sentinel_hex_128(),
            signature: COINBASE_SIGNATURE_TAG.to_string(),
        }
    }

    #[must_use]
    pub fn is_coinbase(&self) -> bool {
        self.txid == Hash512::zero() && self.output_index == -1
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxOutput {
    pub address: String,
    pub amount: Amount,
}

impl TxOutput {
    #[must_use]
    pub fn new(address: String, amount: Amount) -> Self {
        Self { address, amount }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub version: u32,
    pub timestamp: f64,
    pub inputs: Vec<TxInput>,
    pub outputs: Vec<TxOutput>,
}

/// The part of an input that feeds txid derivation. Signatures are
/// deliberately excluded: `txid` must be a pure function of
/// (version, timestamp, inputs-without-signatures, outputs).
#[derive(Serialize)]
struct CanonicalInput<'a> {
    txid: Hash512,
    output_index: i64,
    pub_key: &'a str,
    signature: Option<&'a str>,
}

#[derive(Serialize)]
struct CanonicalTransaction<'a> {
    version: u32,
    timestamp: f64,
    inputs: Vec<CanonicalInput<'a>>,
    outputs: &'a [TxOutput],
}

impl Transaction {
    #[must_use]
    pub fn new(version: u32, timestamp: f64, inputs: Vec<TxInput>, outputs: Vec<TxOutput>) -> Self {
        Self {
            version,
            timestamp,
            inputs,
            outputs,
        }
    }

    /// Builds the coinbase transaction for a mined block: a single
    /// coinbase input and a single output paying `reward` to `miner_address`.
    #[must_use]
    pub fn coinbase(timestamp: f64, version: u32, miner_address: &str, reward: Amount) -> Self {
        Self {
            version,
            timestamp,
            inputs: vec![TxInput::coinbase()],
            outputs: vec![TxOutput::new(miner_address.to_string(), reward)],
        }
    }

    #[must_use]
    pub fn is_coinbase(&self) -> bool {
        self.inputs.len() == 1 && self.inputs[0].is_coinbase()
    }

    /// The transaction's identifier: a pure function of its
    /// signature-stripped canonical form. Signing a transaction, or
    /// tampering with just a signature, never changes its `txid`.
    pub fn txid(&self) -> Result<Hash512, LedgerError> {
        let canonical = CanonicalTransaction {
            version: self.version,
            timestamp: self.timestamp,
            inputs: self
                .inputs
                .iter()
                .map(|input| CanonicalInput {
                    txid: input.txid,
                    output_index: input.output_index,
                    pub_key: &input.pub_key,
                    signature: None,
                })
                .collect(),
            outputs: &self.outputs,
        };
        Ok(canonical_hash(&canonical)?)
    }

    pub fn total_output_value(&self) -> Result<Amount, LedgerError> {
        self.outputs
            .iter()
            .try_fold(Amount::ZERO, |acc, output| acc.checked_add(output.amount))
            .ok_or_else(|| LedgerError::Validation("output amount overflow".into()))
    }

    /// Structural checks that don't require consulting the UTXO store:
    /// non-empty outputs, and coinbase shape consistency.
    pub fn validate_basic(&self) -> Result<(), LedgerError> {
        if self.outputs.is_empty() {
            return Err(LedgerError::Validation("transaction has no outputs".into()));
        }
        self.total_output_value()?;

        if self.is_coinbase() {
            if self.inputs.len() != 1 {
                return Err(LedgerError::Validation(
                    "coinbase transaction must have exactly one input".into(),
                ));
            }
        } else {
            for input in &self.inputs {
                if input.is_coinbase() {
                    return Err(LedgerError::Validation(
                        "non-coinbase transaction carries a coinbase input".into(),
                    ));
                }
            }
            if self.inputs.is_empty() {
                return Err(LedgerError::Validation(
                    "non-coinbase transaction has no inputs".into(),
                ));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_output() -> TxOutput {
        TxOutput::new("a".repeat(64), Amount::from_major(10.0).unwrap())
    }

    #[test]
    fn coinbase_shape_matches_sentinel_convention() {
        let tx = Transaction::coinbase(0.0, 1, &"m".repeat(64), Amount::from_major(100.0).unwrap());
        assert!(tx.is_coinbase());
        assert_eq!(tx.inputs[0].txid, Hash512::zero());
        assert_eq!(tx.inputs[0].output_index, -1);
        assert_eq!(tx.inputs[0].pub_key, sentinel_hex_128());
        assert_eq!(tx.inputs[0].signature, "COINBASE");
    }

    #[test]
    fn txid_is_stable_and_ignores_signature_mutation() {
        let input = TxInput::new(Hash512::sha3_512(b"prior"), 0, "pub".into(), "sig-a".into());
        let tx_a = Transaction::new(1, 10.0, vec![input.clone()], vec![sample_output()]);
        let mut mutated_input = input;
        mutated_input.signature = "sig-b".into();
        let tx_b = Transaction::new(1, 10.0, vec![mutated_input], vec![sample_output()]);

        assert_eq!(tx_a.txid().unwrap(), tx_b.txid().unwrap());
    }

    #[test]
    fn txid_changes_when_non_signature_fields_change() {
        let input = TxInput::new(Hash512::sha3_512(b"prior"), 0, "pub".into(), "sig".into());
        let tx_a = Transaction::new(1, 10.0, vec![input.clone()], vec![sample_output()]);
        let tx_b = Transaction::new(1, 11.0, vec![input], vec![sample_output()]);

        assert_ne!(tx_a.txid().unwrap(), tx_b.txid().unwrap());
    }

    #[test]
    fn validate_basic_rejects_empty_outputs() {
        let tx = Transaction::new(1, 0.0, vec![], vec![]);
        assert!(tx.validate_basic().is_err());
    }

    #[test]
    fn validate_basic_rejects_coinbase_input_in_non_coinbase_tx() {
        let tx = Transaction::new(1, 0.0, vec![TxInput::coinbase()], vec![sample_output()]);
        assert!(tx.validate_basic().is_err());
    }
}

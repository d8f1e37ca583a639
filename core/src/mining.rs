use shared::{Amount, Hash512};

use crate::block::Block;
use crate::error::LedgerError;
use crate::ledger::Ledger;
use crate::transaction::Transaction;

/// Linear proof-of-work search (§4.4 step 7). `header_prefix` is
/// `concat(height, previous_hash, merkle_root)`; the smallest
/// non-negative `proof` such that `H(header_prefix ‖ proof)` has at
/// least `difficulty` leading zero hex characters wins. Deliberately a
/// different hash construction from `Block::hash` (no timestamp, no
/// canonical-JSON routing) — it only gates the search.
#[must_use]
pub fn proof_of_work(header_prefix: &str, difficulty: u32) -> u64 {
    let mut proof = 0u64;
    loop {
        let candidate = format!("{header_prefix}{proof}");
        let digest = Hash512::sha3_512(candidate.as_bytes());
        if digest.leading_zero_hex_chars() >= difficulty {
            return proof;
        }
        proof += 1;
    }
}

/// Mines the next block on top of `ledger`'s current tip: snapshots and
/// revalidates the mempool, computes fees by consulting the UTXO
/// Store, constructs the coinbase, runs proof-of-work lock-free, and
/// commits (§4.4). Returns `Ok(None)` when there is nothing to mine —
/// not an error.
pub fn mine_block(ledger: &Ledger, timestamp: f64) -> Result<Option<Block>, LedgerError> {
    let job = ledger.prepare_mining_job();
    if job.validated_transactions.is_empty() {
        return Ok(None);
    }

    let fees = total_fees(ledger, &job.validated_transactions)?;
    let reward = ledger
        .params()
        .miner_reward
        .checked_add(fees)
        .ok_or_else(|| LedgerError::Validation("coinbase reward overflow".into()))?;
    let coinbase = Transaction::coinbase(
        timestamp,
        ledger.params().transaction_version,
        ledger.miner_address(),
        reward,
    );

    let mut transactions = Vec::with_capacity(job.validated_transactions.len() + 1);
    transactions.push(coinbase);
    transactions.extend(job.validated_transactions);

    let next_index = job.tip_height + 1;
    let txids = transactions
        .iter()
        .map(Transaction::txid)
        .collect::<Result<Vec<_>, _>>()?;
    let merkle_root = crate::merkle::merkle_root(&txids);

    let header_prefix = format!("{next_index}{}{}", job.previous_hash, merkle_root);
    let proof = proof_of_work(&header_prefix, job.difficulty);

    let block = Block::new(next_index, timestamp, transactions, job.previous_hash, proof)?;

    // The tip may have advanced while we searched; `commit_block` will
    // reject a stale `previous_hash` naturally via the Block Store's
    // height check (§5 "Suspension points").
    ledger.commit_block(block.clone())?;
    Ok(Some(block))
}

/// Sums `Σ input.amount − Σ output.amount` over `transactions` by
/// looking up each input's referenced amount in the ledger's UTXO
/// Store (§4.4 step 4).
fn total_fees(ledger: &Ledger, transactions: &[Transaction]) -> Result<Amount, LedgerError> {
    let mut total = Amount::ZERO;
    for tx in transactions {
        let mut input_total = Amount::ZERO;
        for input in &tx.inputs {
            let output_index = u32::try_from(input.output_index)
                .map_err(|_| LedgerError::Validation("negative output index".into()))?;
            let record = ledger
                .utxo_store()
                .get(input.txid, output_index)
                .ok_or_else(|| LedgerError::Validation("input references unknown utxo".into()))?;
            input_total = input_total
                .checked_add(record.amount)
                .ok_or_else(|| LedgerError::Validation("input amount overflow".into()))?;
        }
        let output_total = tx.total_output_value()?;
        let fee = input_total
            .checked_sub(output_total)
            .ok_or_else(|| LedgerError::Validation("transaction pays more than it receives".into()))?;
        total = total
            .checked_add(fee)
            .ok_or_else(|| LedgerError::Validation("fee overflow".into()))?;
    }
    Ok(total)
}

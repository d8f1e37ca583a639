use shared::Hash512;

/// Computes the Merkle root over an ordered list of transaction ids.
///
/// Hashes of transaction ids form level 0; at each level, if the count is
/// odd, the last hash is duplicated. Each level's hashes are paired and
/// combined by concatenating their *hex string* representations (not raw
/// bytes) before hashing — this is what both nodes must agree on for the
/// commitment to match. An empty transaction list yields the all-zero
/// sentinel.
#[must_use]
pub fn merkle_root(txids: &[Hash512]) -> Hash512 {
    if txids.is_empty() {
        return Hash512::zero();
    }

    let mut level: Vec<Hash512> = txids.to_vec();
    while level.len() > 1 {
        if level.len() % 2 == 1 {
            level.push(*level.last().expect("level is non-empty"));
        }
        level = level
            .chunks(2)
            .map(|pair| {
                let combined = format!("{}{}", pair[0].to_hex(), pair[1].to_hex());
                Hash512::sha3_512(combined.as_bytes())
            })
            .collect();
    }
    level[0]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_list_yields_zero_sentinel() {
        assert_eq!(merkle_root(&[]), Hash512::zero());
    }

    #[test]
    fn single_txid_is_its_own_root() {
        let txid = Hash512::sha3_512(b"only tx");
        assert_eq!(merkle_root(&[txid]), txid);
    }

    #[test]
    fn odd_count_duplicates_the_last_hash() {
        let a = Hash512::sha3_512(b"a");
        let b = Hash512::sha3_512(b"b");
        let c = Hash512::sha3_512(b"c");

        let three = merkle_root(&[a, b, c]);
        let four_with_dup = merkle_root(&[a, b, c, c]);
        assert_eq!(three, four_with_dup);
    }

    #[test]
    fn order_matters() {
        let a = Hash512::sha3_512(b"a");
        let b = Hash512::sha3_512(b"b");
        assert_ne!(merkle_root(&[a, b]), merkle_root(&[b, a]));
    }
}

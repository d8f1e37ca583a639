use serde::{Deserialize, Serialize};
use sha3::{Digest, Sha3_512};
use std::fmt;

use crate::error::PrimitiveError;

/// 512-bit digest used to identify blocks, transactions, and every other
/// hashed value in the system. Always rendered as 128 lowercase hex chars.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Hash512([u8; 64]);

impl Hash512 {
    pub const HEX_LEN: usize = 128;

    /// The all-zero sentinel: `128 * '0'`. Used for `previous_hash` of the
    /// genesis block and for the coinbase input's `txid`/`pub_key`.
    #[must_use]
    pub const fn zero() -> Self {
        Self([0u8; 64])
    }

    #[must_use]
    pub const fn from_bytes(bytes: [u8; 64]) -> Self {
        Self(bytes)
    }

    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; 64] {
        &self.0
    }

    /// Computes the SHA3-512 digest of raw bytes.
    #[must_use]
    pub fn sha3_512(data: &[u8]) -> Self {
        let mut hasher = Sha3_512::new();
        hasher.update(data);
        let digest = hasher.finalize();
        let mut bytes = [0u8; 64];
        bytes.copy_from_slice(&digest);
        Self(bytes)
    }

    pub fn from_hex(hex_str: &str) -> Result<Self, PrimitiveError> {
        let decoded = hex::decode(hex_str).map_err(|_| PrimitiveError::InvalidHash)?;
        if decoded.len() != 64 {
            return Err(PrimitiveError::InvalidHash);
        }
        let mut bytes = [0u8; 64];
        bytes.copy_from_slice(&decoded);
        Ok(Self(bytes))
    }

    #[must_use]
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Number of leading `'0'` hex characters in this digest's hex form.
    /// This, not bit-counting, is the unit proof-of-work difficulty is
    /// measured in.
    #[must_use]
    pub fn leading_zero_hex_chars(&self) -> u32 {
        self.to_hex()
            .chars()
            .take_while(|&c| c == '0')
            .count() as u32
    }

    /// Whether this digest satisfies `difficulty` leading zero hex chars.
    #[must_use]
    pub fn meets_difficulty(&self, difficulty: u32) -> bool {
        self.leading_zero_hex_chars() >= difficulty
    }
}

impl fmt::Display for Hash512 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl TryFrom<String> for Hash512 {
    type Error = PrimitiveError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::from_hex(&value)
    }
}

impl From<Hash512> for String {
    fn from(value: Hash512) -> Self {
        value.to_hex()
    }
}

/// Serializes `value` to its canonical textual form and hashes it.
///
/// Canonicalization goes through [`serde_json::Value`], whose object
/// representation is a `BTreeMap` and is therefore always key-sorted —
/// this is the mechanism that satisfies the "keys in lexicographic order"
/// consensus rule. `serde_json`'s `preserve_order` feature must never be
/// enabled anywhere in this workspace, or that guarantee breaks.
pub fn canonical_hash<T: Serialize>(value: &T) -> Result<Hash512, PrimitiveError> {
    let canonical: serde_json::Value =
        serde_json::to_value(value).map_err(|_| PrimitiveError::Canonicalization)?;
    let bytes = serde_json::to_vec(&canonical).map_err(|_| PrimitiveError::Canonicalization)?;
    Ok(Hash512::sha3_512(&bytes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Serialize;

    #[test]
    fn zero_renders_as_128_zero_chars() {
        assert_eq!(Hash512::zero().to_hex(), "0".repeat(128));
    }

    #[test]
    fn sha3_512_is_deterministic_and_non_zero() {
        let a = Hash512::sha3_512(b"hello world");
        let b = Hash512::sha3_512(b"hello world");
        assert_eq!(a, b);
        assert_ne!(a, Hash512::zero());
    }

    #[test]
    fn hex_round_trips() {
        let h = Hash512::sha3_512(b"round trip me");
        let parsed = Hash512::from_hex(&h.to_hex()).unwrap();
        assert_eq!(h, parsed);
    }

    #[test]
    fn leading_zero_hex_chars_counts_only_hex_zero_chars() {
        // sha3("retry") is not known in advance, so build a controlled value instead.
        let mut bytes = [0xffu8; 64];
        bytes[0] = 0x00;
        bytes[1] = 0x0f; // hex "0f" -> one leading zero char then 'f'
        let h = Hash512::from_bytes(bytes);
        assert_eq!(h.leading_zero_hex_chars(), 3);
        assert!(h.meets_difficulty(3));
        assert!(!h.meets_difficulty(4));
    }

    #[test]
    fn canonical_hash_is_independent_of_struct_field_order() {
        #[derive(Serialize)]
        struct AB {
            a: u32,
            b: u32,
        }
        #[derive(Serialize)]
        struct BA {
            b: u32,
            a: u32,
        }
        let left = canonical_hash(&AB { a: 1, b: 2 }).unwrap();
        let right = canonical_hash(&BA { b: 2, a: 1 }).unwrap();
        assert_eq!(left, right);
    }
}

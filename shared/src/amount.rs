use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::Add;

use crate::error::PrimitiveError;

/// Minor units per whole coin. Amounts are carried internally as integer
/// minor units and only ever become a float at the JSON boundary, so
/// balance and fee arithmetic never drifts the way raw floats would.
pub const AMOUNT_SCALE: u64 = 100_000_000;

/// A non-negative monetary amount, stored as fixed-point integer minor
/// units. Serializes to and deserializes from a JSON number (floating
/// point), matching the wire format the rest of the system expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Hash)]
pub struct Amount(u64);

impl Amount {
    pub const ZERO: Amount = Amount(0);

    #[must_use]
    pub const fn from_minor_units(minor: u64) -> Self {
        Self(minor)
    }

    #[must_use]
    pub const fn minor_units(self) -> u64 {
        self.0
    }

    pub fn from_major(major: f64) -> Result<Self, PrimitiveError> {
        if !major.is_finite() || major < 0.0 {
            return Err(PrimitiveError::InvalidAmount(major.to_string()));
        }
        let scaled = major * AMOUNT_SCALE as f64;
        if scaled > u64::MAX as f64 {
            return Err(PrimitiveError::InvalidAmount(major.to_string()));
        }
        Ok(Self(scaled.round() as u64))
    }

    #[must_use]
    pub fn to_major(self) -> f64 {
        self.0 as f64 / AMOUNT_SCALE as f64
    }

    #[must_use]
    pub fn checked_add(self, other: Amount) -> Option<Amount> {
        self.0.checked_add(other.0).map(Amount)
    }

    #[must_use]
    pub fn checked_sub(self, other: Amount) -> Option<Amount> {
        self.0.checked_sub(other.0).map(Amount)
    }

    #[must_use]
    pub fn checked_mul(self, factor: u64) -> Option<Amount> {
        self.0.checked_mul(factor).map(Amount)
    }
}

impl Add for Amount {
    type Output = Amount;

    fn add(self, rhs: Amount) -> Amount {
        Amount(self.0 + rhs.0)
    }
}

impl Sum for Amount {
    fn sum<I: Iterator<Item = Amount>>(iter: I) -> Self {
        iter.fold(Amount::ZERO, Add::add)
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_major())
    }
}

impl Serialize for Amount {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_f64(self.to_major())
    }
}

impl<'de> Deserialize<'de> for Amount {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let major = f64::deserialize(deserializer)?;
        Amount::from_major(major).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn major_minor_round_trip() {
        let amount = Amount::from_major(50.1).unwrap();
        assert_eq!(amount.minor_units(), 5_010_000_000);
        assert!((amount.to_major() - 50.1).abs() < 1e-9);
    }

    #[test]
    fn negative_amounts_are_rejected() {
        assert!(Amount::from_major(-1.0).is_err());
    }

    #[test]
    fn arithmetic_is_exact_in_minor_units() {
        let a = Amount::from_major(0.1).unwrap();
        let b = Amount::from_major(0.2).unwrap();
        let sum = a.checked_add(b).unwrap();
        assert_eq!(sum.minor_units(), 30_000_000);
    }

    #[test]
    fn serializes_as_a_json_number() {
        let amount = Amount::from_major(10.0).unwrap();
        let json = serde_json::to_string(&amount).unwrap();
        assert_eq!(json, "10.0");
    }
}

//! Price values and the median rule

use primitive_types::U256;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Non-negative integer price, interpreted together with a token decimal.
///
/// Parsed from and rendered as a base-10 string.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PriceValue(pub U256);

impl PriceValue {
    pub fn new(value: U256) -> Self {
        Self(value)
    }

    pub fn value(&self) -> U256 {
        self.0
    }
}

impl From<u64> for PriceValue {
    fn from(value: u64) -> Self {
        Self(U256::from(value))
    }
}

/// Error parsing a price string
#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("invalid price literal {0:?}")]
pub struct ParsePriceError(pub String);

impl FromStr for PriceValue {
    type Err = ParsePriceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
            return Err(ParsePriceError(s.to_string()));
        }
        U256::from_dec_str(s)
            .map(Self)
            .map_err(|_| ParsePriceError(s.to_string()))
    }
}

impl fmt::Display for PriceValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Serialize for PriceValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0.to_string())
    }
}

impl<'de> Deserialize<'de> for PriceValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Median of a list of prices.
///
/// Odd length: the middle element after sorting. Even length: the mean of
/// the two middle elements, rounded down. Empty input has no median.
pub fn median(prices: &[PriceValue]) -> Option<PriceValue> {
    if prices.is_empty() {
        return None;
    }
    let mut sorted = prices.to_vec();
    sorted.sort_unstable();
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 1 {
        return Some(sorted[mid]);
    }
    let (low, high) = (sorted[mid - 1].0, sorted[mid].0);
    // low + (high - low) / 2 stays in range for any U256 pair
    Some(PriceValue(low + (high - low) / 2))
}

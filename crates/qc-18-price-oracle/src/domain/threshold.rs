//! Quorum threshold
//!
//! A power `p` out of `total` reaches quorum when `p * B > total * A`.
//! The products are taken in 512 bits so the comparison never overflows
//! and never rounds.

use super::validator::Power;
use serde::{Deserialize, Serialize};

/// Supermajority fraction `A/B`
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Threshold {
    /// A
    pub numerator: u64,
    /// B
    pub denominator: u64,
}

impl Threshold {
    pub const fn new(numerator: u64, denominator: u64) -> Self {
        Self {
            numerator,
            denominator,
        }
    }

    /// Strictly exceeds `A/B` of `total`
    pub fn exceeds(&self, power: Power, total: Power) -> bool {
        if total.is_zero() {
            return false;
        }
        let lhs = power.full_mul(Power::from(self.denominator));
        let rhs = total.full_mul(Power::from(self.numerator));
        lhs > rhs
    }

    pub fn is_valid(&self) -> bool {
        self.numerator > 0 && self.numerator < self.denominator
    }
}

impl Default for Threshold {
    fn default() -> Self {
        Self::new(2, 3)
    }
}

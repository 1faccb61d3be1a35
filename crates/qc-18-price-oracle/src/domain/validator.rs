//! Validator identity and voting power
//!
//! The power table is supplied by the host and replaced wholesale on every
//! validator-set change. Workers only ever read it.

use primitive_types::U256;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Voting power (non-negative, arbitrary width for stake sums)
pub type Power = U256;

/// Validator identifier (consensus address, 32 bytes)
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ValidatorId(pub [u8; 32]);

impl ValidatorId {
    pub fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl From<[u8; 32]> for ValidatorId {
    fn from(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }
}

impl fmt::Display for ValidatorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(&self.0[..8]))
    }
}

/// Validator power table
///
/// Backed by a `BTreeMap` so every enumeration is sorted by identity.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidatorPowers {
    powers: BTreeMap<ValidatorId, Power>,
    total_power: Power,
}

impl ValidatorPowers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from `(id, power)` pairs. Later duplicates overwrite earlier ones.
    pub fn from_entries<I>(entries: I) -> Self
    where
        I: IntoIterator<Item = (ValidatorId, Power)>,
    {
        let mut set = Self::new();
        for (id, power) in entries {
            set.insert(id, power);
        }
        set
    }

    /// Insert or replace a validator's power
    pub fn insert(&mut self, id: ValidatorId, power: Power) {
        if let Some(previous) = self.powers.insert(id, power) {
            self.total_power = self.total_power.saturating_sub(previous);
        }
        self.total_power = self.total_power.saturating_add(power);
    }

    pub fn power_of(&self, id: &ValidatorId) -> Option<Power> {
        self.powers.get(id).copied()
    }

    pub fn contains(&self, id: &ValidatorId) -> bool {
        self.powers.contains_key(id)
    }

    pub fn total_power(&self) -> Power {
        self.total_power
    }

    pub fn len(&self) -> usize {
        self.powers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.powers.is_empty()
    }

    /// Iterate in ascending identity order
    pub fn iter(&self) -> impl Iterator<Item = (&ValidatorId, &Power)> {
        self.powers.iter()
    }
}

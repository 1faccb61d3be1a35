//! Submission filter
//!
//! Deduplicates a validator's submissions within one round: each nonce is
//! usable once, each (source, candidate id) pair is forwarded once. Both sets
//! have a fixed capacity for the lifetime of the round, so a validator cannot
//! grow them by flooding distinct values.

use super::message::{PriceCandidate, PriceSource, PriceSubmission};
use super::validator::ValidatorId;
use super::SourceId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Append-only set with a hard capacity
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundedSet<T> {
    items: Vec<T>,
    capacity: usize,
}

impl<T: PartialEq> BoundedSet<T> {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            items: Vec::with_capacity(capacity),
            capacity,
        }
    }

    pub fn contains(&self, item: &T) -> bool {
        self.items.contains(item)
    }

    /// Insert if absent and not full. Returns `true` if the item was added.
    pub fn insert(&mut self, item: T) -> bool {
        if self.items.len() >= self.capacity || self.contains(&item) {
            return false;
        }
        self.items.push(item);
        true
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.items.len() >= self.capacity
    }
}

/// Output of [`Filter::admit`]
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Filtered {
    /// Deterministic candidates to vote on
    pub for_calculator: Vec<PriceSource>,
    /// Everything the aggregator records
    pub for_aggregator: Vec<PriceSource>,
}

impl Filtered {
    pub fn is_empty(&self) -> bool {
        self.for_calculator.is_empty() && self.for_aggregator.is_empty()
    }
}

/// Per-round submission filter
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Filter {
    max_nonce: usize,
    max_det_id: usize,
    nonces: BTreeMap<ValidatorId, BoundedSet<u32>>,
    det_ids: BTreeMap<(ValidatorId, SourceId), BoundedSet<String>>,
}

impl Filter {
    pub fn new(max_nonce: u32, max_det_id: u32) -> Self {
        Self {
            max_nonce: max_nonce as usize,
            max_det_id: max_det_id as usize,
            nonces: BTreeMap::new(),
            det_ids: BTreeMap::new(),
        }
    }

    /// Split a submission into calculator-bound and aggregator-bound lists.
    ///
    /// `None` when the nonce was already used. A fresh nonce is consumed even
    /// if every candidate turns out to be a repeat, in which case both lists
    /// are empty. `is_deterministic` classifies sources by id.
    pub fn admit<F>(&mut self, msg: &PriceSubmission, is_deterministic: F) -> Option<Filtered>
    where
        F: Fn(SourceId) -> bool,
    {
        let max_nonce = self.max_nonce;
        let used = self
            .nonces
            .entry(msg.validator)
            .or_insert_with(|| BoundedSet::with_capacity(max_nonce));
        if !used.insert(msg.nonce) {
            return None;
        }

        let mut out = Filtered::default();
        for source in &msg.sources {
            if !is_deterministic(source.source_id) {
                out.for_aggregator.push(source.clone());
                continue;
            }

            let max_det_id = self.max_det_id;
            let seen = self
                .det_ids
                .entry((msg.validator, source.source_id))
                .or_insert_with(|| BoundedSet::with_capacity(max_det_id));

            let fresh: Vec<PriceCandidate> = source
                .prices
                .iter()
                .filter(|candidate| match &candidate.det_id {
                    Some(det_id) => seen.insert(det_id.clone()),
                    None => false,
                })
                .cloned()
                .collect();

            if fresh.is_empty() {
                continue;
            }
            let kept = PriceSource::new(source.source_id, fresh);
            out.for_calculator.push(kept.clone());
            out.for_aggregator.push(kept);
        }
        Some(out)
    }

    /// Nonces recorded for a validator
    pub fn used_nonces(&self, validator: &ValidatorId) -> usize {
        self.nonces.get(validator).map_or(0, BoundedSet::len)
    }

    /// Candidate ids recorded for a validator and source
    pub fn seen_det_ids(&self, validator: &ValidatorId, source_id: SourceId) -> usize {
        self.det_ids
            .get(&(*validator, source_id))
            .map_or(0, BoundedSet::len)
    }
}

//! Price submission messages
//!
//! Submissions arrive already signature-verified and in block order.

use super::price::PriceValue;
use super::validator::ValidatorId;
use super::{FeederId, SourceId};
use serde::{Deserialize, Serialize};

/// One candidate price from a source
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceCandidate {
    pub price: PriceValue,
    pub decimal: u8,
    pub timestamp: String,
    /// Candidate id for deterministic sources, `None` for non-deterministic ones
    pub det_id: Option<String>,
}

impl PriceCandidate {
    /// Candidate of a non-deterministic source
    pub fn market(price: impl Into<PriceValue>, decimal: u8, timestamp: impl Into<String>) -> Self {
        Self {
            price: price.into(),
            decimal,
            timestamp: timestamp.into(),
            det_id: None,
        }
    }

    /// Candidate of a deterministic source
    pub fn deterministic(
        det_id: impl Into<String>,
        price: impl Into<PriceValue>,
        decimal: u8,
        timestamp: impl Into<String>,
    ) -> Self {
        Self {
            price: price.into(),
            decimal,
            timestamp: timestamp.into(),
            det_id: Some(det_id.into()),
        }
    }
}

/// Candidate prices reported for one source
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceSource {
    pub source_id: SourceId,
    pub prices: Vec<PriceCandidate>,
}

impl PriceSource {
    pub fn new(source_id: SourceId, prices: Vec<PriceCandidate>) -> Self {
        Self { source_id, prices }
    }

    /// Sort deterministic candidates by candidate id
    fn normalize(&mut self) {
        self.prices
            .sort_by(|a, b| a.det_id.cmp(&b.det_id).then_with(|| a.price.cmp(&b.price)));
    }
}

/// A validator's price submission for one feeder and round
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceSubmission {
    pub validator: ValidatorId,
    pub feeder_id: FeederId,
    pub based_block: u64,
    /// Sequence number within the round, `1..=max_nonce`
    pub nonce: u32,
    pub sources: Vec<PriceSource>,
}

impl PriceSubmission {
    pub fn new(
        validator: ValidatorId,
        feeder_id: FeederId,
        based_block: u64,
        nonce: u32,
        sources: Vec<PriceSource>,
    ) -> Self {
        Self {
            validator,
            feeder_id,
            based_block,
            nonce,
            sources,
        }
    }

    pub fn source_ids(&self) -> Vec<SourceId> {
        self.sources.iter().map(|s| s.source_id).collect()
    }

    /// Canonical form: sources by id, candidates by candidate id.
    ///
    /// Cached records are stored normalized so their encoding is identical on
    /// every node.
    pub fn normalized(&self) -> Self {
        let mut msg = self.clone();
        msg.sources.sort_by_key(|s| s.source_id);
        for source in &mut msg.sources {
            source.normalize();
        }
        msg
    }
}

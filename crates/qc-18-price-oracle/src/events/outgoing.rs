//! Outgoing events for the Price Oracle subsystem

use crate::domain::{FeederId, PriceValue};
use serde::{Deserialize, Serialize};

/// A round reached a final price
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FinalizedPriceEvent {
    pub feeder_id: FeederId,
    pub token_id: u64,
    pub round_id: u64,
    pub based_block: u64,
    /// Block in which the deciding submission was executed
    pub height: u64,
    pub price: PriceValue,
    pub decimal: u8,
}

/// Result of a submission that was not rejected
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SubmissionOutcome {
    /// This submission finalized the round
    Finalized(FinalizedPriceEvent),
    /// Nonce spent and recorded, round not final yet
    Accepted,
    /// Nonce already used in this round; dropped without effect
    Duplicate,
}

impl SubmissionOutcome {
    pub fn finalized(&self) -> Option<&FinalizedPriceEvent> {
        match self {
            SubmissionOutcome::Finalized(event) => Some(event),
            _ => None,
        }
    }
}

/// A round closed by `seal_round`
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SealedRound {
    pub feeder_id: FeederId,
    pub token_id: u64,
    pub round_id: u64,
    pub based_block: u64,
    /// `None`: the round failed and the host substitutes the previous price
    pub price: Option<PriceValue>,
}

/// Outcome of a block-end boundary
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockEndReport {
    pub height: u64,
    pub sealed_with_price: Vec<SealedRound>,
    pub sealed_without_price: Vec<SealedRound>,
    /// Feeders whose end block passed; their rounds were removed
    pub retired: Vec<FeederId>,
}

impl BlockEndReport {
    pub fn new(height: u64) -> Self {
        Self {
            height,
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.sealed_with_price.is_empty()
            && self.sealed_without_price.is_empty()
            && self.retired.is_empty()
    }
}

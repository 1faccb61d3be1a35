//! Round entity
//!
//! One round per active feeder. `Open → Closed` on finalization, expiry or a
//! forced seal; the entry is removed when the feeder retires.

use serde::{Deserialize, Serialize};

/// Round status
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RoundStatus {
    /// Accepting submissions
    #[default]
    Open,
    /// Sealed, waiting for the next interval boundary
    Closed,
}

/// The current round of a feeder
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Round {
    /// Interval-aligned trigger block
    pub based_block: u64,
    /// Id of the round collecting prices
    pub round_id: u64,
    pub status: RoundStatus,
}

impl Round {
    pub fn open(based_block: u64, round_id: u64) -> Self {
        Self {
            based_block,
            round_id,
            status: RoundStatus::Open,
        }
    }

    pub fn closed(based_block: u64, round_id: u64) -> Self {
        Self {
            based_block,
            round_id,
            status: RoundStatus::Closed,
        }
    }

    pub fn is_open(&self) -> bool {
        self.status == RoundStatus::Open
    }

    pub fn close(&mut self) {
        self.status = RoundStatus::Closed;
    }

    /// Submission window `[based_block, based_block + max_nonce)` is over
    /// once `height` is its last block or later.
    pub fn window_elapsed_at(&self, height: u64, max_nonce: u32) -> bool {
        height.saturating_add(1) >= self.based_block.saturating_add(max_nonce as u64)
    }

    /// `height` lies inside the submission window
    pub fn accepts_at(&self, height: u64, max_nonce: u32) -> bool {
        height >= self.based_block && height < self.based_block.saturating_add(max_nonce as u64)
    }
}

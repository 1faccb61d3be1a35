//! Driving Ports (API - Inbound)
//!
//! Call order per block, on the single block-execution thread:
//!
//! ```text
//! recover() ── once at start
//!     │
//!     └──→ on_block_begin(h) ──→ submit(msg)* ──→ on_block_end(h, force) ──┐
//!               ↑                                                         │
//!               └─────────────────────────────────────────────────────────┘
//! ```

use crate::domain::{Params, PriceSubmission, ValidatorPowers};
use crate::error::OracleResult;
use crate::events::{BlockEndReport, SubmissionOutcome};

/// Primary Price Oracle API
pub trait OracleApi: Send + Sync {
    /// Rebuild in-memory state from the durable checkpoint.
    ///
    /// Must run once before the first `on_block_begin`. `latest_height` is
    /// the last block the host has committed.
    fn recover(&self, latest_height: u64) -> OracleResult<()>;

    /// Open, reset or close rounds for block `height`
    fn on_block_begin(&self, height: u64) -> OracleResult<()>;

    /// Execute a submission against committed state
    fn submit(&self, msg: PriceSubmission) -> OracleResult<SubmissionOutcome>;

    /// Pre-admission check against the speculative branch.
    ///
    /// Never mutates committed state.
    fn check_submission(&self, msg: &PriceSubmission) -> OracleResult<SubmissionOutcome>;

    /// Seal rounds and flush the checkpoint for block `height`.
    ///
    /// Callers must write the previous price for every entry of
    /// `sealed_without_price` to their price history.
    fn on_block_end(&self, height: u64, force_seal_all: bool) -> OracleResult<BlockEndReport>;

    /// Replace the validator power table (effective at block end)
    fn update_validators(&self, powers: ValidatorPowers) -> OracleResult<()>;

    /// Replace the params snapshot (effective at block end)
    fn update_params(&self, params: Params) -> OracleResult<()>;

    /// Keccak-256 digest of the committed in-memory state
    fn state_digest(&self) -> OracleResult<[u8; 32]>;
}

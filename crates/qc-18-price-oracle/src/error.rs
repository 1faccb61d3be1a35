//! Error types for the Price Oracle subsystem
//!
//! Rejections are always recoverable and never mutate state beyond Filter
//! bookkeeping. `InvariantViolation` is the only fatal kind: the host must
//! stop the node instead of continuing on possibly diverged state.

use crate::domain::{FeederId, SourceId, ValidatorId};
use thiserror::Error;

/// Price Oracle errors
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum OracleError {
    /// Submitter is not part of the current validator set
    #[error("Unknown validator: {0}")]
    UnknownValidator(ValidatorId),

    /// Feeder id not present in the params snapshot
    #[error("Unknown token feeder: {0}")]
    UnknownFeeder(FeederId),

    /// Feeder exists but is outside its active block range
    #[error("Token feeder {feeder_id} is not active at height {height}")]
    FeederNotActive { feeder_id: FeederId, height: u64 },

    /// No open round for the feeder
    #[error("Round for feeder {0} is closed")]
    RoundClosed(FeederId),

    /// Worker already sealed for this round
    #[error("Round {round_id} of feeder {feeder_id} is sealed")]
    RoundSealed { feeder_id: FeederId, round_id: u64 },

    /// Submission references a different base block than the open round
    #[error("Based block mismatch for feeder {feeder_id}: expected {expected}, got {actual}")]
    BasedBlockMismatch {
        feeder_id: FeederId,
        expected: u64,
        actual: u64,
    },

    /// Nonce outside `1..=max_nonce`
    #[error("Invalid nonce {nonce}, allowed range is 1..={max}")]
    InvalidNonce { nonce: u32, max: u32 },

    /// Price sources do not satisfy the feeder's rule
    #[error("Rule violation for feeder {feeder_id}: {reason}")]
    RuleViolation { feeder_id: FeederId, reason: String },

    /// Price decimal differs from the token configuration
    #[error("Decimal mismatch on source {source_id}: expected {expected}, got {actual}")]
    DecimalMismatch {
        source_id: SourceId,
        expected: u8,
        actual: u8,
    },

    /// Structurally invalid submission
    #[error("Malformed submission: {0}")]
    MalformedSubmission(String),

    /// Params snapshot rejected
    #[error("Params error: {0}")]
    Params(#[from] ParamsError),

    /// Durable store failure
    #[error("Storage error: {0}")]
    Storage(#[from] KVStoreError),

    /// Checkpoint cache failure
    #[error("Checkpoint cache error: {0}")]
    Cache(#[from] CacheError),

    /// Broken internal invariant. Abort the process.
    #[error("Invariant violation: {0}")]
    InvariantViolation(String),
}

impl OracleError {
    /// Short label used for metrics and logs
    pub fn reason(&self) -> &'static str {
        match self {
            OracleError::UnknownValidator(_) => "unknown_validator",
            OracleError::UnknownFeeder(_) => "unknown_feeder",
            OracleError::FeederNotActive { .. } => "feeder_not_active",
            OracleError::RoundClosed(_) => "round_closed",
            OracleError::RoundSealed { .. } => "round_sealed",
            OracleError::BasedBlockMismatch { .. } => "based_block_mismatch",
            OracleError::InvalidNonce { .. } => "invalid_nonce",
            OracleError::RuleViolation { .. } => "rule_violation",
            OracleError::DecimalMismatch { .. } => "decimal_mismatch",
            OracleError::MalformedSubmission(_) => "malformed",
            OracleError::Params(_) => "params",
            OracleError::Storage(_) => "storage",
            OracleError::Cache(_) => "cache",
            OracleError::InvariantViolation(_) => "invariant_violation",
        }
    }

    /// Whether the error is a rejected submission (as opposed to an
    /// infrastructure or fatal failure).
    pub fn is_rejection(&self) -> bool {
        !matches!(
            self,
            OracleError::Params(_)
                | OracleError::Storage(_)
                | OracleError::Cache(_)
                | OracleError::InvariantViolation(_)
        )
    }

    /// Whether the host must abort
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            OracleError::InvariantViolation(_)
                | OracleError::Cache(CacheError::AlreadyCommitted { .. })
                | OracleError::Cache(CacheError::HeightMismatch { .. })
        )
    }
}

/// Params snapshot validation errors
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParamsError {
    #[error("Params document could not be decoded: {0}")]
    Decode(String),

    #[error("max_nonce must be at least 1")]
    ZeroMaxNonce,

    #[error("max_det_id must be at least 1")]
    ZeroMaxDetId,

    #[error("Invalid threshold {numerator}/{denominator}: require 0 < A < B")]
    InvalidThreshold { numerator: u64, denominator: u64 },

    #[error("Feeder {feeder_id} has zero interval")]
    ZeroInterval { feeder_id: FeederId },

    #[error("Feeder {feeder_id} ends at {end_block} before it starts at {start_base_block}")]
    FeederEndsBeforeStart {
        feeder_id: FeederId,
        start_base_block: u64,
        end_block: u64,
    },

    #[error("Feeder {feeder_id} references unknown token {token_id}")]
    UnknownToken { feeder_id: FeederId, token_id: u64 },

    #[error("Feeder {feeder_id} references unknown rule {rule_id}")]
    UnknownRule { feeder_id: FeederId, rule_id: u64 },

    #[error("Rule {rule_id} references unknown source {source_id}")]
    UnknownSource { rule_id: u64, source_id: SourceId },

    #[error("Rule {rule_id} nominal minimum {minimum} exceeds {available} listed sources")]
    NominalUnsatisfiable {
        rule_id: u64,
        minimum: u32,
        available: usize,
    },
}

/// Key-value store errors
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum KVStoreError {
    #[error("I/O error: {message}")]
    IOError { message: String },

    #[error("Corrupted entry at key {key}")]
    Corrupted { key: String },
}

/// Checkpoint cache errors
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CacheError {
    /// A block was committed twice, or out of order
    #[error("Height {height} already committed (last committed {last_committed})")]
    AlreadyCommitted { height: u64, last_committed: u64 },

    /// Buffered record belongs to another block
    #[error("Buffered record for height {found} while committing {expected}")]
    HeightMismatch { expected: u64, found: u64 },

    #[error("Serialization failed: {0}")]
    Serialization(String),

    #[error("Storage error: {0}")]
    Storage(#[from] KVStoreError),
}

/// Result type for oracle operations
pub type OracleResult<T> = Result<T, OracleError>;

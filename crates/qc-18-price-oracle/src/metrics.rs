//! # Price Oracle Metrics
//!
//! Enable with the `metrics` feature:
//! ```toml
//! qc-18-price-oracle = { path = "...", features = ["metrics"] }
//! ```
//!
//! ## Metrics Exported
//!
//! - `oracle_submissions_accepted_total` - Counter of accepted submissions
//! - `oracle_submissions_rejected_total` - Counter of rejected submissions (by reason)
//! - `oracle_rounds_finalized_total` - Counter of rounds sealed with a price
//! - `oracle_rounds_failed_total` - Counter of rounds sealed without a price
//! - `oracle_replayed_messages_total` - Counter of messages replayed on recovery
//! - `oracle_open_rounds` - Gauge of open rounds after the last block

#[cfg(feature = "metrics")]
use lazy_static::lazy_static;

#[cfg(feature = "metrics")]
use prometheus::{
    register_int_counter, register_int_counter_vec, register_int_gauge, IntCounter,
    IntCounterVec, IntGauge,
};

#[cfg(feature = "metrics")]
lazy_static! {
    pub static ref SUBMISSIONS_ACCEPTED: IntCounter = register_int_counter!(
        "oracle_submissions_accepted_total",
        "Total number of accepted price submissions"
    )
    .expect("Failed to create SUBMISSIONS_ACCEPTED metric");

    pub static ref SUBMISSIONS_REJECTED: IntCounterVec = register_int_counter_vec!(
        "oracle_submissions_rejected_total",
        "Total number of rejected price submissions",
        &["reason"]
    )
    .expect("Failed to create SUBMISSIONS_REJECTED metric");

    pub static ref ROUNDS_FINALIZED: IntCounter = register_int_counter!(
        "oracle_rounds_finalized_total",
        "Total number of rounds sealed with a price"
    )
    .expect("Failed to create ROUNDS_FINALIZED metric");

    pub static ref ROUNDS_FAILED: IntCounter = register_int_counter!(
        "oracle_rounds_failed_total",
        "Total number of rounds sealed without a price"
    )
    .expect("Failed to create ROUNDS_FAILED metric");

    pub static ref REPLAYED_MESSAGES: IntCounter = register_int_counter!(
        "oracle_replayed_messages_total",
        "Total number of cached messages replayed on recovery"
    )
    .expect("Failed to create REPLAYED_MESSAGES metric");

    pub static ref OPEN_ROUNDS: IntGauge = register_int_gauge!(
        "oracle_open_rounds",
        "Open rounds after the last block"
    )
    .expect("Failed to create OPEN_ROUNDS metric");
}

#[cfg(feature = "metrics")]
pub fn record_submission_accepted() {
    SUBMISSIONS_ACCEPTED.inc();
}

#[cfg(feature = "metrics")]
pub fn record_submission_rejected(reason: &str) {
    SUBMISSIONS_REJECTED.with_label_values(&[reason]).inc();
}

#[cfg(feature = "metrics")]
pub fn record_rounds_sealed(finalized: usize, failed: usize) {
    ROUNDS_FINALIZED.inc_by(finalized as u64);
    ROUNDS_FAILED.inc_by(failed as u64);
}

#[cfg(feature = "metrics")]
pub fn record_replayed(count: usize) {
    REPLAYED_MESSAGES.inc_by(count as u64);
}

#[cfg(feature = "metrics")]
pub fn set_open_rounds(count: usize) {
    OPEN_ROUNDS.set(count as i64);
}

// No-op implementations when metrics feature is disabled
#[cfg(not(feature = "metrics"))]
pub fn record_submission_accepted() {}

#[cfg(not(feature = "metrics"))]
pub fn record_submission_rejected(_reason: &str) {}

#[cfg(not(feature = "metrics"))]
pub fn record_rounds_sealed(_finalized: usize, _failed: usize) {}

#[cfg(not(feature = "metrics"))]
pub fn record_replayed(_count: usize) {}

#[cfg(not(feature = "metrics"))]
pub fn set_open_rounds(_count: usize) {}

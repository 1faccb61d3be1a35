//! Domain module for the Price Oracle subsystem
//!
//! ## Pipeline
//! - filter: per-round deduplication of nonces and candidate ids
//! - calculator: power-weighted voting on deterministic sources
//! - aggregator: per-validator reports and the two-layer median
//! - worker: one pipeline per (feeder, round), sealed once
//!
//! ## Entities
//! - params: versioned consensus parameters
//! - validator: power table
//! - round: per-feeder round lifecycle
//! - message: price submissions
//! - price / threshold: numeric rules

pub mod aggregator;
pub mod calculator;
pub mod filter;
pub mod message;
pub mod params;
pub mod price;
pub mod round;
pub mod threshold;
pub mod validator;
pub mod worker;

/// Token feeder id (1-based position in `Params::feeders`)
pub type FeederId = u64;

/// Data source id
pub type SourceId = u64;

pub use aggregator::{Aggregator, Report, ReportEntry};
pub use calculator::{Calculator, ConfirmedPrice};
pub use filter::{BoundedSet, Filter, Filtered};
pub use message::{PriceCandidate, PriceSource, PriceSubmission};
pub use params::{
    DataSource, NominalSources, Params, RuleSources, SourceRequirement, TokenFeeder, TokenInfo,
};
pub use price::{median, PriceValue};
pub use round::{Round, RoundStatus};
pub use threshold::Threshold;
pub use validator::{Power, ValidatorId, ValidatorPowers};
pub use worker::{Worker, WorkerOutcome, WorkerState};

//! # qc-18-price-oracle
//!
//! Deterministic price-oracle consensus engine.
//!
//! ## Overview
//!
//! Validators submit price observations every block. The engine decides,
//! identically on every node, when enough voting power agrees on a value and
//! publishes exactly one final price per round per token feeder.
//!
//! - **Filter**: one use per nonce and per (source, candidate id)
//! - **Calculator**: power-weighted votes on deterministic sources
//! - **Aggregator**: per-validator reports and the two-layer median
//! - **Round manager**: round lifecycle, speculative branch, replay
//! - **Checkpoint cache**: bounded durable history for crash recovery
//!
//! ## Architecture
//!
//! ```text
//! submission ──→ Filter ──┬──→ Calculator ──confirmed──┐
//!                         │                            ↓
//!                         └──────────────────────→ Aggregator ──→ final price
//!                                                                    │
//!   on_block_end ──→ seal_round ──→ CheckpointCache::commit ←────────┘
//! ```
//!
//! ## Threshold
//!
//! Quorum is strict: `power · B > total · A` for the configured `A/B`
//! (default 2/3). Exactly two thirds is not enough.
//!
//! ## Example
//!
//! ```rust,ignore
//! use qc_18_price_oracle::{OracleConfig, OracleService};
//! use qc_18_price_oracle::ports::inbound::OracleApi;
//!
//! let service = OracleService::new(OracleConfig::from_env(), store, validators, params);
//! service.recover(latest_height)?;
//!
//! service.on_block_begin(height)?;
//! for msg in block_submissions {
//!     service.submit(msg)?;
//! }
//! let report = service.on_block_end(height, false)?;
//! ```

pub mod adapters;
pub mod cache;
pub mod config;
pub mod context;
pub mod domain;
pub mod error;
pub mod events;
pub mod metrics;
pub mod ports;
pub mod service;

pub use cache::{CheckpointCache, CheckpointHistory, CommitSummary, MessageRecord};
pub use config::OracleConfig;
pub use context::{AggregatorContext, Replay, ReplayStats, SpeculativeBranch};
pub use domain::*;
pub use error::{CacheError, KVStoreError, OracleError, OracleResult, ParamsError};
pub use events::{BlockEndReport, FinalizedPriceEvent, SealedRound, SubmissionOutcome};
pub use ports::inbound::OracleApi;
pub use ports::outbound::{BatchOperation, KeyValueStore, ParamsSource, ValidatorPowerSource};
pub use service::OracleService;

//! Per-round worker
//!
//! Wires Filter → Calculator → Aggregator for exactly one (feeder, round).
//!
//! ```text
//! [ACTIVE] ──finalize() = Some──→ [SEALED {price}]
//!     │
//!     └────── force seal ───────→ [SEALED {none}]
//! ```
//!
//! Sealing releases the pipeline. A sealed worker rejects every submission.

use super::aggregator::Aggregator;
use super::calculator::Calculator;
use super::filter::Filter;
use super::message::PriceSubmission;
use super::params::Params;
use super::price::PriceValue;
use super::validator::{Power, ValidatorPowers};
use super::{FeederId, SourceId};
use crate::error::{OracleError, OracleResult};
use serde::{Deserialize, Serialize};

/// Result of feeding a submission into a worker
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum WorkerOutcome {
    /// Round price computed by this submission
    Finalized(PriceValue),
    /// Nonce consumed, no final price yet
    Recorded,
    /// Nonce already used; dropped without effect
    Duplicate,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
struct Pipeline {
    filter: Filter,
    calculator: Calculator,
    aggregator: Aggregator,
}

/// Worker state
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum WorkerState {
    Active,
    Sealed { price: Option<PriceValue> },
}

/// Consensus worker for one round of one feeder
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Worker {
    feeder_id: FeederId,
    round_id: u64,
    based_block: u64,
    pipeline: Option<Pipeline>,
    final_price: Option<PriceValue>,
}

impl Worker {
    pub fn new(
        feeder_id: FeederId,
        round_id: u64,
        based_block: u64,
        params: &Params,
        validators: &ValidatorPowers,
    ) -> Self {
        let total = validators.total_power();
        Self {
            feeder_id,
            round_id,
            based_block,
            pipeline: Some(Pipeline {
                filter: Filter::new(params.max_nonce, params.max_det_id),
                calculator: Calculator::new(
                    params.threshold,
                    total,
                    validators.len(),
                    params.max_det_id,
                ),
                aggregator: Aggregator::new(params.threshold, total),
            }),
            final_price: None,
        }
    }

    pub fn feeder_id(&self) -> FeederId {
        self.feeder_id
    }

    pub fn round_id(&self) -> u64 {
        self.round_id
    }

    pub fn based_block(&self) -> u64 {
        self.based_block
    }

    pub fn is_sealed(&self) -> bool {
        self.pipeline.is_none()
    }

    pub fn final_price(&self) -> Option<PriceValue> {
        self.final_price
    }

    pub fn state(&self) -> WorkerState {
        match self.pipeline {
            Some(_) => WorkerState::Active,
            None => WorkerState::Sealed {
                price: self.final_price,
            },
        }
    }

    /// Feed one submission through the pipeline
    pub fn admit(
        &mut self,
        msg: &PriceSubmission,
        power: Power,
        params: &Params,
    ) -> OracleResult<WorkerOutcome> {
        let Some(pipeline) = self.pipeline.as_mut() else {
            return Err(OracleError::RoundSealed {
                feeder_id: self.feeder_id,
                round_id: self.round_id,
            });
        };

        let is_det = |id: SourceId| params.is_deterministic(id);
        let Some(filtered) = pipeline.filter.admit(msg, is_det) else {
            return Ok(WorkerOutcome::Duplicate);
        };
        if filtered.is_empty() {
            return Ok(WorkerOutcome::Recorded);
        }

        pipeline
            .aggregator
            .admit(&filtered.for_aggregator, msg.validator, power, is_det);
        let confirmed = pipeline.calculator.admit(&filtered.for_calculator, power);
        if !confirmed.is_empty() {
            pipeline.aggregator.confirm(&confirmed);
        }

        match pipeline.aggregator.finalize() {
            Some(price) => {
                self.final_price = Some(price);
                self.pipeline = None;
                Ok(WorkerOutcome::Finalized(price))
            }
            None => Ok(WorkerOutcome::Recorded),
        }
    }

    /// Seal without a price. No-op if already sealed.
    pub fn seal(&mut self) {
        self.pipeline = None;
    }

    /// Filter state, while active
    pub fn filter(&self) -> Option<&Filter> {
        self.pipeline.as_ref().map(|p| &p.filter)
    }

    /// Calculator state, while active
    pub fn calculator(&self) -> Option<&Calculator> {
        self.pipeline.as_ref().map(|p| &p.calculator)
    }

    /// Aggregator state, while active
    pub fn aggregator(&self) -> Option<&Aggregator> {
        self.pipeline.as_ref().map(|p| &p.aggregator)
    }
}

//! Deterministic-source vote calculator
//!
//! For every deterministic source, candidate prices are grouped by candidate
//! id and weighted by the submitting validator's power. The first candidate
//! whose price crosses the quorum threshold is confirmed for that source, and
//! the source is closed to further votes for the rest of the round. A later
//! candidate id never replaces an earlier confirmation, even if it would be
//! more recent.

use super::message::PriceSource;
use super::price::PriceValue;
use super::threshold::Threshold;
use super::validator::Power;
use super::SourceId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A confirmed deterministic price
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfirmedPrice {
    pub source_id: SourceId,
    pub det_id: String,
    pub price: PriceValue,
    pub timestamp: String,
}

/// Accumulated power behind one price value
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
struct PriceAndPower {
    price: PriceValue,
    timestamp: String,
    power: Power,
}

/// Votes for one candidate id
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
struct CandidateRound {
    det_id: String,
    prices: Vec<PriceAndPower>,
}

/// Votes for one source
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
struct SourceRounds {
    candidates: Vec<CandidateRound>,
    confirmed: Option<ConfirmedPrice>,
}

/// Per-round calculator
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Calculator {
    threshold: Threshold,
    total_power: Power,
    /// Price entries per candidate, bounded by the validator count
    max_prices: usize,
    /// Candidate ids per source
    max_candidates: usize,
    sources: BTreeMap<SourceId, SourceRounds>,
}

impl Calculator {
    /// `validator_count` bounds each candidate's distinct prices; candidates
    /// per source are bounded by `validator_count * max_det_id`.
    pub fn new(
        threshold: Threshold,
        total_power: Power,
        validator_count: usize,
        max_det_id: u32,
    ) -> Self {
        Self {
            threshold,
            total_power,
            max_prices: validator_count,
            max_candidates: validator_count.saturating_mul(max_det_id as usize),
            sources: BTreeMap::new(),
        }
    }

    /// Add `power` behind each candidate and return newly confirmed prices
    pub fn admit(&mut self, sources: &[PriceSource], power: Power) -> Vec<ConfirmedPrice> {
        let mut confirmed = Vec::new();

        for source in sources {
            let rounds = self.sources.entry(source.source_id).or_default();

            for candidate in &source.prices {
                if rounds.confirmed.is_some() {
                    break;
                }
                let Some(det_id) = candidate.det_id.as_ref() else {
                    continue;
                };

                let idx = match rounds.candidates.iter().position(|c| &c.det_id == det_id) {
                    Some(idx) => idx,
                    None if rounds.candidates.len() < self.max_candidates => {
                        rounds.candidates.push(CandidateRound {
                            det_id: det_id.clone(),
                            prices: Vec::new(),
                        });
                        rounds.candidates.len() - 1
                    }
                    None => continue,
                };
                let round = &mut rounds.candidates[idx];

                let accumulated = match round
                    .prices
                    .iter()
                    .position(|p| p.price == candidate.price)
                {
                    Some(i) => {
                        let entry = &mut round.prices[i];
                        entry.power = entry.power.saturating_add(power);
                        entry.power
                    }
                    None if round.prices.len() < self.max_prices => {
                        round.prices.push(PriceAndPower {
                            price: candidate.price,
                            timestamp: candidate.timestamp.clone(),
                            power,
                        });
                        power
                    }
                    None => continue,
                };

                if self.threshold.exceeds(accumulated, self.total_power) {
                    let hit = ConfirmedPrice {
                        source_id: source.source_id,
                        det_id: det_id.clone(),
                        price: candidate.price,
                        timestamp: candidate.timestamp.clone(),
                    };
                    tracing::debug!(
                        source_id = hit.source_id,
                        det_id = %hit.det_id,
                        price = %hit.price,
                        "[qc-18] Deterministic source confirmed"
                    );
                    rounds.confirmed = Some(hit.clone());
                    confirmed.push(hit);
                }
            }
        }
        confirmed
    }

    pub fn confirmed(&self, source_id: SourceId) -> Option<&ConfirmedPrice> {
        self.sources.get(&source_id)?.confirmed.as_ref()
    }

    /// Candidate ids tracked for a source
    pub fn candidate_count(&self, source_id: SourceId) -> usize {
        self.sources
            .get(&source_id)
            .map_or(0, |s| s.candidates.len())
    }

    /// Largest number of price entries held by any candidate of a source
    pub fn max_entries(&self, source_id: SourceId) -> usize {
        self.sources.get(&source_id).map_or(0, |s| {
            s.candidates.iter().map(|c| c.prices.len()).max().unwrap_or(0)
        })
    }
}

//! Consensus parameter snapshot
//!
//! A `Params` value is immutable once taken. Updates replace the whole
//! snapshot. Feeder, rule and token ids are 1-based positions in their lists;
//! id 0 is reserved as "none".

use super::threshold::Threshold;
use super::{FeederId, SourceId};
use crate::error::ParamsError;
use serde::{Deserialize, Serialize};

/// A price data source
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataSource {
    pub id: SourceId,
    pub name: String,
    /// Honest validators report identical values, agreed by voting on a candidate id
    pub deterministic: bool,
    pub valid: bool,
}

/// A token whose price is fed
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenInfo {
    pub name: String,
    pub decimal: u8,
    pub active: bool,
}

/// A periodically updated price series for one token
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenFeeder {
    pub token_id: u64,
    pub rule_id: u64,
    /// Round id assigned to the round based at `start_base_block`
    pub start_round_id: u64,
    pub start_base_block: u64,
    /// Blocks between two round bases
    pub interval: u64,
    /// First height at which the feeder is retired
    pub end_block: Option<u64>,
}

impl TokenFeeder {
    /// Active at `height`: `start_base_block <= height < end_block`
    pub fn is_active_at(&self, height: u64) -> bool {
        height >= self.start_base_block && self.end_block.map_or(true, |end| height < end)
    }

    /// Retired at `height` (end block reached)
    pub fn is_retired_at(&self, height: u64) -> bool {
        self.end_block.is_some_and(|end| height >= end)
    }

    /// Position of `height` in the interval schedule: `(based_block, round_id, offset)`
    pub fn schedule_at(&self, height: u64) -> Option<(u64, u64, u64)> {
        if height < self.start_base_block || self.interval == 0 {
            return None;
        }
        let delta = height - self.start_base_block;
        let offset = delta % self.interval;
        let count = delta / self.interval;
        Some((height - offset, self.start_round_id + count, offset))
    }
}

/// Which sources a rule requires
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SourceRequirement {
    /// Every valid source must be present
    AllValid,
    /// Exactly these sources must be present
    Listed(Vec<SourceId>),
}

/// At least `minimum` of `source_ids` must be present
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NominalSources {
    pub minimum: u32,
    pub source_ids: Vec<SourceId>,
}

/// Source composition rule for a feeder
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleSources {
    pub sources: SourceRequirement,
    pub nominal: Option<NominalSources>,
}

/// Consensus parameters
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Params {
    pub version: u64,
    pub sources: Vec<DataSource>,
    pub tokens: Vec<TokenInfo>,
    pub feeders: Vec<TokenFeeder>,
    pub rules: Vec<RuleSources>,
    /// Submissions per validator per round, also the submission window in blocks
    pub max_nonce: u32,
    pub threshold: Threshold,
    /// Distinct candidate ids tracked per validator and source
    pub max_det_id: u32,
    /// Historical rounds kept by the host's price history
    pub max_size_prices: u32,
}

impl Default for Params {
    fn default() -> Self {
        Self {
            version: 0,
            sources: Vec::new(),
            tokens: Vec::new(),
            feeders: Vec::new(),
            rules: Vec::new(),
            max_nonce: 3,
            threshold: Threshold::default(),
            max_det_id: 5,
            max_size_prices: 100,
        }
    }
}

impl Params {
    pub fn source(&self, id: SourceId) -> Option<&DataSource> {
        self.sources.iter().find(|s| s.id == id)
    }

    pub fn feeder(&self, id: FeederId) -> Option<&TokenFeeder> {
        position(id).and_then(|i| self.feeders.get(i))
    }

    pub fn token(&self, id: u64) -> Option<&TokenInfo> {
        position(id).and_then(|i| self.tokens.get(i))
    }

    pub fn rule(&self, id: u64) -> Option<&RuleSources> {
        position(id).and_then(|i| self.rules.get(i))
    }

    /// Feeders with their ids, ascending
    pub fn feeders_with_ids(&self) -> impl Iterator<Item = (FeederId, &TokenFeeder)> {
        self.feeders
            .iter()
            .enumerate()
            .map(|(i, f)| (i as FeederId + 1, f))
    }

    pub fn is_deterministic(&self, id: SourceId) -> bool {
        self.source(id).is_some_and(|s| s.deterministic)
    }

    /// Reject an inconsistent snapshot
    pub fn validate(&self) -> Result<(), ParamsError> {
        if self.max_nonce == 0 {
            return Err(ParamsError::ZeroMaxNonce);
        }
        if self.max_det_id == 0 {
            return Err(ParamsError::ZeroMaxDetId);
        }
        if !self.threshold.is_valid() {
            return Err(ParamsError::InvalidThreshold {
                numerator: self.threshold.numerator,
                denominator: self.threshold.denominator,
            });
        }

        for (rule_idx, rule) in self.rules.iter().enumerate() {
            let rule_id = rule_idx as u64 + 1;
            let listed = match &rule.sources {
                SourceRequirement::AllValid => &[][..],
                SourceRequirement::Listed(ids) => ids.as_slice(),
            };
            let nominal = rule
                .nominal
                .as_ref()
                .map(|n| n.source_ids.as_slice())
                .unwrap_or(&[]);
            for &source_id in listed.iter().chain(nominal) {
                if self.source(source_id).is_none() {
                    return Err(ParamsError::UnknownSource { rule_id, source_id });
                }
            }
            if let Some(n) = &rule.nominal {
                if n.minimum as usize > n.source_ids.len() {
                    return Err(ParamsError::NominalUnsatisfiable {
                        rule_id,
                        minimum: n.minimum,
                        available: n.source_ids.len(),
                    });
                }
            }
        }

        for (feeder_id, feeder) in self.feeders_with_ids() {
            if feeder.interval == 0 {
                return Err(ParamsError::ZeroInterval { feeder_id });
            }
            if let Some(end_block) = feeder.end_block {
                if end_block <= feeder.start_base_block {
                    return Err(ParamsError::FeederEndsBeforeStart {
                        feeder_id,
                        start_base_block: feeder.start_base_block,
                        end_block,
                    });
                }
            }
            if self.token(feeder.token_id).is_none() {
                return Err(ParamsError::UnknownToken {
                    feeder_id,
                    token_id: feeder.token_id,
                });
            }
            if self.rule(feeder.rule_id).is_none() {
                return Err(ParamsError::UnknownRule {
                    feeder_id,
                    rule_id: feeder.rule_id,
                });
            }
        }
        Ok(())
    }

    /// Check a submission's source ids against the feeder's rule.
    ///
    /// `submitted` must be free of duplicates.
    pub fn check_rule(&self, rule: &RuleSources, submitted: &[SourceId]) -> Result<(), String> {
        for &id in submitted {
            match self.source(id) {
                Some(s) if s.valid => {}
                Some(_) => return Err(format!("source {} is invalid", id)),
                None => return Err(format!("source {} is unknown", id)),
            }
        }

        let required: Vec<SourceId> = match &rule.sources {
            SourceRequirement::AllValid => self
                .sources
                .iter()
                .filter(|s| s.valid)
                .map(|s| s.id)
                .collect(),
            SourceRequirement::Listed(ids) => ids.clone(),
        };
        let nominal = rule
            .nominal
            .as_ref()
            .map(|n| n.source_ids.as_slice())
            .unwrap_or(&[]);

        if let Some(missing) = required.iter().find(|id| !submitted.contains(id)) {
            return Err(format!("required source {} missing", missing));
        }
        if let Some(extra) = submitted
            .iter()
            .find(|id| !required.contains(id) && !nominal.contains(id))
        {
            return Err(format!("source {} not allowed by rule", extra));
        }
        if let Some(n) = &rule.nominal {
            let present = n
                .source_ids
                .iter()
                .filter(|id| submitted.contains(id))
                .count();
            if present < n.minimum as usize {
                return Err(format!(
                    "only {} of {} nominal sources present",
                    present, n.minimum
                ));
            }
        }
        Ok(())
    }
}

fn position(id: u64) -> Option<usize> {
    id.checked_sub(1).map(|i| i as usize)
}

//! Round price aggregator
//!
//! Collects one report per validator. Non-deterministic sources are recorded
//! directly (latest submission wins). Deterministic sources are recorded as
//! placeholders and filled with the calculator's confirmed price, once.
//!
//! The round price is the median of per-validator medians, computed once
//! enough power has reported and at least one deterministic source has been
//! confirmed.

use super::calculator::ConfirmedPrice;
use super::message::PriceSource;
use super::price::{median, PriceValue};
use super::threshold::Threshold;
use super::validator::{Power, ValidatorId};
use super::SourceId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One source's entry in a validator report
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportEntry {
    /// `None` while a deterministic source awaits confirmation
    pub price: Option<PriceValue>,
    pub decimal: u8,
    pub timestamp: String,
    /// Confirmed candidate id, deterministic sources only
    pub det_id: Option<String>,
}

/// A validator's view of the round
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Report {
    pub power: Power,
    pub prices: BTreeMap<SourceId, ReportEntry>,
}

impl Report {
    /// Median of every priced source in this report
    pub fn median_price(&self) -> Option<PriceValue> {
        let prices: Vec<PriceValue> = self.prices.values().filter_map(|e| e.price).collect();
        median(&prices)
    }
}

/// Per-round aggregator
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Aggregator {
    threshold: Threshold,
    total_power: Power,
    report_power: Power,
    reports: BTreeMap<ValidatorId, Report>,
    /// First confirmation per deterministic source
    confirmed: BTreeMap<SourceId, ConfirmedPrice>,
    final_price: Option<PriceValue>,
}

impl Aggregator {
    pub fn new(threshold: Threshold, total_power: Power) -> Self {
        Self {
            threshold,
            total_power,
            report_power: Power::zero(),
            reports: BTreeMap::new(),
            confirmed: BTreeMap::new(),
            final_price: None,
        }
    }

    /// Record a validator's filtered sources.
    ///
    /// `is_deterministic` classifies sources by id.
    pub fn admit<F>(
        &mut self,
        sources: &[PriceSource],
        validator: ValidatorId,
        power: Power,
        is_deterministic: F,
    ) where
        F: Fn(SourceId) -> bool,
    {
        if !self.reports.contains_key(&validator) {
            self.report_power = self.report_power.saturating_add(power);
            self.reports.insert(
                validator,
                Report {
                    power,
                    prices: BTreeMap::new(),
                },
            );
        }
        let Some(report) = self.reports.get_mut(&validator) else {
            return;
        };

        for source in sources {
            let Some(latest) = source.prices.last() else {
                continue;
            };

            if !is_deterministic(source.source_id) {
                report.prices.insert(
                    source.source_id,
                    ReportEntry {
                        price: Some(latest.price),
                        decimal: latest.decimal,
                        timestamp: latest.timestamp.clone(),
                        det_id: None,
                    },
                );
                continue;
            }

            let priced = report
                .prices
                .get(&source.source_id)
                .is_some_and(|e| e.price.is_some());
            if priced {
                continue;
            }

            let entry = match self.confirmed.get(&source.source_id) {
                // Backfill from the earlier confirmation
                Some(hit) => ReportEntry {
                    price: Some(hit.price),
                    decimal: latest.decimal,
                    timestamp: hit.timestamp.clone(),
                    det_id: Some(hit.det_id.clone()),
                },
                None => ReportEntry {
                    price: None,
                    decimal: latest.decimal,
                    timestamp: String::new(),
                    det_id: None,
                },
            };
            report.prices.insert(source.source_id, entry);
        }
    }

    /// Apply newly confirmed deterministic prices.
    ///
    /// Only the first confirmation of a source is kept. It fills every report
    /// holding a placeholder for that source.
    pub fn confirm(&mut self, confirmed: &[ConfirmedPrice]) {
        for hit in confirmed {
            if self.confirmed.contains_key(&hit.source_id) {
                continue;
            }
            self.confirmed.insert(hit.source_id, hit.clone());

            for report in self.reports.values_mut() {
                if let Some(entry) = report.prices.get_mut(&hit.source_id) {
                    if entry.price.is_none() {
                        entry.price = Some(hit.price);
                        entry.timestamp = hit.timestamp.clone();
                        entry.det_id = Some(hit.det_id.clone());
                    }
                }
            }
        }
    }

    /// Compute the round price once quorum is reached.
    ///
    /// Memoized: once `Some`, every later call returns the same value.
    pub fn finalize(&mut self) -> Option<PriceValue> {
        if self.final_price.is_some() {
            return self.final_price;
        }
        if !self.threshold.exceeds(self.report_power, self.total_power) {
            return None;
        }
        if self.confirmed.is_empty() {
            return None;
        }

        let per_validator: Vec<PriceValue> =
            self.reports.values().filter_map(Report::median_price).collect();
        self.final_price = median(&per_validator);
        self.final_price
    }

    pub fn final_price(&self) -> Option<PriceValue> {
        self.final_price
    }

    pub fn report_power(&self) -> Power {
        self.report_power
    }

    pub fn report(&self, validator: &ValidatorId) -> Option<&Report> {
        self.reports.get(validator)
    }

    pub fn confirmed_source(&self, source_id: SourceId) -> Option<&ConfirmedPrice> {
        self.confirmed.get(&source_id)
    }
}

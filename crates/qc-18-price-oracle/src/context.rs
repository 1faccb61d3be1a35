//! # Round Manager
//!
//! `AggregatorContext` owns one [`Round`] per active feeder and the live
//! [`Worker`] of each open round, together with read-only snapshots of the
//! validator power table and the consensus params.
//!
//! ## Round Lifecycle
//!
//! ```text
//!            prepare_round (boundary)
//!   ┌──────────────────────────────────────────┐
//!   ↓                                          │
//! [OPEN] ──finalized / expired / forced──→ [CLOSED]
//!   │                                          │
//!   └──────── feeder end block reached ────────┴──→ (removed)
//! ```
//!
//! Two instances exist per process: the committed context, advanced by the
//! block-execution thread, and a [`SpeculativeBranch`] used for
//! pre-admission checks. A branch is a deep copy of rounds and workers; it
//! has no path back into the context it was cloned from.

use crate::cache::CheckpointHistory;
use crate::domain::{
    FeederId, Params, PriceSubmission, Round, SourceId, TokenFeeder, ValidatorPowers, Worker,
    WorkerOutcome,
};
use crate::error::{OracleError, OracleResult, ParamsError};
use crate::events::{BlockEndReport, FinalizedPriceEvent, SealedRound, SubmissionOutcome};
use sha3::{Digest, Keccak256};
use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Committed per-process consensus state
#[derive(Debug)]
pub struct AggregatorContext {
    params: Arc<Params>,
    validators: Arc<ValidatorPowers>,
    rounds: BTreeMap<FeederId, Round>,
    workers: BTreeMap<FeederId, Worker>,
}

impl AggregatorContext {
    pub fn new(params: Arc<Params>, validators: Arc<ValidatorPowers>) -> Self {
        Self {
            params,
            validators,
            rounds: BTreeMap::new(),
            workers: BTreeMap::new(),
        }
    }

    pub fn params(&self) -> &Params {
        &self.params
    }

    pub fn validators(&self) -> &ValidatorPowers {
        &self.validators
    }

    pub fn round(&self, feeder_id: FeederId) -> Option<&Round> {
        self.rounds.get(&feeder_id)
    }

    pub fn worker(&self, feeder_id: FeederId) -> Option<&Worker> {
        self.workers.get(&feeder_id)
    }

    pub fn rounds(&self) -> impl Iterator<Item = (&FeederId, &Round)> {
        self.rounds.iter()
    }

    pub fn open_round_count(&self) -> usize {
        self.rounds.values().filter(|r| r.is_open()).count()
    }

    /// Replace the params snapshot. Live workers keep the thresholds they
    /// were created with.
    pub fn set_params(&mut self, params: Params) -> OracleResult<()> {
        params.validate()?;
        self.params = Arc::new(params);
        Ok(())
    }

    pub fn set_validators(&mut self, validators: ValidatorPowers) {
        self.validators = Arc::new(validators);
    }

    /// Open, reset or close rounds at the start of block `height`
    pub fn prepare_round(&mut self, height: u64) {
        let max_nonce = self.params.max_nonce;

        for (feeder_id, feeder) in self.params.feeders_with_ids() {
            if !feeder.is_active_at(height) {
                continue;
            }
            let Some((based_block, round_id, offset)) = feeder.schedule_at(height) else {
                continue;
            };
            let fresh = if offset < max_nonce as u64 {
                Round::open(based_block, round_id)
            } else {
                Round::closed(based_block, round_id)
            };

            match self.rounds.get_mut(&feeder_id) {
                None => {
                    debug!(
                        feeder_id,
                        round_id,
                        based_block,
                        open = fresh.is_open(),
                        "[qc-18] Round created"
                    );
                    self.rounds.insert(feeder_id, fresh);
                }
                Some(round) if round.based_block != based_block || round.round_id != round_id => {
                    debug!(feeder_id, round_id, based_block, "[qc-18] Round reset");
                    *round = fresh;
                    self.workers.remove(&feeder_id);
                }
                Some(round) if round.is_open() && !round.accepts_at(height, max_nonce) => {
                    warn!(
                        feeder_id,
                        round_id,
                        height,
                        "[qc-18] Round still open past its window, closing"
                    );
                    round.close();
                    self.workers.remove(&feeder_id);
                }
                Some(_) => {}
            }
        }
    }

    /// Validate a submission and feed it to the round's worker.
    ///
    /// Every `Err` other than `InvariantViolation` leaves rounds untouched.
    pub fn admit(
        &mut self,
        msg: &PriceSubmission,
        height: u64,
    ) -> OracleResult<SubmissionOutcome> {
        let power = self
            .validators
            .power_of(&msg.validator)
            .ok_or(OracleError::UnknownValidator(msg.validator))?;
        let feeder = self
            .params
            .feeder(msg.feeder_id)
            .cloned()
            .ok_or(OracleError::UnknownFeeder(msg.feeder_id))?;
        if !feeder.is_active_at(height) {
            return Err(OracleError::FeederNotActive {
                feeder_id: msg.feeder_id,
                height,
            });
        }

        let round = match self.rounds.get(&msg.feeder_id) {
            Some(round) if round.is_open() => *round,
            _ => return Err(OracleError::RoundClosed(msg.feeder_id)),
        };
        if msg.based_block != round.based_block {
            return Err(OracleError::BasedBlockMismatch {
                feeder_id: msg.feeder_id,
                expected: round.based_block,
                actual: msg.based_block,
            });
        }
        let max_nonce = self.params.max_nonce;
        if msg.nonce == 0 || msg.nonce > max_nonce {
            return Err(OracleError::InvalidNonce {
                nonce: msg.nonce,
                max: max_nonce,
            });
        }

        let msg = msg.normalized();
        let decimal = self.check_shape(&msg, &feeder)?;

        let worker = match self.workers.entry(msg.feeder_id) {
            Entry::Occupied(entry) => {
                let worker = entry.into_mut();
                if worker.round_id() != round.round_id || worker.based_block() != round.based_block
                {
                    return Err(OracleError::InvariantViolation(format!(
                        "worker of feeder {} is for round {}, open round is {}",
                        msg.feeder_id,
                        worker.round_id(),
                        round.round_id
                    )));
                }
                worker
            }
            Entry::Vacant(entry) => entry.insert(Worker::new(
                msg.feeder_id,
                round.round_id,
                round.based_block,
                &self.params,
                &self.validators,
            )),
        };

        match worker.admit(&msg, power, &self.params)? {
            WorkerOutcome::Finalized(price) => {
                info!(
                    feeder_id = msg.feeder_id,
                    round_id = round.round_id,
                    height,
                    price = %price,
                    "[qc-18] Round finalized"
                );
                Ok(SubmissionOutcome::Finalized(FinalizedPriceEvent {
                    feeder_id: msg.feeder_id,
                    token_id: feeder.token_id,
                    round_id: round.round_id,
                    based_block: round.based_block,
                    height,
                    price,
                    decimal,
                }))
            }
            WorkerOutcome::Recorded => {
                debug!(
                    feeder_id = msg.feeder_id,
                    validator = %msg.validator,
                    nonce = msg.nonce,
                    "[qc-18] Submission recorded"
                );
                Ok(SubmissionOutcome::Accepted)
            }
            WorkerOutcome::Duplicate => Ok(SubmissionOutcome::Duplicate),
        }
    }

    /// Structural checks against the feeder's rule and token.
    ///
    /// Returns the token decimal.
    fn check_shape(&self, msg: &PriceSubmission, feeder: &TokenFeeder) -> OracleResult<u8> {
        let params = &self.params;
        let token = params
            .token(feeder.token_id)
            .ok_or(ParamsError::UnknownToken {
                feeder_id: msg.feeder_id,
                token_id: feeder.token_id,
            })?;
        let rule = params.rule(feeder.rule_id).ok_or(ParamsError::UnknownRule {
            feeder_id: msg.feeder_id,
            rule_id: feeder.rule_id,
        })?;

        if msg.sources.is_empty() {
            return Err(OracleError::MalformedSubmission(
                "no price sources".to_string(),
            ));
        }
        let mut seen: BTreeSet<SourceId> = BTreeSet::new();
        for source in &msg.sources {
            if !seen.insert(source.source_id) {
                return Err(OracleError::MalformedSubmission(format!(
                    "duplicate source {}",
                    source.source_id
                )));
            }
            if source.prices.is_empty() {
                return Err(OracleError::MalformedSubmission(format!(
                    "source {} has no prices",
                    source.source_id
                )));
            }
        }

        params
            .check_rule(rule, &msg.source_ids())
            .map_err(|reason| OracleError::RuleViolation {
                feeder_id: msg.feeder_id,
                reason,
            })?;

        for source in &msg.sources {
            if params.is_deterministic(source.source_id) {
                if source.prices.iter().any(|p| p.det_id.is_none()) {
                    return Err(OracleError::MalformedSubmission(format!(
                        "deterministic source {} has a candidate without det_id",
                        source.source_id
                    )));
                }
            } else if source.prices.len() != 1 || source.prices[0].det_id.is_some() {
                return Err(OracleError::MalformedSubmission(format!(
                    "source {} must carry exactly one price without det_id",
                    source.source_id
                )));
            }

            if let Some(bad) = source.prices.iter().find(|p| p.decimal != token.decimal) {
                return Err(OracleError::DecimalMismatch {
                    source_id: source.source_id,
                    expected: token.decimal,
                    actual: bad.decimal,
                });
            }
        }
        Ok(token.decimal)
    }

    /// Close rounds at the end of block `height`.
    ///
    /// Finalized rounds are reported with their price. Rounds that expired,
    /// whose feeder retired, or that are force-sealed are reported without
    /// one. Retired feeders lose their round entry.
    pub fn seal_round(&mut self, height: u64, force: bool) -> BlockEndReport {
        let mut report = BlockEndReport::new(height);
        let max_nonce = self.params.max_nonce;
        let feeder_ids: Vec<FeederId> = self.rounds.keys().copied().collect();

        for feeder_id in feeder_ids {
            let feeder = self.params.feeder(feeder_id);
            let retired = feeder.map_or(true, |f| f.is_retired_at(height));
            let token_id = feeder.map_or(0, |f| f.token_id);

            if let Some(round) = self.rounds.get_mut(&feeder_id) {
                if round.is_open() {
                    let finalized = self
                        .workers
                        .get(&feeder_id)
                        .and_then(Worker::final_price);
                    let sealed = SealedRound {
                        feeder_id,
                        token_id,
                        round_id: round.round_id,
                        based_block: round.based_block,
                        price: finalized,
                    };

                    if finalized.is_some() {
                        round.close();
                        report.sealed_with_price.push(sealed);
                    } else if retired || force || round.window_elapsed_at(height, max_nonce) {
                        if let Some(worker) = self.workers.get_mut(&feeder_id) {
                            worker.seal();
                        }
                        warn!(
                            feeder_id,
                            round_id = round.round_id,
                            height,
                            forced = force,
                            "[qc-18] Round sealed without price"
                        );
                        round.close();
                        report.sealed_without_price.push(sealed);
                    }
                }
                if !round.is_open() {
                    self.workers.remove(&feeder_id);
                }
            }

            if retired {
                info!(feeder_id, height, "[qc-18] Token feeder retired");
                self.rounds.remove(&feeder_id);
                self.workers.remove(&feeder_id);
                report.retired.push(feeder_id);
            }
        }
        report
    }

    /// Deep copy of rounds and workers for pre-admission checks.
    ///
    /// Params and validator snapshots are shared, never copied.
    pub fn clone_for_speculative_execution(&self, base_height: u64) -> SpeculativeBranch {
        SpeculativeBranch {
            base_height,
            context: AggregatorContext {
                params: Arc::clone(&self.params),
                validators: Arc::clone(&self.validators),
                rounds: self.rounds.clone(),
                workers: self.workers.clone(),
            },
        }
    }

    /// Keccak-256 over the canonical encoding of params, validators, rounds
    /// and workers. Equal on every node that processed the same blocks.
    pub fn state_digest(&self) -> OracleResult<[u8; 32]> {
        let encoded = bincode::serialize(&(
            &*self.params,
            &*self.validators,
            &self.rounds,
            &self.workers,
        ))
        .map_err(|e| OracleError::InvariantViolation(format!("state encoding failed: {}", e)))?;

        let mut hasher = Keccak256::new();
        hasher.update(&encoded);
        Ok(hasher.finalize().into())
    }

    /// Rebuild a context from committed history.
    ///
    /// Without a checkpoint the context starts fresh from `params` and
    /// `validators` at `latest_height`. Otherwise every block of the
    /// retention window up to the checkpoint height is re-executed: rounds
    /// prepared, cached messages admitted (rejections ignored), recorded
    /// table changes applied and rounds sealed.
    pub fn replay_from_checkpoint(
        history: &CheckpointHistory,
        params: Params,
        validators: ValidatorPowers,
        latest_height: u64,
    ) -> OracleResult<Replay> {
        let Some(last) = history.last_height else {
            params.validate()?;
            let mut context = AggregatorContext::new(Arc::new(params), Arc::new(validators));
            context.prepare_round(latest_height);
            info!(height = latest_height, "[qc-18] No checkpoint, starting fresh");
            return Ok(Replay {
                context,
                stats: ReplayStats::default(),
            });
        };

        let max_nonce = history
            .params
            .range(..=last)
            .next_back()
            .map(|(_, p)| p.max_nonce)
            .ok_or_else(|| {
                OracleError::InvariantViolation("checkpoint has no params entry".to_string())
            })?;
        let oldest_table = match (history.params.keys().next(), history.validators.keys().next()) {
            (Some(p), Some(v)) => (*p).max(*v),
            _ => {
                return Err(OracleError::InvariantViolation(
                    "checkpoint has no validator entry".to_string(),
                ))
            }
        };
        let from = last
            .saturating_add(1)
            .saturating_sub(max_nonce as u64)
            .max(oldest_table.saturating_add(1));

        let start_params = history.params_before(from).cloned().ok_or_else(|| {
            OracleError::InvariantViolation(format!("no params in effect at height {}", from))
        })?;
        let start_validators = history.validators_before(from).cloned().ok_or_else(|| {
            OracleError::InvariantViolation(format!("no validators in effect at height {}", from))
        })?;

        let mut context =
            AggregatorContext::new(Arc::new(start_params), Arc::new(start_validators));
        let mut stats = ReplayStats {
            from,
            to: last,
            ..ReplayStats::default()
        };

        for height in from..=last {
            context.prepare_round(height);

            for record in history.messages.get(&height).into_iter().flatten() {
                match context.admit(&record.submission, height) {
                    Ok(_) => stats.replayed += 1,
                    Err(e) if e.is_rejection() => {
                        debug!(height, reason = e.reason(), "[qc-18] Replayed message rejected");
                        stats.skipped += 1;
                    }
                    Err(e) => return Err(e),
                }
            }

            if let Some(params) = history.params.get(&height) {
                context.set_params(params.clone())?;
            }
            if let Some(validators) = history.validators.get(&height) {
                context.set_validators(validators.clone());
            }
            context.seal_round(height, history.forced_seals.contains(&height));
        }

        if stats.skipped > 0 {
            warn!(
                skipped = stats.skipped,
                "[qc-18] Replay skipped cached messages"
            );
        }
        info!(
            from = stats.from,
            to = stats.to,
            replayed = stats.replayed,
            "[qc-18] Recovered from checkpoint"
        );
        Ok(Replay { context, stats })
    }
}

/// Recovered context and replay counters
#[derive(Debug)]
pub struct Replay {
    pub context: AggregatorContext,
    pub stats: ReplayStats,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ReplayStats {
    pub from: u64,
    pub to: u64,
    pub replayed: usize,
    pub skipped: usize,
}

/// Disposable copy of an [`AggregatorContext`] for pre-admission checks
#[derive(Debug)]
pub struct SpeculativeBranch {
    base_height: u64,
    context: AggregatorContext,
}

impl SpeculativeBranch {
    /// Height of the committed block the branch was taken after
    pub fn base_height(&self) -> u64 {
        self.base_height
    }

    /// Prepare the branch for the block after its base
    pub fn prepare_next(&mut self) {
        self.context.prepare_round(self.base_height.saturating_add(1));
    }

    /// Run a submission as if executed in the next block
    pub fn check(&mut self, msg: &PriceSubmission) -> OracleResult<SubmissionOutcome> {
        let height = self.base_height.saturating_add(1);
        self.context.admit(msg, height)
    }

    pub fn state_digest(&self) -> OracleResult<[u8; 32]> {
        self.context.state_digest()
    }

    pub fn round(&self, feeder_id: FeederId) -> Option<&Round> {
        self.context.round(feeder_id)
    }
}

//! Price Oracle Service - host-facing block lifecycle
//!
//! Owns the committed [`AggregatorContext`], the speculative branch used by
//! pre-admission checks, and the checkpoint cache in front of the durable
//! store. Every entry point takes `&self`; the committed state is only ever
//! advanced by the host's block-execution thread.

use crate::cache::CheckpointCache;
use crate::config::OracleConfig;
use crate::context::{AggregatorContext, SpeculativeBranch};
use crate::domain::{Params, PriceSubmission, ValidatorPowers};
use crate::error::{OracleError, OracleResult};
use crate::events::{BlockEndReport, SubmissionOutcome};
use crate::metrics;
use crate::ports::inbound::OracleApi;
use crate::ports::outbound::{KeyValueStore, ParamsSource, ValidatorPowerSource};
use parking_lot::{Mutex, RwLock};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Internal state of the committed branch
struct OracleServiceState {
    context: Option<AggregatorContext>,
    cache: CheckpointCache,
    /// Block between `on_block_begin` and `on_block_end`
    current_height: Option<u64>,
    /// Last block whose end was processed (or the recovery height)
    last_ended: Option<u64>,
    /// Applied at the next block end
    pending_validators: Option<ValidatorPowers>,
    pending_params: Option<Params>,
    /// Report of a sealed block whose checkpoint write failed
    uncommitted_report: Option<BlockEndReport>,
}

impl OracleServiceState {
    fn new(config: &OracleConfig) -> Self {
        Self {
            context: None,
            cache: CheckpointCache::new(
                config.store_prefix.as_bytes().to_vec(),
                config.extra_retention_blocks,
            ),
            current_height: None,
            last_ended: None,
            pending_validators: None,
            pending_params: None,
            uncommitted_report: None,
        }
    }

    fn context(&self) -> OracleResult<&AggregatorContext> {
        self.context.as_ref().ok_or_else(not_recovered)
    }
}

fn not_recovered() -> OracleError {
    OracleError::InvariantViolation("oracle used before recover()".to_string())
}

/// Price Oracle Service
pub struct OracleService<S, V, P>
where
    S: KeyValueStore,
    V: ValidatorPowerSource,
    P: ParamsSource,
{
    config: OracleConfig,
    state: Arc<RwLock<OracleServiceState>>,
    speculative: Mutex<Option<SpeculativeBranch>>,
    store: Arc<RwLock<S>>,
    validator_source: Arc<V>,
    params_source: Arc<P>,
}

impl<S, V, P> OracleService<S, V, P>
where
    S: KeyValueStore,
    V: ValidatorPowerSource,
    P: ParamsSource,
{
    pub fn new(
        config: OracleConfig,
        store: Arc<RwLock<S>>,
        validator_source: Arc<V>,
        params_source: Arc<P>,
    ) -> Self {
        Self {
            state: Arc::new(RwLock::new(OracleServiceState::new(&config))),
            config,
            speculative: Mutex::new(None),
            store,
            validator_source,
            params_source,
        }
    }

    pub fn config(&self) -> &OracleConfig {
        &self.config
    }

    /// Block currently executing, if any
    pub fn current_height(&self) -> Option<u64> {
        self.state.read().current_height
    }

    pub fn last_committed(&self) -> Option<u64> {
        self.state.read().cache.last_committed()
    }

    /// Read access to the committed context
    pub fn with_context<R>(&self, f: impl FnOnce(&AggregatorContext) -> R) -> OracleResult<R> {
        let state = self.state.read();
        Ok(f(state.context()?))
    }

    fn invalidate_speculative(&self) {
        *self.speculative.lock() = None;
    }
}

impl<S, V, P> OracleApi for OracleService<S, V, P>
where
    S: KeyValueStore,
    V: ValidatorPowerSource,
    P: ParamsSource,
{
    fn recover(&self, latest_height: u64) -> OracleResult<()> {
        let mut guard = self.state.write();
        let state = &mut *guard;
        if state.context.is_some() {
            return Err(OracleError::InvariantViolation(
                "recover() called twice".to_string(),
            ));
        }

        let history = state.cache.load(&*self.store.read())?;
        let params = self.params_source.current_params()?;
        let validators = self.validator_source.current_validators()?;

        match history.last_height {
            None => {
                params.validate()?;
                state.cache.write_baseline(
                    &mut *self.store.write(),
                    latest_height,
                    &params,
                    &validators,
                )?;
            }
            Some(last) if last != latest_height => {
                error!(
                    checkpoint = last,
                    latest_height, "[qc-18] Checkpoint does not match host height"
                );
                return Err(OracleError::InvariantViolation(format!(
                    "checkpoint at {} but host is at {}",
                    last, latest_height
                )));
            }
            Some(_) => {}
        }

        let replay =
            AggregatorContext::replay_from_checkpoint(&history, params, validators, latest_height)
                .inspect_err(|e| error!(error = %e, "[qc-18] Recovery failed"))?;
        metrics::record_replayed(replay.stats.replayed);
        metrics::set_open_rounds(replay.context.open_round_count());

        state.context = Some(replay.context);
        state.last_ended = Some(latest_height);
        drop(guard);
        self.invalidate_speculative();
        Ok(())
    }

    fn on_block_begin(&self, height: u64) -> OracleResult<()> {
        let mut guard = self.state.write();
        let state = &mut *guard;
        let context = state.context.as_mut().ok_or_else(not_recovered)?;

        if let Some(current) = state.current_height {
            return Err(OracleError::InvariantViolation(format!(
                "block {} begins while block {} is open",
                height, current
            )));
        }
        if let Some(last) = state.last_ended {
            if height != last.saturating_add(1) {
                return Err(OracleError::InvariantViolation(format!(
                    "block {} begins after block {}",
                    height, last
                )));
            }
        }

        context.prepare_round(height);
        state.current_height = Some(height);
        debug!(height, "[qc-18] Block begin");
        Ok(())
    }

    fn submit(&self, msg: PriceSubmission) -> OracleResult<SubmissionOutcome> {
        let mut guard = self.state.write();
        let state = &mut *guard;
        let context = state.context.as_mut().ok_or_else(not_recovered)?;
        let height = state.current_height.ok_or_else(|| {
            OracleError::InvariantViolation("submit() outside of a block".to_string())
        })?;

        match context.admit(&msg, height) {
            Ok(outcome) => {
                // Anything that spent a nonce must be replayed
                if outcome != SubmissionOutcome::Duplicate {
                    state.cache.record_message(height, msg.normalized());
                    metrics::record_submission_accepted();
                }
                Ok(outcome)
            }
            Err(e) if e.is_rejection() => {
                debug!(
                    feeder_id = msg.feeder_id,
                    validator = %msg.validator,
                    reason = e.reason(),
                    "[qc-18] Submission rejected"
                );
                metrics::record_submission_rejected(e.reason());
                Err(e)
            }
            Err(e) => {
                error!(error = %e, height, "[qc-18] Submission failed");
                Err(e)
            }
        }
    }

    fn check_submission(&self, msg: &PriceSubmission) -> OracleResult<SubmissionOutcome> {
        let state = self.state.read();
        let context = state.context()?;
        let base = state.last_ended.ok_or_else(not_recovered)?;

        let mut speculative = self.speculative.lock();
        let stale = speculative
            .as_ref()
            .map_or(true, |branch| branch.base_height() != base);
        if stale || !self.config.reuse_speculative_branch {
            let mut branch = context.clone_for_speculative_execution(base);
            branch.prepare_next();
            *speculative = Some(branch);
        }

        match speculative.as_mut() {
            Some(branch) => branch.check(msg),
            None => Err(OracleError::InvariantViolation(
                "speculative branch missing".to_string(),
            )),
        }
    }

    fn on_block_end(&self, height: u64, force_seal_all: bool) -> OracleResult<BlockEndReport> {
        let mut guard = self.state.write();
        let state = &mut *guard;
        let context = state.context.as_mut().ok_or_else(not_recovered)?;
        if state.current_height != Some(height) {
            return Err(OracleError::InvariantViolation(format!(
                "block {} ends but open block is {:?}",
                height, state.current_height
            )));
        }

        // Rounds are already sealed if a previous commit attempt failed
        let report = match state.uncommitted_report.take() {
            Some(report) => {
                warn!(height, "[qc-18] Retrying checkpoint commit");
                report
            }
            None => {
                if let Some(params) = state.pending_params.take() {
                    context.set_params(params.clone())?;
                    state.cache.record_params(params);
                    info!(height, "[qc-18] Params updated");
                }
                let mut force = force_seal_all;
                if let Some(validators) = state.pending_validators.take() {
                    context.set_validators(validators.clone());
                    state.cache.record_validators(validators);
                    if self.config.force_seal_on_validator_change {
                        force = true;
                    }
                    info!(height, forced = force, "[qc-18] Validator set updated");
                }

                let report = context.seal_round(height, force);
                if force {
                    state.cache.record_forced_seal();
                }
                report
            }
        };

        let max_nonce = context.params().max_nonce;
        let open_rounds = context.open_round_count();
        if let Err(e) = state.cache.commit(&mut *self.store.write(), height, max_nonce) {
            error!(error = %e, height, "[qc-18] Checkpoint commit failed");
            state.uncommitted_report = Some(report);
            return Err(e.into());
        }

        state.current_height = None;
        state.last_ended = Some(height);
        drop(guard);
        self.invalidate_speculative();

        metrics::record_rounds_sealed(
            report.sealed_with_price.len(),
            report.sealed_without_price.len(),
        );
        metrics::set_open_rounds(open_rounds);
        if !report.sealed_without_price.is_empty() {
            warn!(
                height,
                failed = report.sealed_without_price.len(),
                "[qc-18] Rounds failed, previous price applies"
            );
        }
        Ok(report)
    }

    fn update_validators(&self, powers: ValidatorPowers) -> OracleResult<()> {
        let mut state = self.state.write();
        info!(
            validators = powers.len(),
            total_power = %powers.total_power(),
            "[qc-18] Validator set change scheduled"
        );
        state.pending_validators = Some(powers);
        Ok(())
    }

    fn update_params(&self, params: Params) -> OracleResult<()> {
        params.validate()?;
        let mut state = self.state.write();
        info!(version = params.version, "[qc-18] Params change scheduled");
        state.pending_params = Some(params);
        Ok(())
    }

    fn state_digest(&self) -> OracleResult<[u8; 32]> {
        self.state.read().context()?.state_digest()
    }
}

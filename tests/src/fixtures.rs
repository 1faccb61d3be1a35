//! Shared builders for integration tests and benchmarks

use parking_lot::RwLock;
use qc_18_price_oracle::adapters::{InMemoryKVStore, StaticParamsSource, StaticValidatorSource};
use qc_18_price_oracle::{
    BlockEndReport, DataSource, FeederId, OracleApi, OracleConfig, OracleResult, OracleService,
    Params, Power, PriceCandidate, PriceSource, PriceSubmission, RuleSources, SourceRequirement,
    SubmissionOutcome, TokenFeeder, TokenInfo, ValidatorId, ValidatorPowers,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::{Arc, Once};

pub type TestService = OracleService<InMemoryKVStore, StaticValidatorSource, StaticParamsSource>;

static LOGGING: Once = Once::new();

/// Install a quiet subscriber once per test binary
pub fn init_test_logging() {
    LOGGING.call_once(|| {
        let config = oracle_telemetry::TelemetryConfig {
            log_level: "warn".to_string(),
            ..oracle_telemetry::TelemetryConfig::default()
        };
        let _ = oracle_telemetry::init_logging(&config);
    });
}

pub fn validator_id(n: u8) -> ValidatorId {
    ValidatorId([n; 32])
}

/// Validators `1..=count` with the given powers
pub fn validators_with_powers(powers: &[u64]) -> ValidatorPowers {
    ValidatorPowers::from_entries(
        powers
            .iter()
            .enumerate()
            .map(|(i, p)| (validator_id(i as u8 + 1), Power::from(*p))),
    )
}

/// One deterministic source (1), one market source (2), one ETH feeder
/// every 10 blocks from block 1.
pub fn single_feeder_params() -> Params {
    Params {
        sources: vec![
            DataSource {
                id: 1,
                name: "chainlink".into(),
                deterministic: true,
                valid: true,
            },
            DataSource {
                id: 2,
                name: "exchange".into(),
                deterministic: false,
                valid: true,
            },
        ],
        tokens: vec![TokenInfo {
            name: "ETH".into(),
            decimal: 8,
            active: true,
        }],
        feeders: vec![TokenFeeder {
            token_id: 1,
            rule_id: 1,
            start_round_id: 1,
            start_base_block: 1,
            interval: 10,
            end_block: None,
        }],
        rules: vec![RuleSources {
            sources: SourceRequirement::AllValid,
            nominal: None,
        }],
        ..Params::default()
    }
}

/// Two tokens with overlapping schedules
pub fn two_feeder_params() -> Params {
    let mut params = single_feeder_params();
    params.tokens.push(TokenInfo {
        name: "BTC".into(),
        decimal: 8,
        active: true,
    });
    params.feeders[0].interval = 5;
    params.feeders.push(TokenFeeder {
        token_id: 2,
        rule_id: 1,
        start_round_id: 1,
        start_base_block: 3,
        interval: 7,
        end_block: None,
    });
    params
}

pub fn submission(
    validator: u8,
    feeder_id: FeederId,
    based_block: u64,
    nonce: u32,
    det: Option<(&str, u64)>,
    market: Option<u64>,
) -> PriceSubmission {
    let mut sources = Vec::new();
    if let Some((det_id, price)) = det {
        sources.push(PriceSource::new(
            1,
            vec![PriceCandidate::deterministic(det_id, price, 8, "ts")],
        ));
    }
    if let Some(price) = market {
        sources.push(PriceSource::new(
            2,
            vec![PriceCandidate::market(price, 8, "ts")],
        ));
    }
    PriceSubmission::new(validator_id(validator), feeder_id, based_block, nonce, sources)
}

/// Everything a node is fed for one block
#[derive(Clone, Debug)]
pub struct BlockPlan {
    pub height: u64,
    pub submissions: Vec<PriceSubmission>,
    pub validators: Option<ValidatorPowers>,
    pub params: Option<Params>,
    pub force: bool,
}

/// Observable results of one block
#[derive(Clone, Debug, PartialEq)]
pub struct BlockResult {
    pub outcomes: Vec<OracleResult<SubmissionOutcome>>,
    pub report: BlockEndReport,
    pub digest: [u8; 32],
}

/// Seeded plan over `blocks` blocks starting at height 1.
///
/// Mixes valid submissions, duplicates, stale base blocks and unknown
/// validators; changes the validator set and params a few times.
pub fn random_plan(seed: u64, blocks: u64) -> Vec<BlockPlan> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut params = two_feeder_params();
    let mut plans = Vec::new();

    for height in 1..=blocks {
        let mut submissions = Vec::new();
        for (feeder_id, feeder) in params.feeders_with_ids() {
            let Some((based_block, _, _)) = feeder.schedule_at(height) else {
                continue;
            };
            if !feeder.is_active_at(height) {
                continue;
            }
            for validator in 1..=5u8 {
                if !rng.gen_bool(0.4) {
                    continue;
                }
                let based = if rng.gen_bool(0.05) {
                    based_block + 1
                } else {
                    based_block
                };
                let nonce = rng.gen_range(1..=params.max_nonce);
                let det_id = if rng.gen_bool(0.8) { "1" } else { "2" };
                let det_price = if rng.gen_bool(0.85) { 100 } else { 101 };
                let market = rng.gen_range(90..=110u64);
                submissions.push(submission(
                    validator,
                    feeder_id,
                    based,
                    nonce,
                    Some((det_id, det_price)),
                    Some(market),
                ));
            }
        }

        let validators = match height % 23 {
            0 => Some(validators_with_powers(&[
                rng.gen_range(1..=5),
                rng.gen_range(1..=5),
                rng.gen_range(1..=5),
                rng.gen_range(1..=5),
            ])),
            _ => None,
        };
        let params_update = if height == blocks / 2 {
            let mut next = params.clone();
            next.version += 1;
            next.feeders[1].end_block = Some(height + 9);
            next.feeders.push(TokenFeeder {
                token_id: 1,
                rule_id: 1,
                start_round_id: 1,
                start_base_block: height + 2,
                interval: 4,
                end_block: None,
            });
            params = next.clone();
            Some(next)
        } else {
            None
        };

        plans.push(BlockPlan {
            height,
            submissions,
            validators,
            params: params_update,
            force: rng.gen_bool(0.02),
        });
    }
    plans
}

/// A node: service plus the store it writes to
pub struct Node {
    pub store: Arc<RwLock<InMemoryKVStore>>,
    pub service: TestService,
}

impl Node {
    /// Fresh node on a new store, recovered at height 0
    pub fn fresh(config: OracleConfig, params: Params, validators: ValidatorPowers) -> Self {
        let node = Self::on_store(
            config,
            Arc::new(RwLock::new(InMemoryKVStore::new())),
            params,
            validators,
        );
        node.service.recover(0).expect("fresh recovery");
        node
    }

    /// Node over an existing store. Not recovered yet.
    pub fn on_store(
        config: OracleConfig,
        store: Arc<RwLock<InMemoryKVStore>>,
        params: Params,
        validators: ValidatorPowers,
    ) -> Self {
        let service = OracleService::new(
            config,
            Arc::clone(&store),
            Arc::new(StaticValidatorSource::new(validators)),
            Arc::new(StaticParamsSource::new(params)),
        );
        Self { store, service }
    }

    /// Copy of the durable store, as if the process died now
    pub fn crash_snapshot(&self) -> Arc<RwLock<InMemoryKVStore>> {
        Arc::new(RwLock::new(self.store.read().clone()))
    }

    pub fn run_block(&self, plan: &BlockPlan) -> BlockResult {
        self.run_block_with_checks(plan, false)
    }

    /// Run a block; with `check_first`, every submission is also checked
    /// against the speculative branch before execution.
    pub fn run_block_with_checks(&self, plan: &BlockPlan, check_first: bool) -> BlockResult {
        self.service
            .on_block_begin(plan.height)
            .expect("block begin");

        let mut outcomes = Vec::with_capacity(plan.submissions.len());
        for msg in &plan.submissions {
            if check_first {
                let _ = self.service.check_submission(msg);
            }
            outcomes.push(self.service.submit(msg.clone()));
        }
        if let Some(validators) = &plan.validators {
            self.service
                .update_validators(validators.clone())
                .expect("validator update");
        }
        if let Some(params) = &plan.params {
            self.service
                .update_params(params.clone())
                .expect("params update");
        }

        let report = self
            .service
            .on_block_end(plan.height, plan.force)
            .expect("block end");
        tracing::debug!(
            height = plan.height,
            sealed = report.sealed_with_price.len(),
            failed = report.sealed_without_price.len(),
            "block executed"
        );
        BlockResult {
            outcomes,
            report,
            digest: self.service.state_digest().expect("digest"),
        }
    }
}

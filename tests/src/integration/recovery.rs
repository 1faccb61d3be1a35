//! Crash after block k, recover from the durable store, keep going

#[cfg(test)]
mod tests {
    use crate::fixtures::*;
    use qc_18_price_oracle::{
        OracleApi, OracleConfig, OracleError, SourceRequirement, SubmissionOutcome,
    };
    use std::collections::BTreeMap;

    const BLOCKS: u64 = 60;

    fn initial_validators() -> qc_18_price_oracle::ValidatorPowers {
        validators_with_powers(&[1, 2, 3, 4])
    }

    /// Run the whole plan, snapshotting the store after each crash point
    fn reference_run(
        config: &OracleConfig,
        plan: &[BlockPlan],
        crash_points: &[u64],
    ) -> (Vec<BlockResult>, BTreeMap<u64, Node>) {
        let node = Node::fresh(config.clone(), two_feeder_params(), initial_validators());
        let mut results = Vec::new();
        let mut crashed = BTreeMap::new();

        for block in plan {
            results.push(node.run_block(block));
            if crash_points.contains(&block.height) {
                let restarted = Node::on_store(
                    config.clone(),
                    node.crash_snapshot(),
                    two_feeder_params(),
                    initial_validators(),
                );
                crashed.insert(block.height, restarted);
            }
        }
        (results, crashed)
    }

    fn assert_recovers(config: OracleConfig, seed: u64, crash_points: &[u64]) {
        let plan = random_plan(seed, BLOCKS);
        let (expected, crashed) = reference_run(&config, &plan, crash_points);

        for (height, node) in crashed {
            node.service.recover(height).expect("recover");
            let index = height as usize - 1;
            assert_eq!(
                node.service.state_digest().unwrap(),
                expected[index].digest,
                "recovered state differs at height {}",
                height
            );

            for (block, want) in plan[index + 1..].iter().zip(&expected[index + 1..]) {
                let got = node.run_block(block);
                assert_eq!(&got, want, "crash at {}, divergence at {}", height, block.height);
            }
        }
    }

    #[test]
    fn test_recover_anywhere_matches_uninterrupted_run() {
        init_test_logging();
        // Covers the params change at 30 and validator changes at 23 and 46
        assert_recovers(OracleConfig::default(), 21, &[1, 2, 5, 23, 24, 30, 31, 46, 59]);
    }

    #[test]
    fn test_recover_with_extra_retention() {
        init_test_logging();
        let config = OracleConfig {
            extra_retention_blocks: 8,
            ..OracleConfig::default()
        };
        assert_recovers(config, 22, &[3, 17, 40]);
    }

    #[test]
    fn test_recover_without_forced_seals_on_validator_change() {
        init_test_logging();
        let config = OracleConfig {
            force_seal_on_validator_change: false,
            ..OracleConfig::default()
        };
        assert_recovers(config, 23, &[22, 23, 24, 25]);
    }

    #[test]
    fn test_two_recoveries_agree() {
        init_test_logging();
        let config = OracleConfig::default();
        let plan = random_plan(5, 20);
        let node = Node::fresh(config.clone(), two_feeder_params(), initial_validators());
        for block in &plan {
            node.run_block(block);
        }

        let first = Node::on_store(
            config.clone(),
            node.crash_snapshot(),
            two_feeder_params(),
            initial_validators(),
        );
        let second = Node::on_store(
            config,
            node.crash_snapshot(),
            two_feeder_params(),
            initial_validators(),
        );
        first.service.recover(20).unwrap();
        second.service.recover(20).unwrap();

        let digest = node.service.state_digest().unwrap();
        assert_eq!(first.service.state_digest().unwrap(), digest);
        assert_eq!(second.service.state_digest().unwrap(), digest);
    }

    #[test]
    fn test_recover_at_wrong_height_is_fatal() {
        init_test_logging();
        let config = OracleConfig::default();
        let plan = random_plan(5, 10);
        let node = Node::fresh(config.clone(), two_feeder_params(), initial_validators());
        for block in &plan {
            node.run_block(block);
        }

        let restarted = Node::on_store(
            config,
            node.crash_snapshot(),
            two_feeder_params(),
            initial_validators(),
        );
        let err = restarted.service.recover(9).unwrap_err();
        assert!(matches!(err, OracleError::InvariantViolation(_)));
        assert!(err.is_fatal());
    }

    #[test]
    fn test_store_stays_bounded() {
        init_test_logging();
        let config = OracleConfig::default();
        let node = Node::fresh(config, two_feeder_params(), initial_validators());

        let mut sizes = Vec::new();
        for block in &random_plan(9, 200) {
            node.run_block(block);
            sizes.push(node.store.read().len());
        }

        // Retention window is max_nonce blocks; the table history is pruned too
        let late_max = sizes[100..].iter().copied().max().unwrap_or(0);
        let early_max = sizes[..100].iter().copied().max().unwrap_or(0);
        assert!(late_max <= early_max + 2, "store grew: {} -> {}", early_max, late_max);
    }

    #[test]
    fn test_recover_after_repeated_candidates_on_fresh_nonces() {
        init_test_logging();
        let mut params = single_feeder_params();
        params.rules[0].sources = SourceRequirement::Listed(vec![1]);
        let config = OracleConfig::default();
        let validators = validators_with_powers(&[1, 1, 1]);
        let det = |validator: u8, nonce: u32, det_id: &str| {
            submission(validator, 1, 1, nonce, Some((det_id, 10)), None)
        };

        let live = Node::fresh(config.clone(), params.clone(), validators.clone());
        let first = BlockPlan {
            height: 1,
            submissions: vec![det(1, 1, "9"), det(1, 2, "9"), det(2, 1, "9")],
            validators: None,
            params: None,
            force: false,
        };
        let result = live.run_block(&first);
        assert_eq!(result.outcomes[1], Ok(SubmissionOutcome::Accepted));

        let restarted = Node::on_store(config, live.crash_snapshot(), params, validators);
        restarted.service.recover(1).unwrap();
        assert_eq!(restarted.service.state_digest().unwrap(), result.digest);

        let second = BlockPlan {
            height: 2,
            submissions: vec![det(1, 2, "10"), det(1, 3, "10"), det(3, 1, "9")],
            ..first
        };
        let expected = live.run_block(&second);
        assert_eq!(expected.outcomes[0], Ok(SubmissionOutcome::Duplicate));
        assert_eq!(restarted.run_block(&second), expected);
    }
}

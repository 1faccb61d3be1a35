//! A validator flooding submissions cannot grow round state or block others

#[cfg(test)]
mod tests {
    use crate::fixtures::*;
    use qc_18_price_oracle::{
        OracleApi, OracleConfig, PriceCandidate, PriceSource, PriceSubmission, PriceValue,
        SubmissionOutcome,
    };

    /// Many distinct candidate ids per message, nonces cycling through the window
    fn spam(count: u32) -> Vec<PriceSubmission> {
        (0..count)
            .map(|i| {
                let candidates = (0..8u64)
                    .map(|c| {
                        let id = format!("s{}", u64::from(i) * 8 + c);
                        PriceCandidate::deterministic(id, 10 + c, 8, "ts")
                    })
                    .collect();
                PriceSubmission::new(
                    validator_id(1),
                    1,
                    1,
                    i % 3 + 1,
                    vec![
                        PriceSource::new(1, candidates),
                        PriceSource::new(2, vec![PriceCandidate::market(1000u64, 8, "ts")]),
                    ],
                )
            })
            .collect()
    }

    #[test]
    fn test_flooding_validator_is_bounded() {
        init_test_logging();
        let params = single_feeder_params();
        let node = Node::fresh(
            OracleConfig::default(),
            params.clone(),
            validators_with_powers(&[1, 1, 1, 1]),
        );

        let mut submissions = spam(200);
        submissions.extend((2..=4).map(|v| submission(v, 1, 1, 1, Some(("9", 10)), Some(20))));
        let plan = BlockPlan {
            height: 1,
            submissions,
            validators: None,
            params: None,
            force: false,
        };

        node.service.on_block_begin(1).expect("block begin");
        for msg in &plan.submissions[..200] {
            let outcome = node.service.submit(msg.clone()).expect("spam is not an error");
            assert_ne!(outcome.finalized().map(|e| e.feeder_id), Some(1));
        }

        let (nonces, det_ids) = node
            .service
            .with_context(|ctx| {
                let filter = ctx.worker(1).and_then(|w| w.filter()).cloned();
                filter.map(|f| {
                    (
                        f.used_nonces(&validator_id(1)),
                        f.seen_det_ids(&validator_id(1), 1),
                    )
                })
            })
            .unwrap()
            .expect("worker active");
        assert_eq!(nonces, params.max_nonce as usize);
        assert!(det_ids <= params.max_det_id as usize);

        let mut outcomes = Vec::new();
        for msg in &plan.submissions[200..] {
            outcomes.push(node.service.submit(msg.clone()));
        }
        assert_eq!(outcomes[0], Ok(SubmissionOutcome::Accepted));
        assert_eq!(outcomes[1], Ok(SubmissionOutcome::Accepted));
        // Spammer's report is backfilled with the confirmed price: medians 505, 15, 15, 15
        let event = outcomes[2]
            .as_ref()
            .ok()
            .and_then(SubmissionOutcome::finalized)
            .cloned()
            .expect("honest quorum finalizes");
        assert_eq!(event.price, PriceValue::from(15));

        let report = node.service.on_block_end(1, false).unwrap();
        assert_eq!(report.sealed_with_price.len(), 1);
    }

    #[test]
    fn test_flood_leaves_checkpoint_small() {
        init_test_logging();
        let node = Node::fresh(
            OracleConfig::default(),
            single_feeder_params(),
            validators_with_powers(&[1, 1, 1, 1]),
        );
        let plan = BlockPlan {
            height: 1,
            submissions: spam(500),
            validators: None,
            params: None,
            force: false,
        };
        let result = node.run_block(&plan);

        let accepted = result
            .outcomes
            .iter()
            .filter(|o| matches!(o, Ok(SubmissionOutcome::Accepted)))
            .count();
        let duplicates = result
            .outcomes
            .iter()
            .filter(|o| matches!(o, Ok(SubmissionOutcome::Duplicate)))
            .count();
        assert_eq!(accepted, 3);
        assert_eq!(duplicates, 497);
    }
}

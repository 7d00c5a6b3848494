
#[cfg(test)]
mod tests {
    use alloy_primitives::{B256, U256};
    use masked_pool_lib::*;
    use masked_pool_pipeline::{
        build_proof, fetch_history, find_owned, gate, rebuild, verify, IntegrityError, LedgerError,
        OwnershipError, ProofBundle, ProvingEngine, RetrievalError, SelectionPolicy,
        SettlementError, TreeParameters, WithdrawError, WithdrawPipeline,
    };

    use crate::doubles::*;

    fn config() -> TreeConfig {
        TreeConfig::new(32, 2, ZERO_LEAF).unwrap()
    }

    /// Three deposits, only index 2 owned by `secret(7)`.
    fn three_deposits() -> MemoryLedger {
        let mut ledger = MemoryLedger::new(config());
        ledger.deposit(deposit_for(&secret(11), 1, 500));
        ledger.deposit(deposit_for(&secret(12), 2, 700));
        ledger.deposit(deposit_for(&secret(7), 3, 900));
        ledger
    }

    /// Scenario 1: nothing to withdraw from an empty pool.
    #[tokio::test]
    async fn test_empty_history_is_an_ownership_error() {
        let ledger = MemoryLedger::new(config());
        let engine = CircuitEngine::new();
        let pipeline = WithdrawPipeline::new(&ledger, &ledger, &engine, config());

        let err = pipeline.run(&secret(7), SelectionPolicy::First).await.unwrap_err();
        assert!(matches!(
            err,
            WithdrawError::Ownership(OwnershipError::NoneOwned { scanned: 0 })
        ));
        assert_eq!(engine.prove_calls(), 0);
        assert!(ledger.withdrawals().is_empty());
    }

    /// Scenario 2: a single one-unit deposit at index 0.
    #[tokio::test]
    async fn test_single_deposit_matches_ledger_root() {
        let mut ledger = MemoryLedger::new(config());
        ledger.deposit(deposit_for(&secret(7), 42, 1));

        let history = fetch_history(&ledger).await.unwrap();
        let tree = rebuild(config(), &history).unwrap();
        assert_eq!(B256::from(tree.root()), ledger.root_at(1));
        assert_ne!(tree.root(), tree.zeros()[32]);

        let path = tree.gen_path(0).unwrap();
        assert_eq!(path.steps.len(), 32);
        assert!(verify_inclusion(history.leaves[0], &path, tree.root()));

        let engine = CircuitEngine::new();
        let pipeline = WithdrawPipeline::new(&ledger, &ledger, &engine, config());
        let outcome = pipeline.run(&secret(7), SelectionPolicy::First).await.unwrap();
        assert_eq!(outcome.leaf_index, 0);
        assert_eq!(outcome.value, 1);
        assert_eq!(outcome.root, ledger.root_at(1));
        assert_eq!(ledger.withdrawals().len(), 1);
    }

    /// Scenario 3: only index 2 is ours, and borrowed points do not verify.
    #[tokio::test]
    async fn test_proof_for_owned_index_only() {
        let ledger = three_deposits();
        let history = fetch_history(&ledger).await.unwrap();
        let owned = find_owned(&history.records, &secret(7));
        assert_eq!(owned, vec![2]);

        let tree = rebuild(config(), &history).unwrap();
        let engine = CircuitEngine::new();
        let bundle = build_proof(&engine, &tree, &history.records[2], 2, &secret(7)).unwrap();
        assert!(verify(&engine, &bundle));

        let mut borrowed = bundle.clone();
        borrowed.public_signals.masked_p = history.records[0].masked_p;
        borrowed.public_signals.masked_q = history.records[0].masked_q;
        assert!(!verify(&engine, &borrowed));

        // Index 0's points claimed at index 2 cannot even be proved.
        let err = build_proof(&engine, &tree, &history.records[0], 2, &secret(7)).unwrap_err();
        assert!(matches!(err, WithdrawError::ProofGeneration { leaf_index: 2, .. }));
    }

    /// Scenario 4: the ledger's tree disagrees with ours.
    #[tokio::test]
    async fn test_corrupted_root_stops_before_proving() {
        let mut ledger = three_deposits();
        ledger.tamper_leaf(1);
        let engine = CircuitEngine::new();
        let pipeline = WithdrawPipeline::new(&ledger, &ledger, &engine, config());

        let err = pipeline.run(&secret(7), SelectionPolicy::First).await.unwrap_err();
        match err {
            WithdrawError::Integrity(IntegrityError::RootMismatch {
                leaf_count,
                local,
                ledger: ledger_root,
            }) => {
                assert_eq!(leaf_count, 3);
                assert_eq!(ledger_root, ledger.root_at(3));
                assert_ne!(local, ledger_root);
            }
            other => panic!("expected root mismatch, got {other}"),
        }
        assert_eq!(engine.prove_calls(), 0);
        assert!(ledger.withdrawals().is_empty());
    }

    /// Scenario 5: a well-formed but tampered bundle never reaches the ledger.
    #[tokio::test]
    async fn test_tampered_proof_is_never_submitted() {
        let ledger = three_deposits();
        let engine = TamperingEngine {
            inner: CircuitEngine::new(),
            tamper: Tamper::Proof,
        };
        let pipeline = WithdrawPipeline::new(&ledger, &ledger, &engine, config());

        let err = pipeline.run(&secret(7), SelectionPolicy::First).await.unwrap_err();
        assert!(matches!(
            err,
            WithdrawError::VerificationFailure { leaf_index: 2, .. }
        ));
        assert_eq!(err.stage(), "verify");
        assert!(ledger.withdrawals().is_empty());
    }

    #[tokio::test]
    async fn test_unreachable_ledger_fails_before_proving() {
        for fault in [ReadFault::Snapshot, ReadFault::Events] {
            let mut ledger = three_deposits();
            ledger.fail_reads(fault);
            let engine = CircuitEngine::new();
            let pipeline = WithdrawPipeline::new(&ledger, &ledger, &engine, config());

            let err = pipeline.run(&secret(7), SelectionPolicy::First).await.unwrap_err();
            match (fault, &err) {
                (
                    ReadFault::Snapshot,
                    WithdrawError::Retrieval(RetrievalError::Ledger(LedgerError::Timeout(60))),
                ) => {}
                (
                    ReadFault::Events,
                    WithdrawError::Retrieval(RetrievalError::Ledger(LedgerError::Rpc(_))),
                ) => {}
                _ => panic!("{fault:?}: expected a ledger read error, got {err}"),
            }
            assert_eq!(err.stage(), "ledger");
            assert_eq!(engine.prove_calls(), 0);
            assert!(ledger.withdrawals().is_empty());
        }
    }

    #[tokio::test]
    async fn test_junk_deposit_does_not_block_withdrawals() {
        let word = |n: u8| {
            let mut w = [0u8; 32];
            w[31] = n;
            w
        };
        // (1, 1) is not on secp256k1: 1 != 1 + 7.
        let junk = CurvePoint {
            x: word(1),
            y: word(1),
        };
        let mut ledger = MemoryLedger::new(config());
        ledger.deposit(DepositRecord {
            masked_p: junk,
            masked_q: junk,
            value: 1_000,
        });
        ledger.deposit(deposit_for(&secret(7), 3, 900));
        let engine = CircuitEngine::new();
        let pipeline = WithdrawPipeline::new(&ledger, &ledger, &engine, config());

        let report = pipeline.scan(&secret(7)).await.unwrap();
        assert_eq!(report.history.len(), 2);
        assert_eq!(report.owned, vec![1]);

        let err = pipeline.prepare(&secret(7), SelectionPolicy::Index(0)).await.unwrap_err();
        assert!(matches!(
            err,
            WithdrawError::Ownership(OwnershipError::NotOwned { index: 0 })
        ));

        let outcome = pipeline.run(&secret(7), SelectionPolicy::First).await.unwrap();
        assert_eq!((outcome.leaf_index, outcome.value), (1, 900));
        assert_eq!(outcome.root, ledger.root_at(2));
        assert_eq!(ledger.withdrawals().len(), 1);
    }

    #[tokio::test]
    async fn test_engine_reporting_other_signals_is_rejected() {
        let ledger = three_deposits();
        let engine = TamperingEngine {
            inner: CircuitEngine::new(),
            tamper: Tamper::Value,
        };
        let pipeline = WithdrawPipeline::new(&ledger, &ledger, &engine, config());

        let err = pipeline.run(&secret(7), SelectionPolicy::First).await.unwrap_err();
        assert!(matches!(err, WithdrawError::ProofGeneration { leaf_index: 2, .. }));
        assert!(ledger.withdrawals().is_empty());
    }

    #[tokio::test]
    async fn test_mutating_any_signal_fails_verification() {
        let ledger = three_deposits();
        let history = fetch_history(&ledger).await.unwrap();
        let tree = rebuild(config(), &history).unwrap();
        let engine = CircuitEngine::new();
        let bundle = build_proof(&engine, &tree, &history.records[2], 2, &secret(7)).unwrap();

        let mutations: [fn(&mut PublicSignals); 5] = [
            |s| s.root[31] ^= 1,
            |s| s.leaf_index += 1,
            |s| s.value -= 1,
            |s| s.masked_p.x[0] ^= 1,
            |s| s.masked_q.y[31] ^= 1,
        ];
        for mutate in mutations {
            let mut copy: ProofBundle<_> = bundle.clone();
            mutate(&mut copy.public_signals);
            assert!(!verify(&engine, &copy));
            assert!(gate(&engine, copy).is_err());
        }
    }

    #[tokio::test]
    async fn test_submitted_index_is_the_proved_index() {
        let mut ledger = three_deposits();
        ledger.deposit(deposit_for(&secret(7), 4, 5_000));
        ledger.deposit(deposit_for(&secret(7), 5, 50));
        let engine = CircuitEngine::new();
        let pipeline = WithdrawPipeline::new(&ledger, &ledger, &engine, config());

        let outcome = pipeline.run(&secret(7), SelectionPolicy::Nth(1)).await.unwrap();
        assert_eq!(outcome.leaf_index, 3);

        let calls = ledger.withdrawals();
        assert_eq!(calls.len(), 1);
        let call = &calls[0];
        assert_eq!(call.leaf_index, U256::from(3));
        assert_eq!(call.pub_signals[1], call.leaf_index);
        assert_eq!(call.pub_signals[0], U256::from_be_bytes(ledger.root_at(5).0));
        assert_eq!(call.pub_signals[2], U256::from(5_000));
    }

    #[tokio::test]
    async fn test_selection_policies_through_pipeline() {
        let mut ledger = MemoryLedger::new(config());
        for (blinding, value) in [(1, 10u128), (2, 300), (3, 20)] {
            ledger.deposit(deposit_for(&secret(7), blinding, value));
        }
        ledger.deposit(deposit_for(&secret(8), 4, 9_999));
        let engine = CircuitEngine::new();
        let pipeline = WithdrawPipeline::new(&ledger, &ledger, &engine, config());

        let prepared = pipeline.prepare(&secret(7), SelectionPolicy::Largest).await.unwrap();
        assert_eq!((prepared.leaf_index(), prepared.value), (1, 300));
        let prepared = pipeline.prepare(&secret(7), SelectionPolicy::Last).await.unwrap();
        assert_eq!(prepared.leaf_index(), 2);

        let err = pipeline.prepare(&secret(7), SelectionPolicy::Index(3)).await.unwrap_err();
        assert!(matches!(
            err,
            WithdrawError::Ownership(OwnershipError::NotOwned { index: 3 })
        ));
        let err = pipeline.prepare(&secret(7), SelectionPolicy::Nth(3)).await.unwrap_err();
        assert!(matches!(
            err,
            WithdrawError::Ownership(OwnershipError::NotEnoughOwned {
                requested: 3,
                owned: 3
            })
        ));
        // Preparing never writes.
        assert!(ledger.withdrawals().is_empty());
    }

    #[tokio::test]
    async fn test_reverted_withdraw_is_a_submission_error() {
        let mut ledger = three_deposits();
        ledger.revert_withdrawals();
        let engine = CircuitEngine::new();
        let pipeline = WithdrawPipeline::new(&ledger, &ledger, &engine, config());

        let err = pipeline.run(&secret(7), SelectionPolicy::First).await.unwrap_err();
        assert!(matches!(
            err,
            WithdrawError::Submission {
                leaf_index: 2,
                source: SettlementError::Reverted { .. }
            }
        ));
        // One attempt, no resubmission.
        assert_eq!(ledger.withdrawals().len(), 1);
    }

    #[tokio::test]
    async fn test_startup_parameter_checks() {
        let mut ledger = three_deposits();
        let engine = CircuitEngine::new();
        {
            let pipeline = WithdrawPipeline::new(&ledger, &ledger, &engine, config());
            pipeline.check_parameters(None).await.unwrap();
            pipeline
                .check_parameters(Some(engine.vkey_digest().trim_start_matches("0x")))
                .await
                .unwrap();
            let err = pipeline.check_parameters(Some("0x1234")).await.unwrap_err();
            assert!(matches!(
                err,
                WithdrawError::Integrity(IntegrityError::ParameterMismatch {
                    parameter: "verification key",
                    ..
                })
            ));
        }

        ledger.set_parameters(TreeParameters {
            depth: 32,
            arity: 4,
            zero_leaf: B256::from(ZERO_LEAF),
        });
        let pipeline = WithdrawPipeline::new(&ledger, &ledger, &engine, config());
        let err = pipeline.check_parameters(None).await.unwrap_err();
        assert!(matches!(
            err,
            WithdrawError::Integrity(IntegrityError::ParameterMismatch {
                parameter: "tree arity",
                ..
            })
        ));
    }

    #[test]
    fn test_every_prefix_matches_ledger_root() {
        let mut ledger = MemoryLedger::new(config());
        let mut tree = Accumulator::new(config());
        assert_eq!(B256::from(tree.root()), ledger.root_at(0));
        for n in 0..9u64 {
            let record = deposit_for(&secret(20 + n), n + 1, u128::from(n) * 3);
            ledger.deposit(record);
            tree.insert(record.leaf_hash()).unwrap();
            assert_eq!(B256::from(tree.root()), ledger.root_at(n as usize + 1));
        }
    }

    #[test]
    fn test_ternary_tree_matches_reference() {
        let config = TreeConfig::new(5, 3, ZERO_LEAF).unwrap();
        let leaves: Vec<Hash> = (0u8..11).map(|i| keccak256(&[i])).collect();
        let tree = Accumulator::from_leaves(config, &leaves).unwrap();
        assert_eq!(tree.root(), reference_root(5, 3, ZERO_LEAF, &leaves));
        for i in 0..leaves.len() as u64 {
            let path = tree.gen_path(i).unwrap();
            assert!(path.steps.iter().all(|step| step.siblings.len() == 2));
            assert_eq!(path.compute_root(leaves[i as usize]), Some(tree.root()));
        }
    }

    #[tokio::test]
    async fn test_withdraw_witness_serialize_json() {
        let ledger = three_deposits();
        let history = fetch_history(&ledger).await.unwrap();
        let tree = rebuild(config(), &history).unwrap();
        let record = history.records[2];

        let witness = WithdrawWitness {
            version: WITNESS_VERSION,
            value: record.value,
            root: tree.root(),
            leaf_index: 2,
            masked_p: record.masked_p,
            masked_q: record.masked_q,
            secret: secret(7).to_bytes(),
            path: tree.gen_path(2).unwrap().steps,
        };
        let json = serde_json::to_string_pretty(&witness).unwrap();
        let parsed: WithdrawWitness = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.path.len(), 32);
        parsed.validate(&config()).unwrap();

        let signals = evaluate_withdraw(&parsed, &config()).unwrap();
        assert_eq!(signals.value, 900);
        assert_eq!(signals.encode().len(), PUBLIC_SIGNALS_LEN);
        assert!(!format!("{parsed:?}").contains(&hex::encode(secret(7).to_bytes())));
    }
}

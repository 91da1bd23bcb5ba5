//! Submission, fee estimation, simulation and registry bookkeeping.

use stark_kit::*;

use crate::common::*;

fn invoke_tx(nonce: u64) -> Transaction {
    let calldata = encode_multicall(&[Call::new(Felt::from(0x1a2bu64), "increase_balance", vec![
        Felt::from(10u64),
    ])])
    .unwrap();
    Transaction::invoke(ACCOUNT, calldata, 1_000_000, Felt::from(nonce), Network::Localhost)
        .unwrap()
}

// =============================================================================
// execute()
// =============================================================================

#[tokio::test]
async fn test_hash_mismatch_stops_before_polling() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let channel = ScriptedChannel::new();
    channel
        .push_submit("Invoke transaction was sent.\nTransaction hash: 0xdeadbeef\n")
        .push_status(StatusReport::new(TxStatus::AcceptedOnL2));
    let belt = toolbelt(&channel, dir.path());

    let tx = invoke_tx(0);
    let err = belt
        .execute(&tx, &signer(), Some(WatchMode::Track))
        .await
        .unwrap_err();

    match &err {
        Error::HashMismatch { expected, received } => {
            assert_eq!(expected, &tx.hash().to_hex_string());
            assert_eq!(received, "0xdeadbeef");
        }
        other => panic!("expected hash mismatch, got {:?}", other),
    }
    assert!(err.is_integrity());
    assert_eq!(channel.status_calls(), 0);
}

#[tokio::test]
async fn test_missing_hash_is_integrity_error() {
    let dir = tempfile::tempdir().unwrap();
    let channel = ScriptedChannel::new();
    channel.push_submit("Got an error: nonce too low");
    let belt = toolbelt(&channel, dir.path());

    let err = belt.execute(&invoke_tx(0), &signer(), None).await.unwrap_err();
    assert!(matches!(err, Error::MissingTxHash(_)));
    assert_eq!(channel.status_calls(), 0);
}

#[tokio::test]
async fn test_fire_and_forget_returns_first_status() {
    let dir = tempfile::tempdir().unwrap();
    let channel = ScriptedChannel::new();
    let tx = invoke_tx(4);
    channel
        .accept(&tx)
        .push_status(StatusReport::new(TxStatus::Received))
        .push_status(StatusReport::new(TxStatus::AcceptedOnL2));
    let belt = toolbelt(&channel, dir.path());

    let execution = belt.execute(&tx, &signer(), None).await.unwrap();

    assert_eq!(execution.status.status, TxStatus::Received);
    assert_eq!(execution.status.tx_hash, tx.hash());
    assert!(execution.status.error_message.is_none());
    assert!(execution.output.contains("Transaction hash"));
    assert_eq!(channel.status_calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_track_polls_until_accepted() {
    let dir = tempfile::tempdir().unwrap();
    let channel = ScriptedChannel::new();
    let tx = invoke_tx(1);
    channel
        .accept(&tx)
        .push_status(StatusReport::new(TxStatus::Received))
        .push_status(StatusReport::new(TxStatus::Pending))
        .push_status(StatusReport::new(TxStatus::AcceptedOnL2));
    let belt = toolbelt(&channel, dir.path());

    let started = tokio::time::Instant::now();
    let execution = belt.execute(&tx, &signer(), Some(WatchMode::Track)).await.unwrap();

    assert_eq!(execution.status.status, TxStatus::AcceptedOnL2);
    assert_eq!(channel.status_calls(), 3);
    assert!(started.elapsed() >= belt.poll_interval() * 2);
}

#[tokio::test]
async fn test_submission_carries_signature_over_canonical_hash() {
    let dir = tempfile::tempdir().unwrap();
    let channel = ScriptedChannel::new();
    let tx = invoke_tx(2);
    channel
        .accept(&tx)
        .push_status(StatusReport::new(TxStatus::Pending));
    let belt = toolbelt(&channel, dir.path());
    let signer = signer();

    belt.execute(&tx, &signer, None).await.unwrap();

    let submitted = channel.submitted();
    assert_eq!(submitted.len(), 1);
    let request = &submitted[0];
    assert_eq!(request.kind, TxKind::Invoke);
    assert_eq!(request.query_flag, None);
    assert_eq!(request.sender, ACCOUNT);
    assert_eq!(request.nonce, Felt::from(2u64));
    assert_eq!(request.max_fee, 1_000_000);
    assert!(request.signature.verify(signer.public_key(), &tx.hash()));
    assert!(matches!(
        &request.args,
        SubmitArgs::Invoke { entry_point, .. } if entry_point == EXECUTE_ENTRY_POINT
    ));
}

#[tokio::test]
async fn test_channel_errors_propagate_unmodified() {
    let dir = tempfile::tempdir().unwrap();
    let channel = ScriptedChannel::new();
    channel.push_submit_error(ChannelError::CommandFailed {
        status: "exit status: 1".to_string(),
        stderr: "Connection refused".to_string(),
    });
    let belt = toolbelt(&channel, dir.path());

    let err = belt.execute(&invoke_tx(0), &signer(), None).await.unwrap_err();
    assert!(matches!(
        err,
        Error::Channel(ChannelError::CommandFailed { ref stderr, .. }) if stderr == "Connection refused"
    ));
    // a single attempt, no retry
    assert_eq!(channel.submitted().len(), 1);
}

#[tokio::test]
async fn test_fee_bump_after_rejection() {
    let dir = tempfile::tempdir().unwrap();
    let channel = ScriptedChannel::new();
    let belt = toolbelt(&channel, dir.path());
    let signer = signer();

    let mut tx = invoke_tx(0);
    let first_hash = tx.hash();
    channel
        .accept(&tx)
        .push_status(StatusReport::rejected("Actual fee exceeded max fee."));
    let execution = belt.execute(&tx, &signer, Some(WatchMode::Track)).await.unwrap();
    assert!(execution.status.is_rejected());

    tx.update_fee(5_000_000);
    assert_ne!(tx.hash(), first_hash);
    channel
        .clear_statuses()
        .accept(&tx)
        .push_status(StatusReport::new(TxStatus::AcceptedOnL2));

    let execution = belt.execute(&tx, &signer, Some(WatchMode::Track)).await.unwrap();
    assert_eq!(execution.status.tx_hash, tx.hash());
    assert!(execution.status.is_accepted());
    assert_eq!(channel.submitted()[1].max_fee, 5_000_000);
}

// =============================================================================
// estimate_fee() / simulate()
// =============================================================================

#[tokio::test]
async fn test_estimate_fee_signs_query_hash() {
    let dir = tempfile::tempdir().unwrap();
    let channel = ScriptedChannel::new();
    channel.push_submit("The estimated fee is: 2213566000000 WEI (0.000002213566 ETH).\n");
    let belt = toolbelt(&channel, dir.path());
    let signer = signer();
    let tx = invoke_tx(0);

    let fee = belt.estimate_fee(&tx, &signer).await.unwrap();

    assert_eq!(fee, 2_213_566_000_000);
    let request = &channel.submitted()[0];
    assert_eq!(request.query_flag, Some(QueryFlag::EstimateFee));
    assert!(request.signature.verify(signer.public_key(), &tx.query_hash()));
    assert!(!request.signature.verify(signer.public_key(), &tx.hash()));
    assert_eq!(channel.status_calls(), 0);
}

#[tokio::test]
async fn test_simulate_parses_trace() {
    let dir = tempfile::tempdir().unwrap();
    let channel = ScriptedChannel::new();
    channel.push_submit(
        "Simulating transaction...\nThe estimated fee is: 10 WEI.\n{\"trace\": {\"function_invocation\": null}, \"fee_estimation\": {\"overall_fee\": 10}}\n",
    );
    let belt = toolbelt(&channel, dir.path());

    let trace = belt.simulate(&invoke_tx(0), &signer()).await.unwrap();

    assert_eq!(trace["fee_estimation"]["overall_fee"], 10);
    assert_eq!(channel.submitted()[0].query_flag, Some(QueryFlag::Simulate));
}

// =============================================================================
// Builders
// =============================================================================

#[tokio::test]
async fn test_invoke_builder_fetches_nonce() {
    let dir = tempfile::tempdir().unwrap();
    let channel = ScriptedChannel::new();
    channel.set_nonce(Felt::from(7u64));
    let belt = toolbelt(&channel, dir.path());

    let target = Felt::from(0x1a2bu64);
    let tx = belt
        .invoke(ACCOUNT)
        .call(target, "transfer", vec![Felt::ONE, Felt::TWO])
        .call(target, "approve", vec![Felt::from(3u64)])
        .max_fee(99)
        .await
        .unwrap();

    assert_eq!(tx.nonce(), Felt::from(7u64));
    assert_eq!(tx.max_fee(), 99);
    assert_eq!(channel.nonce_calls(), 1);

    match tx.payload() {
        Payload::Invoke(p) => assert_eq!(
            p.account_abi.as_deref(),
            Some(std::path::Path::new("artifacts/abis/Account.json"))
        ),
        other => panic!("expected invoke payload, got {:?}", other),
    }

    let decoded = decode_multicall(tx.calldata().unwrap()).unwrap();
    assert_eq!(decoded.len(), 2);
    assert_eq!(decoded[0].calldata, vec![Felt::ONE, Felt::TWO]);
    assert_eq!(decoded[1].calldata, vec![Felt::from(3u64)]);
}

#[tokio::test]
async fn test_invoke_builder_uses_supplied_nonce() {
    let dir = tempfile::tempdir().unwrap();
    let channel = ScriptedChannel::new();
    let belt = toolbelt(&channel, dir.path());

    let tx = belt
        .invoke(ACCOUNT)
        .call(Felt::ONE, "ping", vec![])
        .nonce(Felt::from(41u64))
        .build()
        .await
        .unwrap();

    assert_eq!(tx.nonce(), Felt::from(41u64));
    assert_eq!(channel.nonce_calls(), 0);
}

#[tokio::test]
async fn test_invoke_submission_carries_account_abi() {
    let dir = tempfile::tempdir().unwrap();
    let channel = ScriptedChannel::new();
    let belt = toolbelt(&channel, dir.path());

    let tx = belt
        .invoke(ACCOUNT)
        .account_contract("ArgentAccount")
        .call(Felt::ONE, "ping", vec![])
        .await
        .unwrap();
    channel
        .accept(&tx)
        .push_status(StatusReport::new(TxStatus::Received));
    belt.execute(&tx, &signer(), None).await.unwrap();

    assert!(matches!(
        &channel.submitted()[0].args,
        SubmitArgs::Invoke { account_abi: Some(abi), .. }
            if abi == std::path::Path::new("artifacts/abis/ArgentAccount.json")
    ));
}

#[tokio::test]
async fn test_declare_records_class_hash() {
    let dir = tempfile::tempdir().unwrap();
    let channel = ScriptedChannel::new();
    let belt = toolbelt(&channel, dir.path());

    let tx = belt.declare(ACCOUNT, "token").max_fee(500).await.unwrap();
    match tx.payload() {
        Payload::Declare(p) => {
            assert_eq!(p.class_hash, FixedArtifacts::default().class_hash);
            assert_eq!(p.artifact_path, std::path::PathBuf::from("artifacts/token.json"));
        }
        other => panic!("expected declare payload, got {:?}", other),
    }

    channel
        .accept(&tx)
        .push_status(StatusReport::new(TxStatus::AcceptedOnL2));
    belt.execute(&tx, &signer(), Some(WatchMode::Track)).await.unwrap();

    assert_eq!(
        belt.declarations().resolve("token", Network::Localhost).unwrap(),
        FixedArtifacts::default().class_hash
    );
    assert!(matches!(
        &channel.submitted()[0].args,
        SubmitArgs::Declare { contract_path } if contract_path.ends_with("token.json")
    ));
}

#[tokio::test]
async fn test_rejected_declare_is_not_recorded() {
    let dir = tempfile::tempdir().unwrap();
    let channel = ScriptedChannel::new();
    let belt = toolbelt(&channel, dir.path());

    let tx = belt.declare(ACCOUNT, "token").nonce(Felt::ZERO).await.unwrap();
    channel
        .accept(&tx)
        .push_status(StatusReport::rejected("Class already declared"));
    let execution = belt.execute(&tx, &signer(), Some(WatchMode::Track)).await.unwrap();

    assert!(execution.status.is_rejected());
    assert!(
        belt.declarations()
            .resolve("token", Network::Localhost)
            .unwrap_err()
            .is_not_found()
    );
}

#[tokio::test]
async fn test_deploy_account_registers_accepted_account() {
    let dir = tempfile::tempdir().unwrap();
    let channel = ScriptedChannel::new();
    let belt = toolbelt(&channel, dir.path());
    let signer = AliasedSigner {
        alias: "PKEY1".to_string(),
        inner: signer(),
    };

    let builder = belt.deploy_account("Account", Felt::from(42u64), vec![signer.public_key()]);
    let predicted = builder.predicted_address().unwrap();
    let tx = builder.max_fee(1_000).await.unwrap();

    assert_eq!(tx.account_address(), predicted);
    assert_eq!(tx.nonce(), Felt::ZERO);
    assert_eq!(channel.nonce_calls(), 0);

    channel
        .accept(&tx)
        .push_status(StatusReport::new(TxStatus::AcceptedOnL1));
    belt.execute(&tx, &signer, Some(WatchMode::Track)).await.unwrap();

    let record = belt.accounts().resolve("PKEY1", Network::Localhost).unwrap();
    assert_eq!(record.address, predicted);
    assert_eq!(record.public_key, signer.public_key());
    assert_eq!(record.index, 0);
}

#[tokio::test]
async fn test_deploy_account_without_alias_is_not_recorded() {
    let dir = tempfile::tempdir().unwrap();
    let channel = ScriptedChannel::new();
    let belt = toolbelt(&channel, dir.path());

    let tx = belt
        .deploy_account("Account", Felt::ONE, vec![])
        .build()
        .await
        .unwrap();
    channel
        .accept(&tx)
        .push_status(StatusReport::new(TxStatus::AcceptedOnL2));
    belt.execute(&tx, &signer(), Some(WatchMode::Track)).await.unwrap();

    assert!(belt.accounts().entries(Network::Localhost).unwrap().is_empty());
}

// =============================================================================
// Registry bookkeeping
// =============================================================================

#[tokio::test]
async fn test_redeclare_with_new_class_hash_is_refused_before_submission() {
    let dir = tempfile::tempdir().unwrap();
    let declarations = dir.path().join("localhost.declarations.txt");
    std::fs::write(&declarations, "0x111:token\n").unwrap();
    let channel = ScriptedChannel::new();
    let belt = toolbelt(&channel, dir.path());

    let tx = belt.declare(ACCOUNT, "token").max_fee(500).await.unwrap();
    channel
        .accept(&tx)
        .push_status(StatusReport::new(TxStatus::AcceptedOnL2));
    let err = belt
        .execute(&tx, &signer(), Some(WatchMode::Track))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        Error::Registry(RegistryError::DuplicateAlias { ref alias, existing })
            if alias == "token" && existing == Felt::from(0x111u64)
    ));
    assert!(channel.submitted().is_empty());
    assert_eq!(channel.status_calls(), 0);
    assert_eq!(std::fs::read_to_string(&declarations).unwrap(), "0x111:token\n");
}

#[tokio::test]
async fn test_failed_bookkeeping_still_returns_execution() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let declarations = dir.path().join("localhost.declarations.txt");
    let channel = ScriptedChannel::new();
    let belt = toolbelt(&channel, dir.path());

    let tx = belt.declare(ACCOUNT, "token").max_fee(500).await.unwrap();
    // another process binds the alias while the declare is in flight
    let racing = declarations.clone();
    channel
        .accept(&tx)
        .push_status(StatusReport::new(TxStatus::AcceptedOnL2))
        .on_status(move || std::fs::write(racing, "0x111:token\n").unwrap());

    let execution = belt
        .execute(&tx, &signer(), Some(WatchMode::Track))
        .await
        .unwrap();

    assert!(execution.status.is_accepted());
    assert_eq!(execution.status.tx_hash, tx.hash());
    assert!(execution.output.contains("Transaction hash"));
    assert_eq!(std::fs::read_to_string(&declarations).unwrap(), "0x111:token\n");
}

#[tokio::test]
async fn test_deploy_account_alias_taken_by_other_key_is_refused() {
    let dir = tempfile::tempdir().unwrap();
    let channel = ScriptedChannel::new();
    let belt = toolbelt(&channel, dir.path());
    belt.accounts()
        .register(
            AccountRecord {
                public_key: Felt::from(0xaau64),
                address: Felt::from(0x10u64),
                index: 0,
                alias: "PKEY1".to_string(),
                network: Network::Localhost,
            },
            Network::Localhost,
        )
        .unwrap();
    let signer = AliasedSigner {
        alias: "PKEY1".to_string(),
        inner: signer(),
    };

    let tx = belt
        .deploy_account("Account", Felt::from(42u64), vec![signer.public_key()])
        .await
        .unwrap();
    let err = belt.execute(&tx, &signer, None).await.unwrap_err();

    assert!(matches!(
        err,
        Error::Registry(RegistryError::DuplicateAlias { existing, .. }) if existing == Felt::from(0x10u64)
    ));
    assert!(channel.submitted().is_empty());
}

//! Status polling and debug-assisted rejection messages.

use std::time::Duration;

use stark_kit::*;

use crate::common::*;

const REJECTION: &str = "Error at pc=0:12:\nAn ASSERT_EQ instruction failed: 3 != 4.\n\
                         Error in the called contract (0x1a2b).";

fn seed_deployment(belt: &Toolbelt) {
    belt.deployments()
        .register(
            DeploymentRecord::new(Felt::from(0x1a2bu64), "artifacts/abis/token.json").alias("token"),
            Network::Localhost,
        )
        .unwrap();
}

#[tokio::test]
async fn test_debug_enriches_rejection() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let channel = ScriptedChannel::new();
    channel
        .push_status(StatusReport::rejected(REJECTION))
        .set_debug(Ok("token.cairo:42: assert balance == amount\n".to_string()));
    let belt = toolbelt(&channel, dir.path());
    seed_deployment(&belt);

    let status = belt.status(Felt::from(0xabcu64), Some(WatchMode::Debug)).await.unwrap();

    assert!(status.is_rejected());
    assert_eq!(
        status.error_message.as_deref(),
        Some("token.cairo:42: assert balance == amount")
    );
    let calls = channel.debug_calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0], vec![DebugContract {
        address: Felt::from(0x1a2bu64),
        artifact_path: "artifacts/token.json".to_string(),
    }]);
    assert_eq!(calls[0][0].to_arg(), "0x1a2b:artifacts/token.json");
}

#[tokio::test]
async fn test_debug_without_known_address_keeps_message() {
    let dir = tempfile::tempdir().unwrap();
    let channel = ScriptedChannel::new();
    channel.push_status(StatusReport::rejected("Error in the called contract (0x9999)."));
    let belt = toolbelt(&channel, dir.path());
    seed_deployment(&belt);

    let status = belt.status(Felt::ONE, Some(WatchMode::Debug)).await.unwrap();

    assert_eq!(
        status.error_message.as_deref(),
        Some("Error in the called contract (0x9999).")
    );
    assert!(channel.debug_calls().is_empty());
}

#[tokio::test]
async fn test_debug_failure_keeps_message() {
    let dir = tempfile::tempdir().unwrap();
    let channel = ScriptedChannel::new();
    channel
        .push_status(StatusReport::rejected(REJECTION))
        .set_debug(Err(ChannelError::CommandFailed {
            status: "exit status: 1".to_string(),
            stderr: "cairo-compile not found".to_string(),
        }));
    let belt = toolbelt(&channel, dir.path());
    seed_deployment(&belt);

    let status = belt.status(Felt::ONE, Some(WatchMode::Debug)).await.unwrap();

    assert_eq!(status.error_message.as_deref(), Some(REJECTION));
    assert_eq!(channel.debug_calls().len(), 1);
}

#[tokio::test]
async fn test_track_does_not_debug() {
    let dir = tempfile::tempdir().unwrap();
    let channel = ScriptedChannel::new();
    channel.push_status(StatusReport::rejected(REJECTION));
    let belt = toolbelt(&channel, dir.path());
    seed_deployment(&belt);

    let status = belt.status(Felt::ONE, Some(WatchMode::Track)).await.unwrap();

    assert_eq!(status.error_message.as_deref(), Some(REJECTION));
    assert!(channel.debug_calls().is_empty());
}

#[tokio::test]
async fn test_fire_and_forget_may_be_non_terminal() {
    let dir = tempfile::tempdir().unwrap();
    let channel = ScriptedChannel::new();
    channel
        .push_status(StatusReport::new(TxStatus::NotReceived))
        .push_status(StatusReport::new(TxStatus::AcceptedOnL2));
    let belt = toolbelt(&channel, dir.path());

    let status = belt.status(Felt::ONE, None).await.unwrap();

    assert_eq!(status.status, TxStatus::NotReceived);
    assert!(!status.status.is_terminal());
    assert!(status.error_message.is_none());
    assert_eq!(channel.status_calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_timeout_bounds_tracking() {
    let dir = tempfile::tempdir().unwrap();
    let channel = ScriptedChannel::new();
    channel.push_status(StatusReport::new(TxStatus::Pending));
    let belt = toolbelt(&channel, dir.path());

    let err = belt
        .status_with_timeout(Felt::from(0x77u64), Some(WatchMode::Track), Duration::from_secs(95))
        .await
        .unwrap_err();

    match err {
        Error::StatusTimeout {
            tx_hash,
            elapsed_secs,
        } => {
            assert_eq!(tx_hash, "0x77");
            assert_eq!(elapsed_secs, 95);
        }
        other => panic!("expected timeout, got {:?}", other),
    }
    // polls at 0s, 30s, 60s and 90s
    assert_eq!(channel.status_calls(), 4);
}

#[tokio::test]
async fn test_debug_against_other_registry() {
    let dir = tempfile::tempdir().unwrap();
    let channel = ScriptedChannel::new();
    channel
        .push_status(StatusReport::rejected(REJECTION))
        .set_debug(Ok("enriched".to_string()));
    let belt = toolbelt(&channel, dir.path());

    let other = tempfile::tempdir().unwrap();
    let path = other.path().join("shared.deployments.txt");
    std::fs::write(&path, "0x1a2b:build/abis/token.json:token\n").unwrap();
    let registry = DeploymentRegistry::at_file(&path);

    let status = belt
        .status_with_registry(Felt::ONE, Some(WatchMode::Debug), &registry)
        .await
        .unwrap();

    assert_eq!(status.error_message.as_deref(), Some("enriched"));
    assert_eq!(channel.debug_calls()[0][0].artifact_path, "build/token.json");
}

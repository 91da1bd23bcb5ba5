//! Registries as seen through a toolbelt.

use stark_kit::*;

use crate::common::*;

#[test]
fn test_deployment_alias_lookup() {
    let dir = tempfile::tempdir().unwrap();
    let belt = toolbelt(&ScriptedChannel::new(), dir.path());
    let deployments = belt.deployments();

    deployments
        .register(
            DeploymentRecord::new(Felt::ONE, "abi_a.json").alias("foo"),
            Network::Localhost,
        )
        .unwrap();
    // registering the same record again changes nothing
    deployments
        .register(
            DeploymentRecord::new(Felt::ONE, "abi_a.json").alias("foo"),
            Network::Localhost,
        )
        .unwrap();

    assert_eq!(
        std::fs::read_to_string(dir.path().join("localhost.deployments.txt")).unwrap(),
        "0x1:abi_a.json:foo\n"
    );
    assert_eq!(
        deployments.resolve("foo", Network::Localhost).unwrap(),
        (Felt::ONE, "abi_a.json".to_string())
    );
    assert_eq!(
        deployments.resolve("0x01", Network::Localhost).unwrap().0,
        Felt::ONE
    );
    assert!(
        deployments
            .resolve("0x02", Network::Localhost)
            .unwrap_err()
            .is_not_found()
    );
}

#[test]
fn test_networks_are_separate_files() {
    let dir = tempfile::tempdir().unwrap();
    let belt = toolbelt(&ScriptedChannel::new(), dir.path());

    belt.deployments()
        .register(DeploymentRecord::new(Felt::ONE, "abi.json").alias("foo"), Network::Goerli)
        .unwrap();

    assert!(dir.path().join("goerli.deployments.txt").exists());
    assert!(
        belt.deployments()
            .resolve("foo", Network::Localhost)
            .unwrap_err()
            .is_not_found()
    );
}

#[test]
fn test_malformed_registry_surfaces_error() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("localhost.declarations.txt"), "not-a-hash:token\n").unwrap();
    let belt = toolbelt(&ScriptedChannel::new(), dir.path());

    let err = belt
        .declarations()
        .resolve("token", Network::Localhost)
        .unwrap_err();
    assert!(matches!(err, RegistryError::Malformed { line: 1, .. }));
}

#[test]
fn test_account_lookup_drives_invoke() {
    let dir = tempfile::tempdir().unwrap();
    let channel = ScriptedChannel::new();
    channel.set_nonce(Felt::from(3u64));
    let belt = toolbelt(&channel, dir.path());
    let signer = signer();

    belt.accounts()
        .register(
            AccountRecord {
                public_key: signer.public_key(),
                address: ACCOUNT,
                index: 0,
                alias: "PKEY1".to_string(),
                network: Network::Localhost,
            },
            Network::Localhost,
        )
        .unwrap();

    let account = belt.accounts().resolve("PKEY1", Network::Localhost).unwrap();
    let tx = tokio_test::block_on(
        belt.invoke(account.address)
            .call(Felt::from(0x1a2bu64), "increase_balance", vec![Felt::ONE])
            .max_fee(10)
            .build(),
    )
    .unwrap();

    assert_eq!(tx.account_address(), ACCOUNT);
    assert_eq!(tx.nonce(), Felt::from(3u64));
}

#[test]
fn test_concurrent_registrations_are_serialized() {
    let dir = tempfile::tempdir().unwrap();
    let registry = DeploymentRegistry::new(dir.path());

    std::thread::scope(|scope| {
        for i in 0..8u64 {
            let registry = &registry;
            scope.spawn(move || {
                registry
                    .register(
                        DeploymentRecord::new(Felt::from(i + 1), "abi.json")
                            .alias(format!("c{}", i)),
                        Network::Localhost,
                    )
                    .unwrap();
            });
        }
    });

    let entries = registry.entries(Network::Localhost).unwrap();
    assert_eq!(entries.len(), 8);
}

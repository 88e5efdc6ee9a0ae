//! End-to-end lifecycle tests for the validator network harness.
//!
//! Each test drives a full harness instance the way a protocol test suite
//! would: create, apply base snapshots, setup, exercise, stop, teardown.

use std::net::TcpListener;

use anyhow::Result;
use tokio::time::Duration;

use mesa_harness::prelude::*;

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Full lifecycle: four nodes come up, report running, stop, and the
/// teardown report stays empty.
#[tokio::test]
async fn test_four_node_network_lifecycle() -> Result<()> {
    init_logging();

    let mut harness = NetworkHarness::create("t1", 4, None).await?;
    harness.apply_base_snapshots().await?;

    let nodes = harness.setup().await?;
    assert_eq!(nodes.len(), 4);
    for node in &nodes {
        assert!(node.is_running(), "node {} not running", node.index());
    }

    harness.stop_nodes(&nodes).await?;
    for node in &nodes {
        assert!(!node.is_running(), "node {} still running", node.index());
    }
    assert!(!harness.bootstrap().is_running());

    let report = harness.teardown().await;
    assert!(report.is_empty(), "unexpected teardown failures: {report}");
    Ok(())
}

/// After the base snapshot, a direct contract read shows exactly the
/// registered validator addresses as active, whatever the committee size.
#[tokio::test]
async fn test_committee_activation_for_each_size() -> Result<()> {
    init_logging();

    for number_of_nodes in [0usize, 1, 4] {
        let name = format!("committee_{number_of_nodes}");
        let mut harness = NetworkHarness::create(&name, number_of_nodes, None).await?;
        harness.apply_base_snapshots().await?;

        let mut expected = vec![harness.initial_validator()];
        expected.extend(harness.validator_addresses());

        let active = harness.chain().active_validators().await?;
        assert_eq!(active, expected, "committee mismatch for {number_of_nodes}");

        let nodes = harness.setup().await?;
        assert_eq!(nodes.len(), number_of_nodes);
        harness.stop_nodes(&nodes).await?;
        assert!(harness.teardown().await.is_empty());
    }
    Ok(())
}

/// A second harness over the same data directory and configuration restores
/// the cached record instead of re-running the on-chain step. The second
/// chain is armed to revert any registration, so success proves nothing was
/// re-executed.
#[tokio::test]
async fn test_snapshot_record_is_reused_across_harnesses() -> Result<()> {
    init_logging();

    let dir = tempfile::tempdir()?;
    // Fixed port: the bootstrap record feeds the configuration hash, and a
    // cache hit requires an identical record.
    let port = {
        let probe = TcpListener::bind(("127.0.0.1", 0))?;
        probe.local_addr()?.port()
    };
    let config = || {
        let mut config = HarnessConfig::default();
        config.data_dir = Some(dir.path().to_path_buf());
        config
    };

    let mut first =
        NetworkHarness::create_with_config("cache_reuse", 1, Some(port), config()).await?;
    first.apply_base_snapshots().await?;
    let nodes = first.setup().await?;
    first.stop_nodes(&nodes).await?;
    assert!(first.teardown().await.is_empty());

    let mut second =
        NetworkHarness::create_with_config("cache_reuse", 1, Some(port), config()).await?;
    second.chain().revert_next_registration();
    second.apply_base_snapshots().await?;

    let active = second.chain().active_validators().await?;
    let mut expected = vec![second.initial_validator()];
    expected.extend(second.validator_addresses());
    assert_eq!(active, expected);

    let nodes = second.setup().await?;
    assert_eq!(
        second.context().unwrap().validators,
        second.validator_addresses()
    );
    second.stop_nodes(&nodes).await?;
    assert!(second.teardown().await.is_empty());
    Ok(())
}

/// A warp target the chain already reached is swallowed, never surfaced
/// from apply_base_snapshots.
#[tokio::test]
async fn test_already_reached_warp_target_is_tolerated() -> Result<()> {
    init_logging();

    let mut harness = NetworkHarness::create("warp_race", 2, None).await?;
    // The chain drifted far past the next-epoch target on its own.
    harness.chain().force_time(1_000_000);

    harness.apply_base_snapshots().await?;
    let nodes = harness.setup().await?;
    harness.stop_nodes(&nodes).await?;
    assert!(harness.teardown().await.is_empty());
    Ok(())
}

/// Any warp failure other than already-past-target propagates, typed.
#[tokio::test]
async fn test_unrelated_warp_failure_propagates() -> Result<()> {
    init_logging();

    let mut harness = NetworkHarness::create("warp_broken", 1, None).await?;
    harness.chain().fail_next_warp("connection refused");

    let err = harness.apply_base_snapshots().await.unwrap_err();
    let protocol_err = err
        .chain()
        .find_map(|cause| cause.downcast_ref::<ProtocolError>())
        .expect("a protocol error in the chain");
    assert!(matches!(
        protocol_err,
        ProtocolError::TimeAdvanceFailed(reason) if reason.contains("connection refused")
    ));
    Ok(())
}

/// A settlement that never confirms is a ConfirmationTimeout, distinct from
/// registration and warp failures.
#[tokio::test]
async fn test_settlement_timeout_is_distinct() -> Result<()> {
    init_logging();

    let mut config = HarnessConfig::default();
    config.receipt_timeout = Duration::from_millis(50);

    // Zero nodes: no registrations, so the stalled receipt can only be the
    // settlement's.
    let mut harness =
        NetworkHarness::create_with_config("settle_timeout", 0, None, config).await?;
    harness.chain().stall_receipts(true);

    let err = harness.apply_base_snapshots().await.unwrap_err();
    let protocol_err = err
        .chain()
        .find_map(|cause| cause.downcast_ref::<ProtocolError>())
        .expect("a protocol error in the chain");
    assert!(matches!(
        protocol_err,
        ProtocolError::ConfirmationTimeout { .. }
    ));
    Ok(())
}

/// Stopping an already-stopped node set is a caller error, not a silent
/// no-op.
#[tokio::test]
async fn test_stop_nodes_is_not_reentrant() -> Result<()> {
    init_logging();

    let mut harness = NetworkHarness::create("double_stop", 1, None).await?;
    harness.apply_base_snapshots().await?;
    let nodes = harness.setup().await?;

    harness.stop_nodes(&nodes).await?;
    let err = harness.stop_nodes(&nodes).await.unwrap_err();
    assert!(matches!(
        err.downcast_ref::<ConfigurationError>(),
        Some(ConfigurationError::PhaseMismatch { .. })
    ));

    assert!(harness.teardown().await.is_empty());
    Ok(())
}

/// Node identities are stable across harness instances with the same shape.
#[tokio::test]
async fn test_identities_are_reproducible_across_runs() -> Result<()> {
    init_logging();

    let first = NetworkHarness::create("repro_a", 3, None).await?;
    let second = NetworkHarness::create("repro_b", 3, None).await?;

    assert_eq!(first.validator_addresses(), second.validator_addresses());
    assert_eq!(first.initial_validator(), second.initial_validator());
    Ok(())
}

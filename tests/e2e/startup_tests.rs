//! Startup check: bounded, silent, never blocks launch.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use super::harness::ORIGINAL_BINARY;
use super::ReleaseHarness;
use std::time::{Duration, Instant};

/// A slow release index must not hold up startup beyond the timeout.
#[tokio::test]
async fn test_slow_index_is_abandoned() {
    let harness = ReleaseHarness::start().await;
    harness
        .publish_latest_with_delay("v9.9.9", Duration::from_secs(5))
        .await;
    harness.forbid_downloads().await;

    let coordinator = harness.coordinator(Some("1.0.0"), "linux");
    let timeout = Duration::from_millis(200);
    let started = Instant::now();

    let result = coordinator.check_with_timeout(timeout).await;

    let elapsed = started.elapsed();
    assert!(result.is_none());
    assert!(elapsed < Duration::from_secs(2), "startup waited {elapsed:?}");
    assert_eq!(harness.target_bytes(), ORIGINAL_BINARY);
}

#[tokio::test]
async fn test_fast_index_reports_update() {
    let harness = ReleaseHarness::start().await;
    harness.publish_latest("v1.2.0").await;
    harness.forbid_downloads().await;

    let result = harness
        .coordinator(Some("1.0.0"), "linux")
        .check_with_timeout(Duration::from_secs(5))
        .await
        .expect("check finished in time");

    assert!(result.update_available);
    assert_eq!(result.latest_version.as_deref(), Some("1.2.0"));
    assert_eq!(result.current_display(), "1.0.0");
}

/// An offline startup check completes with an error, not a failure.
#[tokio::test]
async fn test_unreachable_index_is_silent() {
    let harness = ReleaseHarness::start().await;
    harness.forbid_downloads().await;

    let result = harness
        .coordinator(Some("1.0.0"), "linux")
        .check_with_timeout(Duration::from_secs(5))
        .await
        .expect("check finished in time");

    assert!(!result.update_available);
    assert!(result.latest_version.is_none());
    assert!(result.error.is_some());
}

#[tokio::test]
async fn test_leftover_backup_detected() {
    let harness = ReleaseHarness::start().await;
    let coordinator = harness.coordinator(Some("1.0.0"), "linux");
    assert!(coordinator.leftover_backup().is_none());

    let backup = upgrader::upgrade::backup_path(harness.target());
    std::fs::write(&backup, ORIGINAL_BINARY).unwrap();

    assert_eq!(coordinator.leftover_backup(), Some(backup));
}

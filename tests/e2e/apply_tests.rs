//! Apply path: check, resolve, download, verify, install.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use super::harness::ORIGINAL_BINARY;
use super::ReleaseHarness;
use upgrader::{UpgradeEvent, UpgradeStage};

const NEW_BINARY: &[u8] = b"\x7fELF new release build";

fn stages(events: &[UpgradeEvent]) -> Vec<UpgradeStage> {
    events
        .iter()
        .filter_map(|event| match event {
            UpgradeEvent::Stage(stage) => Some(*stage),
            _ => None,
        })
        .collect()
}

/// current 1.0.0, latest v1.1.0: the check reports an update and apply installs it.
#[tokio::test]
async fn test_newer_release_is_installed() {
    let harness = ReleaseHarness::start().await;
    harness.publish_latest("v1.1.0").await;
    harness
        .publish_asset("v1.1.0", "upgrader", NEW_BINARY, 1)
        .await;
    let coordinator = harness.coordinator(Some("1.0.0"), "linux");

    let check = coordinator.check_for_updates().await;
    assert!(check.update_available);
    assert_eq!(check.current_version, Some(semver::Version::new(1, 0, 0)));
    assert_eq!(check.latest_version.as_deref(), Some("1.1.0"));
    assert!(check.error.is_none());

    let mut events = Vec::new();
    let result = coordinator
        .perform_update(false, |event| events.push(event.clone()))
        .await;

    assert!(result.success, "{result}");
    assert_eq!(result.new_version.as_deref(), Some("1.1.0"));
    assert!(result.error.is_none());
    assert_eq!(harness.target_bytes(), NEW_BINARY);
    assert!(!harness.has_backup());
    assert!(!harness.has_staged_files());

    assert_eq!(
        stages(&events),
        vec![
            UpgradeStage::Checking,
            UpgradeStage::PlatformResolved,
            UpgradeStage::Downloading,
            UpgradeStage::Verifying,
            UpgradeStage::Installing,
            UpgradeStage::Done,
        ]
    );
    assert!(events.contains(&UpgradeEvent::TargetSelected {
        current: Some("1.0.0".to_string()),
        target: "1.1.0".to_string(),
        forced: false,
    }));
    assert!(events
        .iter()
        .any(|e| matches!(e, UpgradeEvent::DownloadProgress { downloaded, .. } if *downloaded == NEW_BINARY.len() as u64)));
}

#[cfg(unix)]
#[tokio::test]
async fn test_installed_binary_is_executable() {
    use std::os::unix::fs::PermissionsExt;

    let harness = ReleaseHarness::start().await;
    harness.publish_latest("v2.0.0").await;
    harness
        .publish_asset("v2.0.0", "upgrader", NEW_BINARY, 1)
        .await;

    let result = harness
        .coordinator(Some("1.0.0"), "linux")
        .perform_update(false, |_| {})
        .await;

    assert!(result.success, "{result}");
    let mode = std::fs::metadata(harness.target())
        .unwrap()
        .permissions()
        .mode();
    assert_eq!(mode & 0o111, 0o111);
}

/// Verification and install run on the blocking pool of a worker-thread runtime.
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_install_on_multi_thread_runtime() {
    let harness = ReleaseHarness::start().await;
    harness.publish_latest("v1.1.0").await;
    harness
        .publish_asset("v1.1.0", "upgrader", NEW_BINARY, 1)
        .await;

    let result = harness
        .coordinator(Some("1.0.0"), "linux")
        .perform_update(false, |_| {})
        .await;

    assert!(result.success, "{result}");
    assert_eq!(harness.target_bytes(), NEW_BINARY);
    assert!(!harness.has_backup());
    assert!(!harness.has_staged_files());
}

/// current == latest and not forced: nothing is downloaded.
#[tokio::test]
async fn test_already_latest_skips_download() {
    let harness = ReleaseHarness::start().await;
    harness.publish_latest("1.1.0").await;
    harness.forbid_downloads().await;

    let mut events = Vec::new();
    let result = harness
        .coordinator(Some("1.1.0"), "linux")
        .perform_update(false, |event| events.push(event.clone()))
        .await;

    assert!(result.success);
    assert!(result.message.contains("already on the latest version"));
    assert_eq!(result.new_version.as_deref(), Some("1.1.0"));
    assert_eq!(harness.target_bytes(), ORIGINAL_BINARY);
    assert_eq!(
        stages(&events),
        vec![UpgradeStage::Checking, UpgradeStage::Done]
    );
}

/// An unknown host OS fails before any download.
#[tokio::test]
async fn test_unsupported_platform_reported() {
    let harness = ReleaseHarness::start().await;
    harness.publish_latest("v1.1.0").await;
    harness.forbid_downloads().await;

    let mut events = Vec::new();
    let result = harness
        .coordinator(Some("1.0.0"), "plan9")
        .perform_update(false, |event| events.push(event.clone()))
        .await;

    assert!(!result.success);
    assert_eq!(result.message, "Platform not supported");
    assert!(result.error.unwrap().contains("plan9"));
    assert_eq!(harness.target_bytes(), ORIGINAL_BINARY);
    assert_eq!(stages(&events).last(), Some(&UpgradeStage::Failed));
}

#[tokio::test]
async fn test_windows_downloads_exe_asset() {
    let harness = ReleaseHarness::start().await;
    harness.publish_latest("v1.1.0").await;
    harness
        .publish_asset("v1.1.0", "upgrader.exe", NEW_BINARY, 1)
        .await;

    let result = harness
        .coordinator(Some("1.0.0"), "windows")
        .perform_update(false, |_| {})
        .await;

    assert!(result.success, "{result}");
    assert_eq!(harness.target_bytes(), NEW_BINARY);
}

#[tokio::test]
async fn test_force_reinstalls_current_release() {
    let harness = ReleaseHarness::start().await;
    harness.publish_latest("v1.1.0").await;
    harness
        .publish_asset("v1.1.0", "upgrader-macos", NEW_BINARY, 1)
        .await;

    let result = harness
        .coordinator(Some("1.1.0"), "macos")
        .perform_update(true, |_| {})
        .await;

    assert!(result.success, "{result}");
    assert_eq!(result.new_version.as_deref(), Some("1.1.0"));
    assert_eq!(harness.target_bytes(), NEW_BINARY);
}

/// Without force, an unreachable release index is a failed check.
#[tokio::test]
async fn test_check_failure_without_force() {
    let harness = ReleaseHarness::start().await;
    harness.forbid_downloads().await;

    let result = harness
        .coordinator(Some("1.0.0"), "linux")
        .perform_update(false, |_| {})
        .await;

    assert!(!result.success);
    assert_eq!(result.message, "Update check failed");
    assert!(result.error.unwrap().contains("internet connection"));
    assert_eq!(harness.target_bytes(), ORIGINAL_BINARY);
}

/// With force and no latest tag, the running version is reinstalled.
#[tokio::test]
async fn test_forced_update_falls_back_to_current_version() {
    let harness = ReleaseHarness::start().await;
    harness
        .publish_asset("v1.0.0", "upgrader", NEW_BINARY, 1)
        .await;

    let result = harness
        .coordinator(Some("1.0.0"), "linux")
        .perform_update(true, |_| {})
        .await;

    assert!(result.success, "{result}");
    assert_eq!(result.new_version.as_deref(), Some("1.0.0"));
}

#[tokio::test]
async fn test_unresolved_current_version_fails_check() {
    let harness = ReleaseHarness::start().await;
    harness.publish_latest("v1.1.0").await;
    harness.forbid_downloads().await;

    let coordinator = harness.coordinator(None, "linux");
    let check = coordinator.check_for_updates().await;
    assert!(!check.update_available);
    assert_eq!(check.current_display(), "unknown");
    assert!(check.error.is_some());

    let result = coordinator.perform_update(false, |_| {}).await;
    assert!(!result.success);
    assert!(result.error.unwrap().contains("current version"));
}

/// A tag that is not semver degrades to "no update" rather than an error.
#[tokio::test]
async fn test_malformed_latest_tag_is_not_an_update() {
    let harness = ReleaseHarness::start().await;
    harness.publish_latest("nightly").await;
    harness.forbid_downloads().await;

    let coordinator = harness.coordinator(Some("1.0.0"), "linux");
    let check = coordinator.check_for_updates().await;

    assert!(!check.update_available);
    assert_eq!(check.latest_version.as_deref(), Some("nightly"));
    assert!(check.error.is_none());

    let result = coordinator.perform_update(false, |_| {}).await;
    assert!(result.success, "{result}");
    assert!(result.message.contains("already on the latest version"));
    assert!(result.error.is_none());
    assert_eq!(harness.target_bytes(), ORIGINAL_BINARY);
    assert!(!harness.has_staged_files());
}

/// A missing asset is a download failure and leaves nothing staged.
#[tokio::test]
async fn test_missing_asset_is_download_failure() {
    let harness = ReleaseHarness::start().await;
    harness.publish_latest("v1.1.0").await;

    let result = harness
        .coordinator(Some("1.0.0"), "linux")
        .perform_update(false, |_| {})
        .await;

    assert!(!result.success);
    assert_eq!(result.message, "Download failed");
    assert!(result.error.unwrap().contains("404"));
    assert_eq!(harness.target_bytes(), ORIGINAL_BINARY);
    assert!(!harness.has_staged_files());
    assert!(!harness.has_backup());
}

/// An empty asset is distinguishable from a failed download.
#[tokio::test]
async fn test_empty_asset_fails_verification() {
    let harness = ReleaseHarness::start().await;
    harness.publish_latest("v1.1.0").await;
    harness.publish_asset("v1.1.0", "upgrader", b"", 1).await;

    let mut events = Vec::new();
    let result = harness
        .coordinator(Some("1.0.0"), "linux")
        .perform_update(false, |event| events.push(event.clone()))
        .await;

    assert!(!result.success);
    assert_eq!(result.message, "Downloaded binary verification failed");
    assert!(result.error.unwrap().contains("verification failed"));
    assert_eq!(harness.target_bytes(), ORIGINAL_BINARY);
    assert!(!harness.has_staged_files());
    assert_eq!(
        stages(&events),
        vec![
            UpgradeStage::Checking,
            UpgradeStage::PlatformResolved,
            UpgradeStage::Downloading,
            UpgradeStage::Verifying,
            UpgradeStage::Failed,
        ]
    );
}

/// An install failure keeps the original executable and says so.
#[tokio::test]
async fn test_install_failure_keeps_original() {
    let harness = ReleaseHarness::start().await;
    harness.publish_latest("v1.1.0").await;
    harness
        .publish_asset("v1.1.0", "upgrader", NEW_BINARY, 1)
        .await;

    // A directory where the target's backup goes makes the backup copy fail.
    let backup = upgrader::upgrade::backup_path(harness.target());
    std::fs::create_dir(&backup).unwrap();

    let result = harness
        .coordinator(Some("1.0.0"), "linux")
        .perform_update(false, |_| {})
        .await;

    assert!(!result.success);
    assert_eq!(result.message, "Failed to replace executable");
    let error = result.error.unwrap();
    assert!(error.contains("backing up"), "{error}");
    assert_eq!(harness.target_bytes(), ORIGINAL_BINARY);
    assert!(!harness.has_staged_files());
}

//! Orchestration of the check and apply operations.

use super::{
    backup_path, AssetFetcher, ExecutableSwapper, PlatformResolver, UpdateCheckResult,
    UpdateResult, VersionOracle,
};
use crate::config::UpgradeConfig;
use crate::error::{Error, Result};
use crate::event::{UpgradeEvent, UpgradeStage};
use std::fmt;
use std::future::Future;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Run `fut` on a background task and wait at most `timeout` for it.
///
/// Returns `None` if the task does not finish in time or panics. A task that
/// times out is detached, not cancelled; its late result is dropped.
pub async fn bounded<T, Fut>(timeout: Duration, fut: Fut) -> Option<T>
where
    Fut: Future<Output = T> + Send + 'static,
    T: Send + 'static,
{
    let handle = tokio::spawn(fut);
    match tokio::time::timeout(timeout, handle).await {
        Ok(Ok(value)) => Some(value),
        Ok(Err(e)) => {
            debug!("Background task failed: {e}");
            None
        }
        Err(_) => {
            debug!("Background task exceeded {timeout:?}, abandoning it");
            None
        }
    }
}

/// Drives version checks and update installation.
#[derive(Debug, Clone)]
pub struct UpdateCoordinator {
    oracle: VersionOracle,
    platform: PlatformResolver,
    fetcher: AssetFetcher,
    swapper: ExecutableSwapper,
}

impl UpdateCoordinator {
    /// Coordinator for this program, replacing the running executable.
    ///
    /// # Errors
    ///
    /// Returns an error if an HTTP client cannot be built.
    pub fn new(config: &UpgradeConfig) -> Result<Self> {
        Ok(Self::from_parts(
            VersionOracle::new(config, Some(crate::VERSION))?,
            PlatformResolver::host(),
            AssetFetcher::new(config)?,
            ExecutableSwapper::new(),
        ))
    }

    /// Coordinator assembled from explicit components.
    #[must_use]
    pub const fn from_parts(
        oracle: VersionOracle,
        platform: PlatformResolver,
        fetcher: AssetFetcher,
        swapper: ExecutableSwapper,
    ) -> Self {
        Self {
            oracle,
            platform,
            fetcher,
            swapper,
        }
    }

    /// Check whether an update is available, waiting as long as needed.
    pub async fn check_for_updates(&self) -> UpdateCheckResult {
        let decision = self.oracle.decide().await;

        let error = match (&decision.current, &decision.latest) {
            (None, _) => Some("could not determine current version".to_string()),
            (Some(_), None) => Some(
                "could not check for updates; please check your internet connection".to_string(),
            ),
            // An unparsable tag is "no update", not a failed check.
            (Some(_), Some(_)) => None,
        };

        UpdateCheckResult {
            update_available: decision.available,
            current_version: decision.current,
            latest_version: decision.latest,
            error,
        }
    }

    /// Startup check: at most `timeout`, never fails.
    ///
    /// Returns `None` when the check does not finish in time.
    pub async fn check_with_timeout(&self, timeout: Duration) -> Option<UpdateCheckResult> {
        let this = self.clone();
        bounded(timeout, async move { this.check_for_updates().await }).await
    }

    /// A `.backup` left next to the executable by an unresolved failure.
    #[must_use]
    pub fn leftover_backup(&self) -> Option<PathBuf> {
        let target = self.platform.current_executable_path().ok()?;
        let backup = backup_path(&target);
        backup.exists().then_some(backup)
    }

    /// Download and install the latest release.
    ///
    /// With `force`, the release is installed even when the running version
    /// is already the latest or the check failed. Every failure is reported in
    /// the returned [`UpdateResult`]; nothing is retried.
    pub async fn perform_update<P>(&self, force: bool, mut on_event: P) -> UpdateResult
    where
        P: FnMut(&UpgradeEvent),
    {
        enter(UpgradeStage::Checking, &mut on_event);
        let check = self.check_for_updates().await;

        if let (Some(error), false) = (&check.error, force) {
            return fail(UpgradeStage::Checking, &mut on_event, "Update check failed", error);
        }

        if !check.update_available && !force {
            enter(UpgradeStage::Done, &mut on_event);
            let current = check.current_display();
            return UpdateResult::succeeded(
                format!("You are already on the latest version ({current})"),
                check.current_version.map(|v| v.to_string()),
            );
        }

        let current = check.current_version.as_ref().map(ToString::to_string);
        let Some(target) = check.latest_version.clone().or_else(|| current.clone()) else {
            return fail(
                UpgradeStage::Checking,
                &mut on_event,
                "Update check failed",
                "no release version known to install",
            );
        };
        if force {
            info!("Forced update: installing version {target}");
        } else {
            info!("Update available: {} -> {target}", check.current_display());
        }
        on_event(&UpgradeEvent::TargetSelected {
            current,
            target: target.clone(),
            forced: force,
        });

        enter(UpgradeStage::PlatformResolved, &mut on_event);
        let platform = match self.platform.detect() {
            Ok(platform) => platform,
            Err(e) => {
                return fail(
                    UpgradeStage::PlatformResolved,
                    &mut on_event,
                    "Platform not supported",
                    e,
                )
            }
        };
        let asset = self.platform.asset_name(platform);
        let executable = match self.platform.current_executable_path() {
            Ok(path) => path,
            Err(e) => {
                return fail(
                    UpgradeStage::PlatformResolved,
                    &mut on_event,
                    "Could not locate the running executable",
                    e,
                )
            }
        };

        enter(UpgradeStage::Downloading, &mut on_event);
        on_event(&UpgradeEvent::DownloadStarted {
            asset: asset.to_string(),
        });
        let downloaded = self
            .fetcher
            .download(&target, asset, |downloaded, total| {
                on_event(&UpgradeEvent::DownloadProgress { downloaded, total });
            })
            .await;
        let staged = match downloaded {
            Ok(staged) => staged,
            Err(e) => {
                self.fetcher.discard(asset);
                return fail(UpgradeStage::Downloading, &mut on_event, "Download failed", e);
            }
        };

        enter(UpgradeStage::Verifying, &mut on_event);
        let staged_path = staged.path().to_path_buf();
        let verified = tokio::task::spawn_blocking(move || AssetFetcher::verify(&staged_path))
            .await
            .unwrap_or(false);
        if !verified {
            staged.discard();
            return fail(
                UpgradeStage::Verifying,
                &mut on_event,
                "Downloaded binary verification failed",
                Error::VerificationFailed("downloaded file is empty or missing".to_string()),
            );
        }

        enter(UpgradeStage::Installing, &mut on_event);
        let swapper = self.swapper.clone();
        let (source, dest) = (staged.path().to_path_buf(), executable.clone());
        let installed =
            match tokio::task::spawn_blocking(move || swapper.replace(&source, &dest)).await {
                Ok(result) => result,
                Err(e) => Err(Error::Update(format!("install task failed: {e}"))),
            };
        if let Err(e) = installed {
            return fail(
                UpgradeStage::Installing,
                &mut on_event,
                "Failed to replace executable",
                e,
            );
        }

        enter(UpgradeStage::Done, &mut on_event);
        info!("Updated {} to version {target}", executable.display());
        UpdateResult::succeeded(
            format!("Update completed successfully: now on version {target}"),
            Some(target),
        )
    }
}

fn enter<P>(stage: UpgradeStage, on_event: &mut P)
where
    P: FnMut(&UpgradeEvent),
{
    debug!("Update stage: {stage}");
    on_event(&UpgradeEvent::Stage(stage));
}

fn fail<P>(
    stage: UpgradeStage,
    on_event: &mut P,
    message: &str,
    error: impl fmt::Display,
) -> UpdateResult
where
    P: FnMut(&UpgradeEvent),
{
    let error = error.to_string();
    warn!("Update failed during {stage} stage: {message}: {error}");
    on_event(&UpgradeEvent::Stage(UpgradeStage::Failed));
    UpdateResult::failed(message, error)
}

//! Self-update engine.
//!
//! This module handles:
//! - Polling the GitHub release index for a newer version
//! - Resolving the release asset for the host platform
//! - Downloading the asset into a staging file
//! - Replacing the running binary with rollback support

mod coordinator;
mod fetch;
mod platform;
mod swap;
mod version;

pub use coordinator::{bounded, UpdateCoordinator};
pub use fetch::{release_tag, AssetFetcher, StagedAsset};
pub use platform::{Platform, PlatformResolver};
pub use swap::{backup_path, ExecutableSwapper, FileOps, StdFileOps};
pub use version::{parse_version, Decision, VersionOracle};

use crate::error::{Error, Result};
use semver::Version;
use std::fmt;
use std::time::Duration;

/// User agent sent with every request; GitHub rejects requests without one.
const USER_AGENT: &str = concat!("upgrader/", env!("CARGO_PKG_VERSION"), " (self-update)");

/// Outcome of an update availability check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateCheckResult {
    /// True only when both versions resolved and the latest is newer.
    pub update_available: bool,
    /// Running version, `None` when it could not be determined.
    pub current_version: Option<Version>,
    /// Latest published version (tag without the leading `v`).
    pub latest_version: Option<String>,
    /// Why the check could not be completed.
    pub error: Option<String>,
}

impl UpdateCheckResult {
    /// Running version for display, `unknown` when unresolved.
    #[must_use]
    pub fn current_display(&self) -> String {
        self.current_version
            .as_ref()
            .map_or_else(|| "unknown".to_string(), ToString::to_string)
    }
}

/// Terminal outcome of an apply attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateResult {
    /// Whether the attempt ended without failure (including "already latest").
    pub success: bool,
    /// Human-readable summary.
    pub message: String,
    /// Version now installed, when known.
    pub new_version: Option<String>,
    /// Cause of failure.
    pub error: Option<String>,
}

impl UpdateResult {
    pub(crate) fn succeeded(message: impl Into<String>, new_version: Option<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
            new_version,
            error: None,
        }
    }

    pub(crate) fn failed(message: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            new_version: None,
            error: Some(error.into()),
        }
    }
}

impl fmt::Display for UpdateResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.error, self.success) {
            (Some(error), false) => write!(f, "update failed: {}: {error}", self.message),
            _ => f.write_str(&self.message),
        }
    }
}

/// Client for small API requests: the whole request is capped at `timeout`.
fn index_client(timeout: Duration) -> Result<reqwest::Client> {
    build_client(
        reqwest::Client::builder()
            .connect_timeout(timeout)
            .timeout(timeout),
    )
}

/// Client for asset downloads: connect and each read are bounded, the whole
/// transfer is not.
fn download_client(connect_timeout: Duration, read_timeout: Duration) -> Result<reqwest::Client> {
    build_client(
        reqwest::Client::builder()
            .connect_timeout(connect_timeout)
            .read_timeout(read_timeout),
    )
}

fn build_client(builder: reqwest::ClientBuilder) -> Result<reqwest::Client> {
    builder
        .user_agent(USER_AGENT)
        .build()
        .map_err(|e| Error::Config(format!("cannot build HTTP client: {e}")))
}

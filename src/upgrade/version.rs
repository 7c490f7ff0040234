//! Version resolution against the GitHub release index.

use crate::config::UpgradeConfig;
use crate::error::{Error, Result};
use reqwest::header::ACCEPT;
use semver::Version;
use serde::Deserialize;
use tracing::{debug, warn};

/// Body of the `releases/latest` endpoint; only the tag is needed.
#[derive(Debug, Deserialize)]
struct LatestRelease {
    #[serde(default)]
    tag_name: Option<String>,
}

/// Parse a semver string, accepting one leading `v`.
///
/// # Errors
///
/// Returns [`Error::InvalidVersion`] if the remainder is not valid semver.
pub fn parse_version(input: &str) -> Result<Version> {
    let trimmed = input.trim();
    let bare = trimmed.strip_prefix('v').unwrap_or(trimmed);
    Version::parse(bare).map_err(|source| Error::InvalidVersion {
        input: input.to_string(),
        source,
    })
}

/// Outcome of [`VersionOracle::decide`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decision {
    /// Whether the latest release is strictly newer than the running version.
    pub available: bool,
    /// Running version, `None` when unresolved.
    pub current: Option<Version>,
    /// Latest published tag without the leading `v`, `None` when unknown.
    pub latest: Option<String>,
}

/// Resolves the running and latest published versions.
#[derive(Debug, Clone)]
pub struct VersionOracle {
    client: reqwest::Client,
    /// `releases/latest` endpoint of the tracked repository.
    release_index_url: String,
    /// Version identifier embedded in the running program.
    embedded: Option<String>,
}

impl VersionOracle {
    /// Create an oracle for the configured repository.
    ///
    /// `embedded` is the running program's version identifier, usually
    /// [`crate::VERSION`].
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: &UpgradeConfig, embedded: Option<&str>) -> Result<Self> {
        let client = super::index_client(config.request_timeout())?;
        Ok(Self::with_client(client, config, embedded))
    }

    /// Create an oracle that reuses an existing HTTP client.
    #[must_use]
    pub fn with_client(
        client: reqwest::Client,
        config: &UpgradeConfig,
        embedded: Option<&str>,
    ) -> Self {
        let release_index_url = format!(
            "{}/repos/{}/{}/releases/latest",
            config.api_base_url.trim_end_matches('/'),
            config.repo_owner,
            config.repo_name
        );
        Self {
            client,
            release_index_url,
            embedded: embedded.map(str::to_string),
        }
    }

    /// The release index endpoint queried by [`Self::latest_version`].
    #[must_use]
    pub fn release_index_url(&self) -> &str {
        &self.release_index_url
    }

    /// The running program's version.
    ///
    /// # Errors
    ///
    /// Returns [`Error::VersionUnresolved`] if no version is embedded, or
    /// [`Error::InvalidVersion`] if it is not semver.
    pub fn current_version(&self) -> Result<Version> {
        match self.embedded.as_deref().map(str::trim) {
            None | Some("") => Err(Error::VersionUnresolved),
            Some(raw) => parse_version(raw),
        }
    }

    /// Latest published release tag with any leading `v` removed.
    ///
    /// Returns `None` when the index is unreachable, answers with an error
    /// status, or sends a body without a usable `tag_name`.
    pub async fn latest_version(&self) -> Option<String> {
        debug!("Checking for updates from {}", self.release_index_url);

        let response = match self
            .client
            .get(&self.release_index_url)
            .header(ACCEPT, "application/vnd.github+json")
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
        {
            Ok(response) => response,
            Err(e) => {
                debug!("Release index unavailable: {e}");
                return None;
            }
        };

        let release: LatestRelease = match response.json().await {
            Ok(release) => release,
            Err(e) => {
                debug!("Malformed release index response: {e}");
                return None;
            }
        };

        let tag = release.tag_name?;
        let tag = tag.trim();
        let tag = tag.strip_prefix('v').unwrap_or(tag);
        if tag.is_empty() {
            debug!("Latest release has an empty tag");
            return None;
        }
        Some(tag.to_string())
    }

    /// True if `b` is strictly newer than `a` under semver ordering.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidVersion`] if either input is not semver.
    pub fn compare(a: &str, b: &str) -> Result<bool> {
        Ok(parse_version(b)? > parse_version(a)?)
    }

    /// Decide whether an update is available.
    ///
    /// Never fails: every resolution problem degrades to "not available".
    pub async fn decide(&self) -> Decision {
        let current = match self.current_version() {
            Ok(current) => current,
            Err(e) => {
                warn!("Cannot resolve current version: {e}");
                return Decision {
                    available: false,
                    current: None,
                    latest: None,
                };
            }
        };

        let Some(latest) = self.latest_version().await else {
            return Decision {
                available: false,
                current: Some(current),
                latest: None,
            };
        };

        let available = match Self::compare(&current.to_string(), &latest) {
            Ok(newer) => newer,
            Err(e) => {
                warn!("Ignoring latest release: {e}");
                false
            }
        };

        debug!("Current {current}, latest {latest}, update available: {available}");
        Decision {
            available,
            current: Some(current),
            latest: Some(latest),
        }
    }
}

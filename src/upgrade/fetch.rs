//! Release asset download into a staging file.

use crate::config::UpgradeConfig;
use crate::error::{Error, Result};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

/// Prefix of staging filenames inside the staging directory.
const STAGING_PREFIX: &str = "upgrader-staged-";

/// Release tag for a version: exactly one leading `v`.
#[must_use]
pub fn release_tag(version: &str) -> String {
    let version = version.trim();
    format!("v{}", version.strip_prefix('v').unwrap_or(version))
}

/// A downloaded asset waiting to be installed.
#[derive(Debug)]
pub struct StagedAsset {
    path: PathBuf,
    bytes: u64,
    sha256: String,
}

impl StagedAsset {
    /// Location of the staged file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of bytes written.
    #[must_use]
    pub const fn bytes(&self) -> u64 {
        self.bytes
    }

    /// Hex SHA-256 of the staged bytes. Informational only.
    #[must_use]
    pub fn sha256(&self) -> &str {
        &self.sha256
    }

    /// Delete the staged file (best-effort).
    pub fn discard(self) {
        remove_staging_file(&self.path);
    }
}

/// Downloads release assets for the configured repository.
#[derive(Debug, Clone)]
pub struct AssetFetcher {
    client: reqwest::Client,
    download_base_url: String,
    repo_owner: String,
    repo_name: String,
    staging_dir: PathBuf,
}

impl AssetFetcher {
    /// Create a fetcher from configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: &UpgradeConfig) -> Result<Self> {
        let client = super::download_client(
            config.download_connect_timeout(),
            config.download_read_timeout(),
        )?;
        Ok(Self::with_client(client, config))
    }

    /// Create a fetcher that reuses an existing HTTP client.
    #[must_use]
    pub fn with_client(client: reqwest::Client, config: &UpgradeConfig) -> Self {
        Self {
            client,
            download_base_url: config.download_base_url.trim_end_matches('/').to_string(),
            repo_owner: config.repo_owner.clone(),
            repo_name: config.repo_name.clone(),
            staging_dir: config.staging_dir(),
        }
    }

    /// Download URL of `asset_name` in the release for `version`.
    #[must_use]
    pub fn asset_url(&self, version: &str, asset_name: &str) -> String {
        format!(
            "{}/{}/{}/releases/download/{}/{}",
            self.download_base_url,
            self.repo_owner,
            self.repo_name,
            release_tag(version),
            asset_name
        )
    }

    /// Staging file used for `asset_name`.
    ///
    /// The name depends only on the asset, so concurrent downloads of the same
    /// asset on one host share a path.
    #[must_use]
    pub fn staging_path(&self, asset_name: &str) -> PathBuf {
        self.staging_dir.join(format!("{STAGING_PREFIX}{asset_name}"))
    }

    /// Stream `asset_name` of release `version` into the staging file.
    ///
    /// `on_progress(bytes_so_far, total_bytes)` runs after every chunk;
    /// `total_bytes` is 0 when the server does not send a length.
    ///
    /// A failed download may leave a partial staging file behind; removing it
    /// is up to the caller.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Download`] on transport errors, non-2xx responses,
    /// or local write failures.
    pub async fn download<F>(
        &self,
        version: &str,
        asset_name: &str,
        mut on_progress: F,
    ) -> Result<StagedAsset>
    where
        F: FnMut(u64, u64),
    {
        let url = self.asset_url(version, asset_name);
        let path = self.staging_path(asset_name);
        info!("Downloading {url}");

        let mut response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| Error::Download(format!("request to {url} failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::Download(format!("{url} returned HTTP {status}")));
        }
        let total = response.content_length().unwrap_or(0);

        tokio::fs::create_dir_all(&self.staging_dir)
            .await
            .map_err(|e| write_error(&self.staging_dir, &e))?;
        let mut file = File::create(&path)
            .await
            .map_err(|e| write_error(&path, &e))?;

        let mut hasher = Sha256::new();
        let mut downloaded: u64 = 0;
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| Error::Download(format!("reading {url} failed: {e}")))?
        {
            file.write_all(&chunk)
                .await
                .map_err(|e| write_error(&path, &e))?;
            hasher.update(&chunk);
            downloaded += chunk.len() as u64;
            on_progress(downloaded, total);
        }

        file.flush().await.map_err(|e| write_error(&path, &e))?;
        file.sync_all().await.map_err(|e| write_error(&path, &e))?;
        drop(file);

        if total > 0 && downloaded != total {
            warn!("Expected {total} bytes from {url}, received {downloaded}");
        }

        let sha256 = hex::encode(hasher.finalize());
        info!(
            "Staged {asset_name} ({downloaded} bytes, sha256 {sha256}) at {}",
            path.display()
        );

        Ok(StagedAsset {
            path,
            bytes: downloaded,
            sha256,
        })
    }

    /// Best-effort removal of the staging file for `asset_name`.
    pub fn discard(&self, asset_name: &str) {
        remove_staging_file(&self.staging_path(asset_name));
    }

    /// Accept a staged file if it exists and is non-empty.
    ///
    /// No checksum or signature is published with releases, so this is the
    /// only integrity check available.
    #[must_use]
    pub fn verify(path: &Path) -> bool {
        match std::fs::metadata(path) {
            Ok(meta) => meta.is_file() && meta.len() > 0,
            Err(e) => {
                debug!("Cannot stat {}: {e}", path.display());
                false
            }
        }
    }
}

fn write_error(path: &Path, e: &std::io::Error) -> Error {
    Error::Download(format!("cannot write {}: {e}", path.display()))
}

fn remove_staging_file(path: &Path) {
    match std::fs::remove_file(path) {
        Ok(()) => debug!("Removed staging file {}", path.display()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!("Cannot remove staging file {}: {e}", path.display()),
    }
}

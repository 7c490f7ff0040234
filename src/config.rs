//! Configuration for upgrader.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Top-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpgraderConfig {
    /// Upgrade configuration.
    #[serde(default)]
    pub upgrade: UpgradeConfig,

    /// Log level.
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

/// Self-update configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpgradeConfig {
    /// GitHub repository owner publishing the releases.
    #[serde(default = "default_repo_owner")]
    pub repo_owner: String,

    /// GitHub repository name publishing the releases.
    #[serde(default = "default_repo_name")]
    pub repo_name: String,

    /// Base URL of the release index API.
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,

    /// Base URL that release assets are downloaded from.
    #[serde(default = "default_download_base_url")]
    pub download_base_url: String,

    /// Run the bounded update check when the program starts.
    #[serde(default = "default_check_on_startup")]
    pub check_on_startup: bool,

    /// Wall-clock budget for the startup check, in milliseconds.
    #[serde(default = "default_startup_check_timeout_ms")]
    pub startup_check_timeout_ms: u64,

    /// Timeout for release index requests, in seconds.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Connect timeout for asset downloads, in seconds.
    #[serde(default = "default_download_connect_timeout")]
    pub download_connect_timeout_secs: u64,

    /// Longest wait for the next bytes of an asset download, in seconds.
    ///
    /// A transfer that keeps making progress is never cut off.
    #[serde(default = "default_download_read_timeout")]
    pub download_read_timeout_secs: u64,

    /// Directory for staged downloads (system temp dir when unset).
    #[serde(default)]
    pub staging_dir: Option<PathBuf>,
}

impl Default for UpgraderConfig {
    fn default() -> Self {
        Self {
            upgrade: UpgradeConfig::default(),
            log_level: default_log_level(),
        }
    }
}

impl Default for UpgradeConfig {
    fn default() -> Self {
        Self {
            repo_owner: default_repo_owner(),
            repo_name: default_repo_name(),
            api_base_url: default_api_base_url(),
            download_base_url: default_download_base_url(),
            check_on_startup: default_check_on_startup(),
            startup_check_timeout_ms: default_startup_check_timeout_ms(),
            request_timeout_secs: default_request_timeout(),
            download_connect_timeout_secs: default_download_connect_timeout(),
            download_read_timeout_secs: default_download_read_timeout(),
            staging_dir: None,
        }
    }
}

impl UpgradeConfig {
    /// Budget for the startup check.
    #[must_use]
    pub fn startup_check_timeout(&self) -> Duration {
        Duration::from_millis(self.startup_check_timeout_ms)
    }

    /// Timeout for release index requests.
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Connect timeout for asset downloads.
    #[must_use]
    pub fn download_connect_timeout(&self) -> Duration {
        Duration::from_secs(self.download_connect_timeout_secs)
    }

    /// Per-read timeout for asset downloads.
    #[must_use]
    pub fn download_read_timeout(&self) -> Duration {
        Duration::from_secs(self.download_read_timeout_secs)
    }

    /// Directory downloads are staged in.
    #[must_use]
    pub fn staging_dir(&self) -> PathBuf {
        self.staging_dir.clone().unwrap_or_else(std::env::temp_dir)
    }
}

fn default_repo_owner() -> String {
    "upgrader-rs".to_string()
}

fn default_repo_name() -> String {
    "upgrader".to_string()
}

fn default_api_base_url() -> String {
    "https://api.github.com".to_string()
}

fn default_download_base_url() -> String {
    "https://github.com".to_string()
}

const fn default_check_on_startup() -> bool {
    true
}

const fn default_startup_check_timeout_ms() -> u64 {
    2000
}

const fn default_request_timeout() -> u64 {
    5
}

const fn default_download_connect_timeout() -> u64 {
    15
}

const fn default_download_read_timeout() -> u64 {
    30
}

fn default_log_level() -> String {
    "warn".to_string()
}

impl UpgraderConfig {
    /// Default location of the configuration file, if a home directory exists.
    #[must_use]
    pub fn default_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("", "", "upgrader")
            .map(|dirs| dirs.config_dir().join("config.toml"))
    }

    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| crate::Error::Config(e.to_string()))
    }

    /// Load the default configuration file, falling back to defaults when it
    /// does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load_default() -> crate::Result<Self> {
        match Self::default_path() {
            Some(path) if path.exists() => Self::from_file(&path),
            _ => Ok(Self::default()),
        }
    }

    /// Save configuration to a TOML file, creating parent directories.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn to_file(&self, path: &Path) -> crate::Result<()> {
        let content =
            toml::to_string_pretty(self).map_err(|e| crate::Error::Config(e.to_string()))?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, content)?;
        Ok(())
    }
}

//! Error types for upgrader.

use thiserror::Error;

/// Result type for upgrader operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while checking for or applying an upgrade.
#[derive(Debug, Error)]
pub enum Error {
    /// The version embedded in the running program is missing or empty.
    #[error("current version could not be determined")]
    VersionUnresolved,

    /// A version string is not valid semver.
    #[error("invalid version '{input}': {source}")]
    InvalidVersion {
        /// The string that failed to parse.
        input: String,
        /// Underlying parse error.
        source: semver::Error,
    },

    /// The host operating system has no published release asset.
    #[error("unsupported platform: {0}")]
    UnsupportedPlatform(String),

    /// Fetching a release asset failed (transport, status, or local write).
    #[error("download failed: {0}")]
    Download(String),

    /// The downloaded asset is empty or unreadable.
    #[error("verification failed: {0}")]
    VerificationFailed(String),

    /// Installing the new executable failed.
    ///
    /// The message already states whether the original was restored.
    #[error("{0}")]
    Update(String),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

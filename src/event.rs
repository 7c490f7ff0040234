//! Upgrade progress events.

use std::fmt;

/// Stages of a single apply attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpgradeStage {
    /// Deciding whether an update is available.
    Checking,
    /// Host platform and release asset resolved.
    PlatformResolved,
    /// Fetching the release asset.
    Downloading,
    /// Checking the staged asset.
    Verifying,
    /// Swapping the executable.
    Installing,
    /// Finished successfully.
    Done,
    /// Finished with a failure.
    Failed,
}

impl fmt::Display for UpgradeStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Checking => "checking",
            Self::PlatformResolved => "platform resolved",
            Self::Downloading => "downloading",
            Self::Verifying => "verifying",
            Self::Installing => "installing",
            Self::Done => "done",
            Self::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Events emitted while an upgrade is applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpgradeEvent {
    /// The apply attempt entered a new stage.
    Stage(UpgradeStage),

    /// A version was chosen for installation.
    TargetSelected {
        /// Currently running version, if known.
        current: Option<String>,
        /// Version being installed.
        target: String,
        /// Whether the install was forced.
        forced: bool,
    },

    /// Asset download started.
    DownloadStarted {
        /// Release asset filename.
        asset: String,
    },

    /// Bytes received so far.
    DownloadProgress {
        /// Bytes written to the staging file.
        downloaded: u64,
        /// Expected size, 0 when the server sent no length.
        total: u64,
    },
}

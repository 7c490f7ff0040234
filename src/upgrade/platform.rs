//! Host platform detection and release asset names.

use crate::error::{Error, Result};
use std::fmt;
use std::path::PathBuf;
use tracing::debug;

/// Operating systems with a published release asset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Platform {
    /// Microsoft Windows.
    Windows,
    /// Linux.
    Linux,
    /// Apple macOS.
    Macos,
}

/// Platform key and release asset filename, in sync with the release workflow.
const ASSETS: [(Platform, &str, &str); 3] = [
    (Platform::Windows, "windows", "upgrader.exe"),
    (Platform::Linux, "linux", "upgrader"),
    (Platform::Macos, "macos", "upgrader-macos"),
];

impl Platform {
    /// All supported platforms.
    pub const ALL: [Self; 3] = [Self::Windows, Self::Linux, Self::Macos];

    /// Map an OS identifier (as in `std::env::consts::OS`) to a platform.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnsupportedPlatform`] for any other identifier.
    pub fn from_os(os: &str) -> Result<Self> {
        ASSETS
            .iter()
            .find(|(_, key, _)| *key == os)
            .map(|(platform, _, _)| *platform)
            .ok_or_else(|| {
                Error::UnsupportedPlatform(format!(
                    "{os} (supported platforms: windows, linux, macos)"
                ))
            })
    }

    /// Stable platform key.
    #[must_use]
    pub const fn key(self) -> &'static str {
        match self {
            Self::Windows => ASSETS[0].1,
            Self::Linux => ASSETS[1].1,
            Self::Macos => ASSETS[2].1,
        }
    }

    /// Release asset filename for this platform.
    #[must_use]
    pub const fn asset_name(self) -> &'static str {
        match self {
            Self::Windows => ASSETS[0].2,
            Self::Linux => ASSETS[1].2,
            Self::Macos => ASSETS[2].2,
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// Resolves the host platform and the executable to replace.
#[derive(Debug, Clone)]
pub struct PlatformResolver {
    /// OS identifier reported by the host.
    os: String,
    /// Executable to replace instead of the running one.
    executable: Option<PathBuf>,
}

impl Default for PlatformResolver {
    fn default() -> Self {
        Self::host()
    }
}

impl PlatformResolver {
    /// Resolver for the machine this process runs on.
    #[must_use]
    pub fn host() -> Self {
        Self::with_os(std::env::consts::OS)
    }

    /// Resolver that reports the given OS identifier.
    #[must_use]
    pub fn with_os(os: impl Into<String>) -> Self {
        Self {
            os: os.into(),
            executable: None,
        }
    }

    /// Replace `path` instead of the running executable.
    #[must_use]
    pub fn with_executable(mut self, path: impl Into<PathBuf>) -> Self {
        self.executable = Some(path.into());
        self
    }

    /// The OS identifier being resolved.
    #[must_use]
    pub fn os(&self) -> &str {
        &self.os
    }

    /// Detect the platform.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnsupportedPlatform`] if the OS has no release asset.
    pub fn detect(&self) -> Result<Platform> {
        let platform = Platform::from_os(&self.os)?;
        debug!("Detected platform {platform}");
        Ok(platform)
    }

    /// Release asset filename for `platform`.
    #[must_use]
    pub const fn asset_name(&self, platform: Platform) -> &'static str {
        platform.asset_name()
    }

    /// Release asset filename for a platform key.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnsupportedPlatform`] if the key is not in the table.
    pub fn asset_name_for_key(key: &str) -> Result<&'static str> {
        ASSETS
            .iter()
            .find(|(_, k, _)| *k == key)
            .map(|(_, _, asset)| *asset)
            .ok_or_else(|| Error::UnsupportedPlatform(format!("no asset mapping for {key}")))
    }

    /// Absolute path of the executable to replace.
    ///
    /// Symlinks are resolved so the real binary is replaced, not the link.
    ///
    /// # Errors
    ///
    /// Returns an error if the running executable cannot be located.
    pub fn current_executable_path(&self) -> Result<PathBuf> {
        if let Some(path) = &self.executable {
            return Ok(path.clone());
        }
        let exe = std::env::current_exe()?;
        Ok(std::fs::canonicalize(&exe).unwrap_or(exe))
    }
}

//! In-place replacement of the running executable.
//!
//! The swap is a two-phase commit over the filesystem:
//!
//! 1. Copy the current executable to `<target>.backup`
//! 2. Move the staged file onto the target (the commit point)
//! 3. Add execute permission bits (Unix)
//! 4. Delete the backup
//!
//! A failure after step 1 restores the backup only if step 2 happened;
//! before that the original was never touched and the backup is discarded.
//! When there is no target to back up, a `.backup` already on disk belongs
//! to an earlier run and is never touched.

use crate::error::{Error, Result};
use std::ffi::OsString;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};

/// Filesystem primitives used by the swap.
///
/// The defaults delegate to `std::fs`.
pub trait FileOps: Send + Sync {
    /// Copy `from` to `to`, preserving permissions.
    fn copy(&self, from: &Path, to: &Path) -> io::Result<()> {
        fs::copy(from, to).map(|_| ())
    }

    /// Rename `from` to `to`, replacing `to`.
    fn rename(&self, from: &Path, to: &Path) -> io::Result<()> {
        fs::rename(from, to)
    }

    /// OR the owner/group/other execute bits into the mode of `path`.
    fn make_executable(&self, path: &Path) -> io::Result<()> {
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mut perms = fs::metadata(path)?.permissions();
            perms.set_mode(perms.mode() | 0o111);
            fs::set_permissions(path, perms)?;
        }
        #[cfg(not(unix))]
        let _ = path;
        Ok(())
    }

    /// Remove the file at `path`.
    fn remove(&self, path: &Path) -> io::Result<()> {
        fs::remove_file(path)
    }
}

/// [`FileOps`] backed directly by `std::fs`.
#[derive(Debug, Default, Clone, Copy)]
pub struct StdFileOps;

impl FileOps for StdFileOps {}

/// Replaces an executable with a staged file, rolling back on failure.
#[derive(Debug, Default, Clone)]
pub struct ExecutableSwapper<F: FileOps = StdFileOps> {
    ops: F,
}

impl ExecutableSwapper {
    /// Swapper using the real filesystem.
    #[must_use]
    pub const fn new() -> Self {
        Self { ops: StdFileOps }
    }
}

impl<F: FileOps> ExecutableSwapper<F> {
    /// Swapper using custom filesystem primitives.
    #[must_use]
    pub const fn with_ops(ops: F) -> Self {
        Self { ops }
    }

    /// Replace `target` with `staged`.
    ///
    /// On success `target` holds the staged bytes, the backup is gone, and
    /// `staged` no longer exists. On a handled failure `target` holds the
    /// original executable.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Update`] naming the failed step and whether the
    /// original was restored. If restoring fails too, the backup is left on
    /// disk and the error names both failures.
    pub fn replace(&self, staged: &Path, target: &Path) -> Result<()> {
        let backup = backup_path(target);
        let mut progress = SwapProgress::default();

        match self.install(staged, target, &backup, &mut progress) {
            Ok(()) => {
                info!("Installed new executable at {}", target.display());
                Ok(())
            }
            Err(cause) => Err(self.recover(staged, target, &backup, progress, &cause)),
        }
    }

    fn install(
        &self,
        staged: &Path,
        target: &Path,
        backup: &Path,
        progress: &mut SwapProgress,
    ) -> std::result::Result<(), String> {
        if target.exists() {
            // From here on the backup path is ours, even if the copy fails midway.
            progress.owns_backup = true;
            self.ops
                .copy(target, backup)
                .map_err(|e| format!("backing up {} failed: {e}", target.display()))?;
            debug!("Backed up {} to {}", target.display(), backup.display());
        }

        self.move_into_place(staged, target)
            .map_err(|e| format!("moving new executable to {} failed: {e}", target.display()))?;
        progress.committed = true;

        self.ops
            .make_executable(target)
            .map_err(|e| format!("setting permissions on {} failed: {e}", target.display()))?;

        if progress.owns_backup {
            self.ops
                .remove(backup)
                .map_err(|e| format!("removing backup {} failed: {e}", backup.display()))?;
        }
        Ok(())
    }

    /// Rename the staged file over the target.
    ///
    /// When the rename fails (typically because the staging directory is on
    /// another filesystem), the file is copied next to the target first and
    /// then renamed, so the target is never partially written.
    fn move_into_place(&self, staged: &Path, target: &Path) -> io::Result<()> {
        let Err(rename_err) = self.ops.rename(staged, target) else {
            return Ok(());
        };
        debug!("Direct rename failed ({rename_err}), copying next to target");

        let incoming = with_suffix(target, ".incoming");
        let placed = self
            .ops
            .copy(staged, &incoming)
            .and_then(|()| self.ops.rename(&incoming, target));
        if let Err(e) = placed {
            let _ = self.ops.remove(&incoming);
            return Err(e);
        }

        if let Err(e) = self.ops.remove(staged) {
            warn!("Cannot remove staged file {}: {e}", staged.display());
        }
        Ok(())
    }

    fn recover(
        &self,
        staged: &Path,
        target: &Path,
        backup: &Path,
        progress: SwapProgress,
        cause: &str,
    ) -> Error {
        warn!("Executable swap failed: {cause}");
        let committed = progress.committed;

        if !committed && staged.exists() {
            // Cleanup must not mask the primary error.
            let _ = self.ops.remove(staged);
        }

        if !progress.owns_backup || !backup.exists() {
            let state = if committed {
                "no backup was needed"
            } else {
                "original executable left untouched"
            };
            return Error::Update(format!("failed to replace executable: {cause}; {state}"));
        }

        if committed {
            match self.ops.rename(backup, target) {
                Ok(()) => {
                    info!("Restored {} from backup", target.display());
                    Error::Update(format!(
                        "failed to replace executable: {cause}; original executable restored"
                    ))
                }
                Err(restore_err) => {
                    error!(
                        "Cannot restore {} from {}: {restore_err}",
                        target.display(),
                        backup.display()
                    );
                    Error::Update(format!(
                        "failed to replace executable: {cause}; restoring backup also failed: \
                         {restore_err}. The original executable is preserved at {}",
                        backup.display()
                    ))
                }
            }
        } else {
            match self.ops.remove(backup) {
                Ok(()) => Error::Update(format!(
                    "failed to replace executable: {cause}; original executable left untouched"
                )),
                Err(remove_err) => Error::Update(format!(
                    "failed to replace executable: {cause}; original executable left untouched, \
                     but removing backup {} failed: {remove_err}",
                    backup.display()
                )),
            }
        }
    }
}

/// How far a single [`ExecutableSwapper::replace`] call got.
#[derive(Debug, Default, Clone, Copy)]
struct SwapProgress {
    /// This call backed up the target, so the backup path is its to clean up.
    owns_backup: bool,
    /// The staged file has been moved onto the target.
    committed: bool,
}

/// Backup location for `target`: the same path with `.backup` appended.
#[must_use]
pub fn backup_path(target: &Path) -> PathBuf {
    with_suffix(target, ".backup")
}

fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(suffix);
    PathBuf::from(name)
}

//! Command-line interface definition.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use upgrader::UpgraderConfig;

/// Self-updating command-line tool.
#[derive(Parser, Debug)]
#[command(name = "upgrader")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Command to run. Without one, only the startup update check runs.
    #[command(subcommand)]
    pub command: Option<Command>,

    /// GitHub repository owner publishing releases.
    #[arg(long, env = "UPGRADER_REPO_OWNER")]
    pub repo_owner: Option<String>,

    /// GitHub repository name publishing releases.
    #[arg(long, env = "UPGRADER_REPO_NAME")]
    pub repo_name: Option<String>,

    /// Directory to stage downloads in.
    #[arg(long, env = "UPGRADER_STAGING_DIR")]
    pub staging_dir: Option<PathBuf>,

    /// Skip the update check that runs at startup.
    #[arg(long, env = "UPGRADER_NO_STARTUP_CHECK")]
    pub no_startup_check: bool,

    /// Startup check budget in milliseconds.
    #[arg(long, env = "UPGRADER_STARTUP_TIMEOUT_MS")]
    pub startup_timeout_ms: Option<u64>,

    /// Log level (overridden by RUST_LOG).
    #[arg(long)]
    pub log_level: Option<String>,

    /// Emit logs as JSON lines.
    #[arg(long, env = "UPGRADER_LOG_JSON")]
    pub log_json: bool,

    /// Path to configuration file.
    #[arg(long, short, env = "UPGRADER_CONFIG")]
    pub config: Option<PathBuf>,
}

/// Subcommands.
#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Check whether a newer release is published.
    Check,

    /// Download and install the latest release.
    Apply {
        /// Reinstall even when already on the latest version.
        #[arg(long)]
        force: bool,
    },

    /// Show the effective configuration.
    Config {
        /// Also write it to the default configuration file.
        #[arg(long)]
        write: bool,
    },
}

impl Cli {
    /// Split the arguments into the effective configuration and the command.
    ///
    /// # Errors
    ///
    /// Returns an error if a config file is specified but cannot be loaded.
    pub fn into_parts(self) -> color_eyre::Result<(UpgraderConfig, Option<Command>)> {
        // Start with the given or default config file
        let mut config = match self.config {
            Some(ref path) => UpgraderConfig::from_file(path)?,
            None => UpgraderConfig::load_default()?,
        };

        // Override with CLI arguments
        if let Some(owner) = self.repo_owner {
            config.upgrade.repo_owner = owner;
        }
        if let Some(name) = self.repo_name {
            config.upgrade.repo_name = name;
        }
        if let Some(dir) = self.staging_dir {
            config.upgrade.staging_dir = Some(dir);
        }
        if self.no_startup_check {
            config.upgrade.check_on_startup = false;
        }
        if let Some(ms) = self.startup_timeout_ms {
            config.upgrade.startup_check_timeout_ms = ms;
        }
        if let Some(level) = self.log_level {
            config.log_level = level;
        }

        Ok((config, self.command))
    }
}

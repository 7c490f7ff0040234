//! upgrader CLI entry point.

mod cli;
mod progress;

use clap::Parser;
use cli::{Cli, Command};
use color_eyre::eyre::eyre;
use progress::ApplyProgress;
use tracing::{debug, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use upgrader::{UpdateCoordinator, UpgraderConfig};

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
    // Initialize error handling
    color_eyre::install()?;

    // Parse CLI arguments
    let cli = Cli::parse();
    let log_json = cli.log_json;
    let (config, command) = cli.into_parts()?;

    // Initialize tracing on stderr so command output stays clean
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    let registry = tracing_subscriber::registry().with(filter);
    if log_json {
        registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(fmt::layer().with_writer(std::io::stderr))
            .init();
    }

    debug!("upgrader v{}", upgrader::VERSION);

    let coordinator = UpdateCoordinator::new(&config.upgrade)?;

    match command {
        None => startup_check(&coordinator, &config).await,
        Some(Command::Check) => check(&coordinator).await,
        Some(Command::Apply { force }) => apply(&coordinator, force).await?,
        Some(Command::Config { write }) => show_config(&config, write)?,
    }

    Ok(())
}

/// Silent, bounded check run on every launch.
async fn startup_check(coordinator: &UpdateCoordinator, config: &UpgraderConfig) {
    if let Some(backup) = coordinator.leftover_backup() {
        warn!(
            "A previous update did not finish cleanly; the original executable is at {}",
            backup.display()
        );
    }

    if !config.upgrade.check_on_startup {
        debug!("Startup update check disabled");
        return;
    }

    let timeout = config.upgrade.startup_check_timeout();
    if let Some(result) = coordinator.check_with_timeout(timeout).await {
        if let (true, Some(latest)) = (result.update_available, &result.latest_version) {
            println!(
                "A new version is available: {} -> {latest}. Run `upgrader apply` to update.",
                result.current_display()
            );
        }
    }
}

async fn check(coordinator: &UpdateCoordinator) {
    let result = coordinator.check_for_updates().await;
    println!("Current version: {}", result.current_display());
    if let Some(latest) = &result.latest_version {
        println!("Latest version:  {latest}");
    }

    match (&result.error, result.update_available) {
        (Some(error), _) => println!("Update check failed: {error}"),
        (None, true) => println!("Update available! Run `upgrader apply` to install it."),
        (None, false) => println!("You are on the latest version."),
    }
}

async fn apply(coordinator: &UpdateCoordinator, force: bool) -> color_eyre::Result<()> {
    eprintln!("Checking for updates...");
    let mut progress = ApplyProgress::default();
    let result = coordinator
        .perform_update(force, |event| progress.handle(event))
        .await;

    if result.success {
        println!("{result}");
        Ok(())
    } else {
        Err(eyre!("{result}"))
    }
}

fn show_config(config: &UpgraderConfig, write: bool) -> color_eyre::Result<()> {
    print!("{}", toml::to_string_pretty(config)?);
    if write {
        let path = UpgraderConfig::default_path()
            .ok_or_else(|| eyre!("no home directory to store configuration in"))?;
        config.to_file(&path)?;
        println!("# written to {}", path.display());
    }
    Ok(())
}

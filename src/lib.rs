//! # upgrader
//!
//! Self-update engine for single-binary command-line tools published as
//! GitHub release assets.
//!
//! ## Features
//!
//! - **Version check**: compares the embedded version with the latest
//!   published release tag using semver ordering
//! - **Bounded startup check**: never delays or fails program launch
//! - **Platform assets**: one fixed release asset per supported OS
//! - **Streaming download**: progress reporting into a private staging file
//! - **Safe install**: backup, replace, and rollback so the executable path
//!   always holds a runnable binary
//!
//! ## Example
//!
//! ```rust,ignore
//! use upgrader::{UpdateCoordinator, UpgraderConfig};
//!
//! let coordinator = UpdateCoordinator::new(&UpgraderConfig::default().upgrade)?;
//! let result = coordinator.perform_update(false, |_event| {}).await;
//! println!("{}", result.message);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod error;
pub mod event;
pub mod upgrade;

pub use config::{UpgradeConfig, UpgraderConfig};
pub use error::{Error, Result};
pub use event::{UpgradeEvent, UpgradeStage};
pub use upgrade::{
    AssetFetcher, Decision, ExecutableSwapper, Platform, PlatformResolver, StagedAsset,
    UpdateCheckResult, UpdateCoordinator, UpdateResult, VersionOracle,
};

/// Version embedded in this build.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

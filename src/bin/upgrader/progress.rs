//! Terminal rendering of upgrade events.

use indicatif::{ProgressBar, ProgressStyle};
use upgrader::{UpgradeEvent, UpgradeStage};

/// Renders apply progress on stderr.
#[derive(Default)]
pub struct ApplyProgress {
    bar: Option<ProgressBar>,
}

impl ApplyProgress {
    /// Handle one event from the coordinator.
    pub fn handle(&mut self, event: &UpgradeEvent) {
        match event {
            UpgradeEvent::TargetSelected {
                current,
                target,
                forced,
            } => {
                if *forced {
                    eprintln!("Force update: installing version {target}");
                } else {
                    let current = current.as_deref().unwrap_or("unknown");
                    eprintln!("Update available: {current} -> {target}");
                }
            }
            UpgradeEvent::DownloadStarted { asset } => {
                let bar = ProgressBar::new(0);
                if let Ok(style) = ProgressStyle::with_template(
                    "  {msg} [{bar:30}] {bytes}/{total_bytes} {bytes_per_sec} ETA {eta}",
                ) {
                    bar.set_style(style);
                }
                bar.set_message(asset.clone());
                self.bar = Some(bar);
            }
            UpgradeEvent::DownloadProgress { downloaded, total } => {
                if let Some(bar) = &self.bar {
                    if *total > 0 {
                        bar.set_length(*total);
                    }
                    bar.set_position(*downloaded);
                }
            }
            UpgradeEvent::Stage(UpgradeStage::Installing) => {
                self.finish();
                eprintln!("Installing update...");
            }
            UpgradeEvent::Stage(UpgradeStage::Verifying | UpgradeStage::Failed) => self.finish(),
            UpgradeEvent::Stage(_) => {}
        }
    }

    fn finish(&mut self) {
        if let Some(bar) = self.bar.take() {
            bar.finish_and_clear();
        }
    }
}

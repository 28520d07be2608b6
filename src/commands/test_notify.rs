//! Test-notify command implementation

use anyhow::Result;
use dca_monitor::notifier::{notifier_from_config, Message};
use dca_monitor::Config;
use tracing::{error, info};

pub fn run(config: &Config) -> Result<u8> {
    let notifier = notifier_from_config(&config.notifier, false)?;
    let message = Message::new(
        format!("{} DCA monitor - test", config.monitor.symbol),
        format!(
            "Test notification sent at {}.\n\nIf you can read this, alerts are wired up.",
            chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
        ),
    );

    match notifier.send(&message) {
        Ok(()) => {
            info!("Test notification sent");
            Ok(0)
        }
        Err(e) => {
            error!("Test notification failed: {}", e);
            Ok(3)
        }
    }
}

//! Push notifications for triggered actions
//!
//! `ServerChanNotifier` posts to the ServerChan (WeChat push) API;
//! `ConsoleNotifier` prints to stdout for dry runs. Without a key, a real run
//! gets `UnconfiguredNotifier` and every alert counts as undelivered.

use anyhow::{Context, Result};
use reqwest::blocking::Client;
use serde::Deserialize;
use std::time::Duration as StdDuration;
use tracing::{info, warn};

use crate::config::NotifierConfig;
use crate::error::{NotifyError, NotifyResult};
use crate::types::{Action, DailyReading, MonthlyState};

/// Rendered notification
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub title: String,
    pub body: String,
}

impl Message {
    pub fn new(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            body: body.into(),
        }
    }
}

pub trait Notifier {
    fn send(&self, message: &Message) -> NotifyResult<()>;
}

// =============================================================================
// Message Rendering
// =============================================================================

/// Human-readable message for a triggered action
pub fn render_message(symbol: &str, action: Action, reading: &DailyReading, state: &MonthlyState) -> Message {
    let title = format!("{} DCA alert - {}", symbol, action.label());

    let (condition, advice) = match action {
        Action::FirstBuy => (
            format!("daily decline of {:.2}%", reading.change_pct),
            "Execute the first buy of the month.".to_string(),
        ),
        Action::DeadlineReminder => (
            "third Friday of the month reached without a 1% dip".to_string(),
            "Execute the first buy of the month as scheduled.".to_string(),
        ),
        Action::SecondBuy => (
            format!("monthly cumulative decline of {:.2}%", state.cumulative_decline_pct),
            "Execute the second buy to add to the position.".to_string(),
        ),
        Action::ThirdBuy => (
            format!("market breadth at {:.1}%", reading.breadth_pct),
            "Breadth has collapsed; execute the third buy.".to_string(),
        ),
    };

    let mut body = String::new();
    body.push_str(&format!("Trigger: {}\n\n", condition));
    body.push_str(&format!("- Date: {}\n", reading.date));
    body.push_str(&format!("- Close: ${:.2}\n", reading.close));
    body.push_str(&format!("- Daily change: {:+.2}%\n", reading.change_pct));
    body.push_str(&format!(
        "- Month-to-date decline: {:.2}%\n",
        state.cumulative_decline_pct
    ));
    if action == Action::ThirdBuy {
        body.push_str(&format!("- Market breadth: {:.1}%\n", reading.breadth_pct));
    }
    body.push_str(&format!("\n{}", advice));

    Message::new(title, body)
}

// =============================================================================
// ServerChan
// =============================================================================

#[derive(Debug, Deserialize)]
struct ServerChanResponse {
    code: i64,
    #[serde(default)]
    message: String,
}

pub struct ServerChanNotifier {
    client: Client,
    endpoint: String,
    sendkey: String,
}

impl ServerChanNotifier {
    pub fn new(config: &NotifierConfig, sendkey: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(StdDuration::from_secs(config.timeout_secs))
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            sendkey: sendkey.into(),
        })
    }

    fn send_url(&self) -> String {
        format!("{}/{}.send", self.endpoint, self.sendkey)
    }
}

impl Notifier for ServerChanNotifier {
    fn send(&self, message: &Message) -> NotifyResult<()> {
        let response = self
            .client
            .post(self.send_url())
            .form(&[("title", message.title.as_str()), ("desp", message.body.as_str())])
            .send()?;

        let status = response.status();
        if !status.is_success() {
            return Err(NotifyError::Rejected {
                code: i64::from(status.as_u16()),
                message: format!("HTTP {}", status),
            });
        }

        let result: ServerChanResponse = response.json()?;
        if result.code != 0 {
            return Err(NotifyError::Rejected {
                code: result.code,
                message: result.message,
            });
        }

        info!("Notification delivered: {}", message.title);
        Ok(())
    }
}

// =============================================================================
// Console
// =============================================================================

#[derive(Debug, Default, Clone)]
pub struct ConsoleNotifier;

impl Notifier for ConsoleNotifier {
    fn send(&self, message: &Message) -> NotifyResult<()> {
        println!("\n{}", "=".repeat(60));
        println!("{}", message.title);
        println!("{}", "=".repeat(60));
        println!("{}", message.body);
        println!("{}\n", "=".repeat(60));
        Ok(())
    }
}

/// Stands in for ServerChan when no key is configured. Every send fails, so a
/// triggered action is reported as undelivered.
#[derive(Debug, Default, Clone)]
pub struct UnconfiguredNotifier;

impl Notifier for UnconfiguredNotifier {
    fn send(&self, message: &Message) -> NotifyResult<()> {
        println!("{}\n\n{}", message.title, message.body);
        Err(NotifyError::NotConfigured)
    }
}

/// Pick the notifier for this run: console for dry runs, ServerChan otherwise
pub fn notifier_from_config(config: &NotifierConfig, dry_run: bool) -> Result<Box<dyn Notifier>> {
    if dry_run {
        return Ok(Box::new(ConsoleNotifier));
    }
    match config.sendkey.as_deref() {
        Some(key) if !key.trim().is_empty() => Ok(Box::new(ServerChanNotifier::new(config, key)?)),
        _ => {
            warn!("No ServerChan key configured (SCKEY), triggered alerts cannot be delivered");
            Ok(Box::new(UnconfiguredNotifier))
        }
    }
}

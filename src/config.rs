//! Configuration management
//!
//! Handles loading and parsing of the JSON configuration file with environment
//! variable support for API credentials and the push-notification key.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub monitor: MonitorConfig,
    #[serde(default)]
    pub triggers: TriggerConfig,
    #[serde(default)]
    pub market_data: MarketDataConfig,
    #[serde(default)]
    pub breadth: BreadthConfig,
    #[serde(default)]
    pub notifier: NotifierConfig,
}

impl Config {
    /// Load configuration from JSON file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let mut config: Config =
            serde_json::from_str(&contents).context("Failed to parse config JSON")?;

        config.apply_env();
        Ok(config)
    }

    /// Defaults plus credentials from the environment
    pub fn from_env() -> Self {
        let mut config = Config::default();
        config.apply_env();
        config
    }

    /// Load API credentials from environment if set
    pub fn apply_env(&mut self) {
        if let Ok(app_key) = std::env::var("LONGPORT_APP_KEY") {
            self.market_data.app_key = Some(app_key);
        }
        if let Ok(app_secret) = std::env::var("LONGPORT_APP_SECRET") {
            self.market_data.app_secret = Some(app_secret);
        }
        if let Ok(token) = std::env::var("LONGPORT_ACCESS_TOKEN") {
            self.market_data.access_token = Some(token);
        }
        if let Ok(sendkey) = std::env::var("SCKEY") {
            if !sendkey.trim().is_empty() {
                self.notifier.sendkey = Some(sendkey);
            }
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.monitor.symbol.trim().is_empty() {
            bail!("monitor.symbol must not be empty");
        }
        self.triggers.validate()?;
        if let Some(fallback) = self.monitor.breadth_fallback_pct {
            if !(0.0..=100.0).contains(&fallback) {
                bail!("monitor.breadth_fallback_pct must be within [0, 100], got {}", fallback);
            }
        }
        if self.market_data.lookback_days < 2 {
            bail!("market_data.lookback_days must be at least 2");
        }
        for source in &self.breadth.sources {
            if source.url.trim().is_empty() {
                bail!("breadth source '{}' has an empty url", source.name);
            }
        }
        Ok(())
    }
}

/// Instrument and local file locations
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorConfig {
    pub symbol: String,
    pub state_path: PathBuf,
    /// CSV audit trail of triggered actions (optional)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub journal_path: Option<PathBuf>,
    pub log_dir: PathBuf,
    /// Breadth used when the breadth source fails. `None` makes the failure fatal.
    /// 20% sits above the third-buy threshold so a failure never fires it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub breadth_fallback_pct: Option<f64>,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        MonitorConfig {
            symbol: "RSP.US".to_string(),
            state_path: PathBuf::from("state/dca_monitor_state.json"),
            journal_path: None,
            log_dir: PathBuf::from("logs"),
            breadth_fallback_pct: Some(20.0),
        }
    }
}

/// How the third-Friday deadline is recognised
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThirdFridayRule {
    /// Only on the third calendar Friday itself
    #[default]
    Calendar,
    /// Third Friday, or the first reading after it when that Friday had no data
    CatchUp,
}

/// How the monthly cumulative decline is accumulated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeclineMode {
    /// Sum of negative daily changes over the month
    #[default]
    SumOfDeclines,
    /// Sum of negative daily changes, reset to zero by any up day
    ResetOnUpDay,
    /// Close versus the month's opening price
    FromMonthOpen,
}

/// Trigger thresholds, in percentage points
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TriggerConfig {
    pub first_dip_pct: f64,
    pub second_dip_cumulative_pct: f64,
    pub breadth_threshold_pct: f64,
    #[serde(default)]
    pub third_friday_rule: ThirdFridayRule,
    #[serde(default)]
    pub decline_mode: DeclineMode,
}

impl Default for TriggerConfig {
    fn default() -> Self {
        TriggerConfig {
            first_dip_pct: -1.0,
            second_dip_cumulative_pct: -5.0,
            breadth_threshold_pct: 15.0,
            third_friday_rule: ThirdFridayRule::Calendar,
            decline_mode: DeclineMode::SumOfDeclines,
        }
    }
}

impl TriggerConfig {
    pub fn validate(&self) -> Result<()> {
        if self.first_dip_pct >= 0.0 {
            bail!("triggers.first_dip_pct must be negative, got {}", self.first_dip_pct);
        }
        if self.second_dip_cumulative_pct >= 0.0 {
            bail!(
                "triggers.second_dip_cumulative_pct must be negative, got {}",
                self.second_dip_cumulative_pct
            );
        }
        if !(0.0..=100.0).contains(&self.breadth_threshold_pct) {
            bail!(
                "triggers.breadth_threshold_pct must be within [0, 100], got {}",
                self.breadth_threshold_pct
            );
        }
        Ok(())
    }
}

/// Brokerage quote API
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketDataConfig {
    pub base_url: String,
    /// Number of daily bars requested per fetch
    pub lookback_days: u32,
    pub timeout_secs: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub app_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub app_secret: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
}

impl Default for MarketDataConfig {
    fn default() -> Self {
        MarketDataConfig {
            base_url: "https://openapi.longportapp.com".to_string(),
            lookback_days: 10,
            timeout_secs: 30,
            app_key: None,
            app_secret: None,
            access_token: None,
        }
    }
}

/// Market breadth sources, tried in order until one yields a value
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BreadthConfig {
    pub sources: Vec<BreadthSourceConfig>,
    pub timeout_secs: u64,
}

impl Default for BreadthConfig {
    fn default() -> Self {
        BreadthConfig {
            sources: vec![
                BreadthSourceConfig {
                    name: "TheMarketMemo".to_string(),
                    url: "https://themarketmemo.com/marketbreadth/".to_string(),
                    date_param: None,
                    extract: BreadthExtract::HtmlText {
                        pattern: default_percent_pattern(),
                    },
                },
                BreadthSourceConfig {
                    name: "TradingView".to_string(),
                    url: "https://www.tradingview.com/markets/stocks-usa/market-movers-advance-decline/"
                        .to_string(),
                    date_param: None,
                    extract: BreadthExtract::Raw {
                        pattern: r#""advanceDecline":\s*(\d+(?:\.\d+)?)"#.to_string(),
                    },
                },
            ],
            timeout_secs: 15,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BreadthSourceConfig {
    pub name: String,
    pub url: String,
    /// Query parameter carrying the session date (`YYYY-MM-DD`), if the source takes one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_param: Option<String>,
    #[serde(flatten)]
    pub extract: BreadthExtract,
}

/// How the breadth percentage is read from a response body
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "extract", rename_all = "snake_case")]
pub enum BreadthExtract {
    /// JSON body, value at a JSON pointer
    JsonPointer { pointer: String },
    /// HTML page: markup, scripts and styles are stripped, then the first
    /// capture of `pattern` within [0, 100] wins
    HtmlText {
        #[serde(default = "default_percent_pattern")]
        pattern: String,
    },
    /// First capture of `pattern` within [0, 100] anywhere in the raw body
    Raw { pattern: String },
}

fn default_percent_pattern() -> String {
    r"(\d+(?:\.\d+)?)\s*%".to_string()
}

/// ServerChan push settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotifierConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sendkey: Option<String>,
    pub endpoint: String,
    pub timeout_secs: u64,
}

impl Default for NotifierConfig {
    fn default() -> Self {
        NotifierConfig {
            sendkey: None,
            endpoint: "https://sctapi.ftqq.com".to_string(),
            timeout_secs: 10,
        }
    }
}

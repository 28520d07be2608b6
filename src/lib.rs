//! DCA Monitor
//!
//! Once-per-day dip-buy monitor for a single ETF. Each run reads the previous
//! session's close and market breadth, advances a small monthly trigger state,
//! and pushes a notification when one of four buy conditions fires:
//!
//! 1. **First buy**: first daily decline of at least 1% this month
//! 2. **Deadline reminder**: third Friday arrives without a first buy
//! 3. **Second buy**: cumulative monthly decline reaches 5%
//! 4. **Third buy**: market breadth drops below 15% after the second buy
//!
//! ## Example
//! ```no_run
//! use dca_monitor::{Config, JsonStateStore, Runner, RunnerConfig};
//! use dca_monitor::market_data::{HttpBreadthSource, HttpMarketDataClient};
//! use dca_monitor::notifier::notifier_from_config;
//!
//! fn main() -> anyhow::Result<()> {
//!     let config = Config::from_env();
//!     let runner = Runner::new(
//!         RunnerConfig::from_config(&config, false),
//!         Box::new(HttpMarketDataClient::from_config(&config.market_data)?),
//!         Box::new(HttpBreadthSource::from_config(&config.breadth)?),
//!         Box::new(JsonStateStore::new(&config.monitor.state_path)),
//!         notifier_from_config(&config.notifier, false)?,
//!     );
//!     let report = runner.run(chrono::Local::now().date_naive())?;
//!     println!("{:?}", report.action);
//!     Ok(())
//! }
//! ```

pub mod calendar;
pub mod config;
pub mod error;
pub mod evaluator;
pub mod journal;
pub mod market_data;
pub mod notifier;
pub mod runner;
pub mod state_store;
pub mod types;

pub use config::Config;
pub use evaluator::{Evaluation, TriggerEvaluator};
pub use runner::{RunReport, Runner, RunnerConfig};
pub use state_store::{JsonStateStore, StateStore};
pub use types::*;

//! Market data: daily bars from the quote API and market breadth
//!
//! Both sources sit behind traits so the runner can be driven by fakes in tests.

mod auth;
mod breadth;
mod client;
mod types;

pub use auth::{sign_request, Credentials};
pub use breadth::{extract_breadth, extract_pattern, visible_text, HttpBreadthSource};
pub use client::HttpMarketDataClient;
pub use types::*;

use chrono::NaiveDate;

use crate::error::DataResult;

/// Source of end-of-day bars for a single instrument
pub trait MarketDataClient {
    /// Bar for `date` with the previous session's close.
    ///
    /// Returns `DataFetchError::Unavailable` when there was no session that day.
    fn daily_bar(&self, symbol: &str, date: NaiveDate) -> DataResult<DailyBar>;
}

/// Source of the market breadth percentage
pub trait BreadthSource {
    fn breadth_pct(&self, date: NaiveDate) -> DataResult<f64>;
}

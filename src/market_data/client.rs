//! Quote API client for daily candlesticks
//!
//! Blocking HTTP client: one signed request per run, no retry. A failed fetch
//! aborts the run and the next scheduled invocation tries again.

use anyhow::{Context, Result};
use chrono::{NaiveDate, Utc};
use reqwest::blocking::Client;
use std::time::Duration as StdDuration;
use tracing::{debug, info};

use super::auth::{sign_request, Credentials};
use super::types::{select_daily_bar, ApiResponse, CandlestickData, DailyBar};
use super::MarketDataClient;
use crate::config::MarketDataConfig;
use crate::error::{DataFetchError, DataResult};

const CANDLESTICKS_PATH: &str = "/v1/quote/candlesticks";

pub struct HttpMarketDataClient {
    client: Client,
    base_url: String,
    credentials: Credentials,
    lookback_days: u32,
}

impl HttpMarketDataClient {
    pub fn new(config: &MarketDataConfig, credentials: Credentials) -> Result<Self> {
        let client = Client::builder()
            .timeout(StdDuration::from_secs(config.timeout_secs))
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            credentials,
            lookback_days: config.lookback_days,
        })
    }

    /// Create from config; app key, secret and access token are all required
    pub fn from_config(config: &MarketDataConfig) -> Result<Self> {
        let credentials = Credentials::from_config(config).context(
            "Missing quote API credentials (LONGPORT_APP_KEY, LONGPORT_APP_SECRET, LONGPORT_ACCESS_TOKEN)",
        )?;
        Self::new(config, credentials)
    }

    fn fetch_candlesticks(&self, symbol: &str, count: u32) -> DataResult<CandlestickData> {
        let query = format!("symbol={}&period=day&count={}&adjust_type=0", symbol, count);
        let timestamp = Utc::now().timestamp();
        let signature = sign_request(
            "GET",
            CANDLESTICKS_PATH,
            &query,
            timestamp,
            &self.credentials.app_secret,
        );
        let url = format!("{}{}?{}", self.base_url, CANDLESTICKS_PATH, query);

        debug!("Fetching candlesticks: symbol={}, count={}", symbol, count);

        let response = self
            .client
            .get(&url)
            .header("X-Api-Key", &self.credentials.app_key)
            .header("Authorization", &self.credentials.access_token)
            .header("X-Timestamp", timestamp.to_string())
            .header("X-Api-Signature", signature)
            .send()?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(DataFetchError::Api {
                code: i64::from(status.as_u16()),
                message: body,
            });
        }

        let body: ApiResponse<CandlestickData> = response
            .json()
            .map_err(|e| DataFetchError::Parse(format!("candlestick response: {}", e)))?;
        body.into_data()
    }
}

impl MarketDataClient for HttpMarketDataClient {
    fn daily_bar(&self, symbol: &str, date: NaiveDate) -> DataResult<DailyBar> {
        let data = self.fetch_candlesticks(symbol, self.lookback_days)?;
        let bar = select_daily_bar(&data.candlesticks, symbol, date)?;

        info!(
            "{} {}: close {:.2}, prev close {:.2}, change {:+.2}%",
            symbol,
            bar.date,
            bar.close,
            bar.prev_close,
            bar.change_pct()
        );
        Ok(bar)
    }
}

//! Quote API types for daily candlesticks

use chrono::{DateTime, NaiveDate};
use serde::{Deserialize, Deserializer};

use crate::error::{DataFetchError, DataResult};
use crate::types::percent_change;

/// Response envelope: `{ "code": 0, "message": "", "data": {...} }`
#[derive(Debug, Deserialize)]
pub struct ApiResponse<T> {
    pub code: i64,
    #[serde(default)]
    pub message: String,
    pub data: Option<T>,
}

impl<T> ApiResponse<T> {
    pub fn into_data(self) -> DataResult<T> {
        if self.code != 0 {
            return Err(DataFetchError::Api {
                code: self.code,
                message: self.message,
            });
        }
        self.data
            .ok_or_else(|| DataFetchError::Parse("response has no data field".to_string()))
    }
}

#[derive(Debug, Deserialize)]
pub struct CandlestickData {
    #[serde(default)]
    pub candlesticks: Vec<Candlestick>,
}

/// Daily candlestick. Prices arrive as decimal strings or plain numbers.
#[derive(Debug, Clone, Deserialize)]
pub struct Candlestick {
    /// Unix seconds
    pub timestamp: i64,
    #[serde(deserialize_with = "de_price")]
    pub open: f64,
    #[serde(deserialize_with = "de_price")]
    pub high: f64,
    #[serde(deserialize_with = "de_price")]
    pub low: f64,
    #[serde(deserialize_with = "de_price")]
    pub close: f64,
    #[serde(default)]
    pub volume: i64,
}

impl Candlestick {
    pub fn date(&self) -> Option<NaiveDate> {
        DateTime::from_timestamp(self.timestamp, 0).map(|dt| dt.date_naive())
    }
}

fn de_price<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Num(f64),
        Str(String),
    }

    match Raw::deserialize(deserializer)? {
        Raw::Num(v) => Ok(v),
        Raw::Str(s) => s.trim().parse().map_err(serde::de::Error::custom),
    }
}

/// One trading day with the previous session's close
#[derive(Debug, Clone, PartialEq)]
pub struct DailyBar {
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub prev_close: f64,
}

impl DailyBar {
    pub fn change_pct(&self) -> f64 {
        percent_change(self.prev_close, self.close)
    }
}

/// Pick the bar for `date` out of a window of candles, paired with the close
/// of the session before it.
pub fn select_daily_bar(candles: &[Candlestick], symbol: &str, date: NaiveDate) -> DataResult<DailyBar> {
    let mut dated: Vec<(NaiveDate, &Candlestick)> = candles
        .iter()
        .filter_map(|c| c.date().map(|d| (d, c)))
        .collect();
    dated.sort_by_key(|(d, _)| *d);
    dated.dedup_by_key(|(d, _)| *d);

    let unavailable = || DataFetchError::Unavailable {
        symbol: symbol.to_string(),
        date,
    };

    let idx = dated.iter().position(|(d, _)| *d == date).ok_or_else(unavailable)?;
    if idx == 0 {
        return Err(unavailable());
    }

    let (_, bar) = dated[idx];
    let (_, prev) = dated[idx - 1];

    if bar.close <= 0.0 || prev.close <= 0.0 {
        return Err(DataFetchError::Parse(format!(
            "non-positive close for {} around {}",
            symbol, date
        )));
    }

    Ok(DailyBar {
        date,
        open: bar.open,
        high: bar.high,
        low: bar.low,
        close: bar.close,
        prev_close: prev.close,
    })
}

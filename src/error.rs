//! Error types for the monitor
//!
//! Each external collaborator gets its own error enum so the runner can decide
//! what is fatal: data fetch aborts the run, notify and state errors are logged.

use chrono::NaiveDate;
use thiserror::Error;

use crate::types::MonthKey;

#[derive(Debug, Error)]
pub enum DataFetchError {
    #[error("no market data for {symbol} on {date}")]
    Unavailable { symbol: String, date: NaiveDate },

    #[error("network error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error {code}: {message}")]
    Api { code: i64, message: String },

    #[error("parse error: {0}")]
    Parse(String),

    #[error("invalid breadth value: {0}")]
    InvalidBreadth(String),

    #[error("no breadth source succeeded: {0}")]
    BreadthUnavailable(String),
}

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("notifier is not configured")]
    NotConfigured,

    #[error("network error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("notification rejected ({code}): {message}")]
    Rejected { code: i64, message: String },
}

#[derive(Debug, Error)]
pub enum StateIoError {
    #[error("state file IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("state file JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("unsupported state schema version {found} (max supported {supported})")]
    UnsupportedSchema { found: u32, supported: u32 },
}

/// Unrecovered failure of a single monitoring run
#[derive(Debug, Error)]
pub enum RunError {
    #[error("market data fetch failed: {0}")]
    DataFetch(#[from] DataFetchError),

    #[error("notification failed: {0}")]
    Notify(#[from] NotifyError),

    #[error("reading month {reading} is older than stored month {stored}")]
    StaleMonth { reading: MonthKey, stored: MonthKey },
}

impl RunError {
    /// Process exit code reported to the scheduler
    pub fn exit_code(&self) -> i32 {
        match self {
            RunError::DataFetch(_) => 2,
            RunError::Notify(_) => 3,
            RunError::StaleMonth { .. } => 1,
        }
    }
}

pub type DataResult<T> = Result<T, DataFetchError>;
pub type NotifyResult<T> = Result<T, NotifyError>;
pub type StateResult<T> = Result<T, StateIoError>;

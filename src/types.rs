//! Core domain types for the DCA monitor
//!
//! Month keys, daily readings, trigger actions and the monthly trigger state
//! that is persisted between runs.

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use crate::calendar;

/// Calendar month identifier, rendered as `YYYY-MM`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MonthKey {
    pub year: i32,
    pub month: u32,
}

impl MonthKey {
    pub fn new(year: i32, month: u32) -> Self {
        Self { year, month }
    }

    pub fn from_date(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }

    /// Third-Friday deadline for the first buy of this month
    pub fn third_friday(&self) -> Option<NaiveDate> {
        calendar::third_friday(self.year, self.month)
    }
}

impl fmt::Display for MonthKey {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

impl FromStr for MonthKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (year, month) = s
            .trim()
            .split_once('-')
            .ok_or_else(|| format!("invalid month key '{}', expected YYYY-MM", s))?;
        let year: i32 = year
            .parse()
            .map_err(|_| format!("invalid year in month key '{}'", s))?;
        let month: u32 = month
            .parse()
            .map_err(|_| format!("invalid month in month key '{}'", s))?;
        if !(1..=12).contains(&month) {
            return Err(format!("month out of range in month key '{}'", s));
        }
        Ok(Self { year, month })
    }
}

impl Serialize for MonthKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for MonthKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// One day of market data as seen by the trigger evaluator.
///
/// Percentages are in percentage points: `-1.2` means a 1.2% decline.
#[derive(Debug, Clone, PartialEq)]
pub struct DailyReading {
    pub date: NaiveDate,
    pub open: f64,
    pub close: f64,
    pub prev_close: f64,
    pub change_pct: f64,
    pub breadth_pct: f64,
    pub is_third_friday: bool,
}

impl DailyReading {
    pub fn month_key(&self) -> MonthKey {
        MonthKey::from_date(self.date)
    }
}

/// Percent change between two closes, in percentage points
pub fn percent_change(prev_close: f64, close: f64) -> f64 {
    if prev_close <= 0.0 {
        return 0.0;
    }
    (close - prev_close) / prev_close * 100.0
}

/// Buy signal emitted by the trigger evaluator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    /// Condition 1: first daily dip of the month
    FirstBuy,
    /// Condition 2: third-Friday fallback when no dip happened yet
    DeadlineReminder,
    /// Condition 3: cumulative monthly decline reached
    SecondBuy,
    /// Condition 4: market breadth collapsed after the second buy
    ThirdBuy,
}

impl Action {
    pub fn label(&self) -> &'static str {
        match self {
            Action::FirstBuy => "first buy",
            Action::DeadlineReminder => "first buy (deadline)",
            Action::SecondBuy => "second buy",
            Action::ThirdBuy => "third buy",
        }
    }
}

/// Progress through the four trigger conditions for one calendar month.
///
/// New fields must carry `#[serde(default)]` so older state files keep loading.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthlyState {
    pub month_key: MonthKey,
    #[serde(default)]
    pub condition1_fired: bool,
    /// Running monthly decline in percentage points, always <= 0
    #[serde(default)]
    pub cumulative_decline_pct: f64,
    #[serde(default)]
    pub condition3_fired: bool,
    #[serde(default)]
    pub condition4_fired: bool,
    /// Only used by the catch-up third-Friday rule
    #[serde(default)]
    pub deadline_reminded: bool,
    /// Month opening price, only used when measuring decline from the month open
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub month_anchor_price: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_reading_date: Option<NaiveDate>,
}

impl MonthlyState {
    /// Initial all-false/zero state for a month
    pub fn new(month_key: MonthKey) -> Self {
        Self {
            month_key,
            condition1_fired: false,
            cumulative_decline_pct: 0.0,
            condition3_fired: false,
            condition4_fired: false,
            deadline_reminded: false,
            month_anchor_price: None,
            last_reading_date: None,
        }
    }

    pub fn is_initial(&self) -> bool {
        *self == Self::new(self.month_key)
    }

    /// Progress against the month's third-Friday deadline
    pub fn deadline_status(&self) -> Option<DeadlineStatus> {
        let deadline = self.month_key.third_friday()?;
        let status = if self.condition1_fired {
            DeadlineStatus::Met(deadline)
        } else if self.deadline_reminded || self.last_reading_date.is_some_and(|d| d >= deadline) {
            DeadlineStatus::Reached(deadline)
        } else {
            DeadlineStatus::Pending(deadline)
        };
        Some(status)
    }
}

/// First-buy deadline state for a month
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeadlineStatus {
    /// First buy already fired
    Met(NaiveDate),
    /// Deadline reached without a first buy
    Reached(NaiveDate),
    Pending(NaiveDate),
}

impl fmt::Display for DeadlineStatus {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            DeadlineStatus::Met(d) => write!(f, "{} (first buy done)", d),
            DeadlineStatus::Reached(d) => write!(f, "{} (reached, no first buy)", d),
            DeadlineStatus::Pending(d) => write!(f, "{} (pending)", d),
        }
    }
}

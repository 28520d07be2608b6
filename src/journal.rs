//! CSV audit trail of triggered actions

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::types::{Action, DailyReading, MonthKey, MonthlyState};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JournalEntry {
    pub recorded_at: DateTime<Utc>,
    pub reading_date: NaiveDate,
    pub month: MonthKey,
    pub action: Action,
    pub close: f64,
    pub change_pct: f64,
    pub cumulative_decline_pct: f64,
    pub breadth_pct: f64,
    pub notified: bool,
}

impl JournalEntry {
    pub fn new(action: Action, reading: &DailyReading, state: &MonthlyState, notified: bool) -> Self {
        Self {
            recorded_at: Utc::now(),
            reading_date: reading.date,
            month: state.month_key,
            action,
            close: reading.close,
            change_pct: reading.change_pct,
            cumulative_decline_pct: state.cumulative_decline_pct,
            breadth_pct: reading.breadth_pct,
            notified,
        }
    }
}

#[derive(Debug, Clone)]
pub struct TriggerJournal {
    path: PathBuf,
}

impl TriggerJournal {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn append(&self, entry: &JournalEntry) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .with_context(|| format!("Failed to open journal: {}", self.path.display()))?;
        let write_header = file.metadata()?.len() == 0;

        let mut writer = csv::WriterBuilder::new()
            .has_headers(write_header)
            .from_writer(file);
        writer.serialize(entry)?;
        writer.flush()?;

        debug!("Journal entry appended: {} {}", entry.reading_date, entry.action.label());
        Ok(())
    }

    pub fn read_all(&self) -> Result<Vec<JournalEntry>> {
        let mut reader = csv::Reader::from_path(&self.path)
            .with_context(|| format!("Failed to open journal: {}", self.path.display()))?;
        let entries = reader
            .deserialize()
            .collect::<Result<Vec<JournalEntry>, _>>()
            .context("Failed to parse journal")?;
        Ok(entries)
    }
}

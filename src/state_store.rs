// State Store for the monthly trigger record
// Single JSON file with a versioned envelope
//
// The file is read once and overwritten once per run. Writes go through a
// temp file + rename so an interrupted run never leaves a truncated record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::error::{StateIoError, StateResult};
use crate::types::{MonthKey, MonthlyState};

/// Current on-disk schema version
pub const STATE_SCHEMA_VERSION: u32 = 1;

// =============================================================================
// Store Trait
// =============================================================================

pub trait StateStore {
    /// Load the state for `month`, or the initial state if none is stored for it
    fn load(&self, month: MonthKey) -> StateResult<MonthlyState>;

    fn save(&self, state: &MonthlyState) -> StateResult<()>;

    /// Month of the stored record, if one exists
    fn stored_month(&self) -> StateResult<Option<MonthKey>>;
}

// =============================================================================
// Data Model
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateRecord {
    pub schema_version: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
    pub state: MonthlyState,
}

// =============================================================================
// JSON File Store
// =============================================================================

#[derive(Debug, Clone)]
pub struct JsonStateStore {
    path: PathBuf,
}

impl JsonStateStore {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the stored record as-is, without month filtering
    pub fn peek(&self) -> StateResult<Option<StateRecord>> {
        if !self.path.exists() {
            return Ok(None);
        }

        let contents = fs::read_to_string(&self.path)?;
        let record: StateRecord = serde_json::from_str(&contents)?;

        if record.schema_version > STATE_SCHEMA_VERSION {
            return Err(StateIoError::UnsupportedSchema {
                found: record.schema_version,
                supported: STATE_SCHEMA_VERSION,
            });
        }

        Ok(Some(record))
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "state.json".into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

impl StateStore for JsonStateStore {
    fn load(&self, month: MonthKey) -> StateResult<MonthlyState> {
        match self.peek()? {
            None => {
                info!("No state file at {}, starting fresh for {}", self.path.display(), month);
                Ok(MonthlyState::new(month))
            }
            Some(record) if record.state.month_key != month => {
                info!(
                    "Stored state is for {}, starting fresh for {}",
                    record.state.month_key, month
                );
                Ok(MonthlyState::new(month))
            }
            Some(record) => {
                debug!("Loaded state for {} from {}", month, self.path.display());
                Ok(record.state)
            }
        }
    }

    fn save(&self, state: &MonthlyState) -> StateResult<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let record = StateRecord {
            schema_version: STATE_SCHEMA_VERSION,
            updated_at: Some(Utc::now()),
            state: state.clone(),
        };

        let tmp = self.temp_path();
        fs::write(&tmp, serde_json::to_string_pretty(&record)?)?;
        fs::rename(&tmp, &self.path)?;

        debug!("State saved to: {}", self.path.display());
        Ok(())
    }

    fn stored_month(&self) -> StateResult<Option<MonthKey>> {
        Ok(self.peek()?.map(|record| record.state.month_key))
    }
}

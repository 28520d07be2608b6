//! Single monitoring pass
//!
//! fetch bar + breadth -> load state -> evaluate -> notify -> journal -> save
//!
//! Failure handling:
//! - a reading from a month older than the stored record is refused
//! - data fetch failure aborts before any state is touched
//! - notify failure is logged, state is still saved, the run reports failure
//! - state load failure falls back to the initial state
//! - state save and journal failures are warnings

use chrono::NaiveDate;
use tracing::{error, info, warn};

use crate::calendar;
use crate::config::{Config, TriggerConfig};
use crate::error::{NotifyError, RunError};
use crate::evaluator::TriggerEvaluator;
use crate::journal::{JournalEntry, TriggerJournal};
use crate::market_data::{BreadthSource, MarketDataClient};
use crate::notifier::{render_message, Notifier};
use crate::state_store::StateStore;
use crate::types::{Action, DailyReading, MonthKey, MonthlyState};

/// Everything the runner needs besides its collaborators
#[derive(Debug, Clone)]
pub struct RunnerConfig {
    pub symbol: String,
    pub triggers: TriggerConfig,
    pub breadth_fallback_pct: Option<f64>,
    /// Evaluate and print, but do not persist state
    pub dry_run: bool,
}

impl RunnerConfig {
    pub fn from_config(config: &Config, dry_run: bool) -> Self {
        Self {
            symbol: config.monitor.symbol.clone(),
            triggers: config.triggers.clone(),
            breadth_fallback_pct: config.monitor.breadth_fallback_pct,
            dry_run,
        }
    }
}

/// Outcome of a completed run
#[derive(Debug, Clone)]
pub struct RunReport {
    pub reading: DailyReading,
    pub action: Option<Action>,
    pub state: MonthlyState,
    pub notified: bool,
    pub state_saved: bool,
}

pub struct Runner {
    config: RunnerConfig,
    evaluator: TriggerEvaluator,
    market_data: Box<dyn MarketDataClient>,
    breadth: Box<dyn BreadthSource>,
    store: Box<dyn StateStore>,
    notifier: Box<dyn Notifier>,
    journal: Option<TriggerJournal>,
}

impl Runner {
    pub fn new(
        config: RunnerConfig,
        market_data: Box<dyn MarketDataClient>,
        breadth: Box<dyn BreadthSource>,
        store: Box<dyn StateStore>,
        notifier: Box<dyn Notifier>,
    ) -> Self {
        let evaluator = TriggerEvaluator::new(config.triggers.clone());
        Self {
            config,
            evaluator,
            market_data,
            breadth,
            store,
            notifier,
            journal: None,
        }
    }

    pub fn with_journal(mut self, journal: TriggerJournal) -> Self {
        self.journal = Some(journal);
        self
    }

    /// Scheduled entrypoint: evaluate the previous business day's data
    pub fn run(&self, run_date: NaiveDate) -> Result<RunReport, RunError> {
        let reading_date = calendar::previous_business_day(run_date);
        info!("Run date {}, evaluating session {}", run_date, reading_date);
        self.run_for(reading_date)
    }

    /// Evaluate the session on `reading_date`
    pub fn run_for(&self, reading_date: NaiveDate) -> Result<RunReport, RunError> {
        let month = MonthKey::from_date(reading_date);
        if let Ok(Some(stored)) = self.store.stored_month() {
            if stored > month {
                warn!(
                    "Stored state is for {}, refusing to evaluate {} from older month {}",
                    stored, reading_date, month
                );
                return Err(RunError::StaleMonth {
                    reading: month,
                    stored,
                });
            }
        }

        let reading = self.fetch_reading(reading_date)?;

        let current = match self.store.load(month) {
            Ok(state) => state,
            Err(e) => {
                warn!("Failed to load state, starting from initial state for {}: {}", month, e);
                MonthlyState::new(month)
            }
        };

        let evaluation = self.evaluator.evaluate(&reading, &current);
        let state = evaluation.state;
        let action = evaluation.action;

        info!(
            "{} {}: change {:+.2}%, month decline {:.2}%, breadth {:.1}%",
            self.config.symbol,
            reading.date,
            reading.change_pct,
            state.cumulative_decline_pct,
            reading.breadth_pct
        );

        let mut notify_error: Option<NotifyError> = None;
        let mut notified = false;

        if let Some(action) = action {
            info!("Trigger fired: {}", action.label());
            let message = render_message(&self.config.symbol, action, &reading, &state);
            match self.notifier.send(&message) {
                Ok(()) => notified = true,
                Err(e) => {
                    error!(
                        "Failed to deliver {} notification for {}: {}",
                        action.label(),
                        reading.date,
                        e
                    );
                    notify_error = Some(e);
                }
            }

            if let Some(journal) = &self.journal {
                if !self.config.dry_run {
                    let entry = JournalEntry::new(action, &reading, &state, notified);
                    if let Err(e) = journal.append(&entry) {
                        warn!("Failed to append trigger journal: {:#}", e);
                    }
                }
            }
        } else {
            info!("No trigger for {}", reading.date);
        }

        let state_saved = if self.config.dry_run {
            info!("Dry run, state not saved");
            false
        } else {
            match self.store.save(&state) {
                Ok(()) => true,
                Err(e) => {
                    warn!("Failed to save state for {}: {}", state.month_key, e);
                    false
                }
            }
        };

        if let Some(e) = notify_error {
            return Err(RunError::Notify(e));
        }

        Ok(RunReport {
            reading,
            action,
            state,
            notified,
            state_saved,
        })
    }

    fn fetch_reading(&self, date: NaiveDate) -> Result<DailyReading, RunError> {
        let bar = self
            .market_data
            .daily_bar(&self.config.symbol, date)
            .map_err(|e| {
                error!("Failed to fetch {} bar for {}: {}", self.config.symbol, date, e);
                e
            })?;

        let breadth_pct = match self.breadth.breadth_pct(date) {
            Ok(value) => value,
            Err(e) => match self.config.breadth_fallback_pct {
                Some(fallback) => {
                    warn!("Failed to fetch market breadth, using fallback {:.1}%: {}", fallback, e);
                    fallback
                }
                None => {
                    error!("Failed to fetch market breadth for {}: {}", date, e);
                    return Err(e.into());
                }
            },
        };

        Ok(DailyReading {
            date: bar.date,
            open: bar.open,
            close: bar.close,
            prev_close: bar.prev_close,
            change_pct: bar.change_pct(),
            breadth_pct,
            is_third_friday: calendar::is_third_friday(bar.date),
        })
    }
}

//! Trigger evaluator
//!
//! Pure mapping from (daily reading, monthly state) to (new state, optional
//! action). No IO, no clock: everything the decision needs is in the inputs.
//!
//! Decision order, first match wins:
//! 1. First buy: no first buy yet and the day fell by at least `first_dip_pct`
//! 2. Deadline reminder: no first buy yet and the third-Friday deadline applies
//! 3. Second buy: first buy done and the monthly decline reached
//!    `second_dip_cumulative_pct`
//! 4. Third buy: second buy done and breadth strictly below `breadth_threshold_pct`

use tracing::debug;

use crate::config::{DeclineMode, ThirdFridayRule, TriggerConfig};
use crate::types::{Action, DailyReading, MonthlyState};

/// Result of evaluating one reading
#[derive(Debug, Clone, PartialEq)]
pub struct Evaluation {
    pub state: MonthlyState,
    pub action: Option<Action>,
}

#[derive(Debug, Clone, Default)]
pub struct TriggerEvaluator {
    config: TriggerConfig,
}

impl TriggerEvaluator {
    pub fn new(config: TriggerConfig) -> Self {
        TriggerEvaluator { config }
    }

    pub fn evaluate(&self, reading: &DailyReading, current: &MonthlyState) -> Evaluation {
        let month = reading.month_key();
        let mut state = if current.month_key != month {
            debug!("Month rollover {} -> {}, resetting state", current.month_key, month);
            MonthlyState::new(month)
        } else {
            current.clone()
        };

        if let Some(last) = state.last_reading_date {
            if reading.date <= last {
                debug!("Reading for {} already applied (last {}), skipping", reading.date, last);
                return Evaluation { state, action: None };
            }
        }

        self.accumulate(&mut state, reading);
        state.last_reading_date = Some(reading.date);

        let action = self.decide(&mut state, reading);
        Evaluation { state, action }
    }

    fn accumulate(&self, state: &mut MonthlyState, reading: &DailyReading) {
        match self.config.decline_mode {
            DeclineMode::SumOfDeclines => {
                state.cumulative_decline_pct += reading.change_pct.min(0.0);
            }
            DeclineMode::ResetOnUpDay => {
                if reading.change_pct > 0.0 {
                    state.cumulative_decline_pct = 0.0;
                } else {
                    state.cumulative_decline_pct += reading.change_pct;
                }
            }
            DeclineMode::FromMonthOpen => {
                let anchor = *state.month_anchor_price.get_or_insert(reading.open);
                state.cumulative_decline_pct = if anchor > 0.0 {
                    ((reading.close - anchor) / anchor * 100.0).min(0.0)
                } else {
                    0.0
                };
            }
        }
    }

    fn deadline_applies(&self, state: &MonthlyState, reading: &DailyReading) -> bool {
        match self.config.third_friday_rule {
            ThirdFridayRule::Calendar => reading.is_third_friday,
            ThirdFridayRule::CatchUp => {
                if state.deadline_reminded {
                    return false;
                }
                let deadline = state.month_key.third_friday();
                reading.is_third_friday || deadline.is_some_and(|d| reading.date > d)
            }
        }
    }

    fn decide(&self, state: &mut MonthlyState, reading: &DailyReading) -> Option<Action> {
        let cfg = &self.config;

        if !state.condition1_fired && reading.change_pct <= cfg.first_dip_pct {
            state.condition1_fired = true;
            return Some(Action::FirstBuy);
        }

        if !state.condition1_fired && self.deadline_applies(state, reading) {
            if cfg.third_friday_rule == ThirdFridayRule::CatchUp {
                state.deadline_reminded = true;
            }
            return Some(Action::DeadlineReminder);
        }

        if state.condition1_fired
            && !state.condition3_fired
            && state.cumulative_decline_pct <= cfg.second_dip_cumulative_pct
        {
            state.condition3_fired = true;
            return Some(Action::SecondBuy);
        }

        if state.condition3_fired
            && !state.condition4_fired
            && reading.breadth_pct < cfg.breadth_threshold_pct
        {
            state.condition4_fired = true;
            return Some(Action::ThirdBuy);
        }

        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calendar;
    use crate::types::{percent_change, MonthKey};
    use approx::assert_relative_eq;
    use chrono::NaiveDate;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn reading(date: NaiveDate, change_pct: f64, breadth_pct: f64) -> DailyReading {
        let prev_close = 100.0;
        let close = prev_close * (1.0 + change_pct / 100.0);
        DailyReading {
            date,
            open: prev_close,
            close,
            prev_close,
            change_pct,
            breadth_pct,
            is_third_friday: calendar::is_third_friday(date),
        }
    }

    fn run_days(
        evaluator: &TriggerEvaluator,
        start: MonthlyState,
        days: &[DailyReading],
    ) -> (MonthlyState, Vec<Option<Action>>) {
        let mut state = start;
        let mut actions = Vec::new();
        for r in days {
            let eval = evaluator.evaluate(r, &state);
            state = eval.state;
            actions.push(eval.action);
        }
        (state, actions)
    }

    #[test]
    fn test_first_dip_fires_once_per_month() {
        let ev = TriggerEvaluator::default();
        let start = MonthlyState::new(MonthKey::new(2025, 4));

        let (state, actions) = run_days(
            &ev,
            start,
            &[reading(d(2025, 4, 1), -1.2, 30.0), reading(d(2025, 4, 2), -1.5, 30.0)],
        );

        assert_eq!(actions, vec![Some(Action::FirstBuy), None]);
        assert!(state.condition1_fired);
        assert_relative_eq!(state.cumulative_decline_pct, -2.7, epsilon = 1e-9);
    }

    #[test]
    fn test_exactly_one_percent_triggers_first_buy() {
        let ev = TriggerEvaluator::default();
        let eval = ev.evaluate(
            &reading(d(2025, 4, 1), -1.0, 30.0),
            &MonthlyState::new(MonthKey::new(2025, 4)),
        );
        assert_eq!(eval.action, Some(Action::FirstBuy));
    }

    #[test]
    fn test_deadline_reminder_on_third_friday_without_dip() {
        let ev = TriggerEvaluator::default();
        let state = MonthlyState::new(MonthKey::new(2025, 4));

        let eval = ev.evaluate(&reading(d(2025, 4, 18), -0.3, 30.0), &state);
        assert_eq!(eval.action, Some(Action::DeadlineReminder));
        assert!(!eval.state.condition1_fired);
        assert!(!eval.state.deadline_reminded);

        // A non-deadline Friday does nothing
        let eval = ev.evaluate(&reading(d(2025, 4, 11), -0.3, 30.0), &state);
        assert_eq!(eval.action, None);
    }

    #[test]
    fn test_dip_on_third_friday_is_first_buy() {
        let ev = TriggerEvaluator::default();
        let state = MonthlyState::new(MonthKey::new(2025, 4));
        let eval = ev.evaluate(&reading(d(2025, 4, 18), -2.0, 30.0), &state);
        assert_eq!(eval.action, Some(Action::FirstBuy));
    }

    #[test]
    fn test_no_deadline_after_first_buy() {
        let ev = TriggerEvaluator::default();
        let mut state = MonthlyState::new(MonthKey::new(2025, 4));
        state.condition1_fired = true;

        let eval = ev.evaluate(&reading(d(2025, 4, 18), 0.4, 30.0), &state);
        assert_eq!(eval.action, None);
    }

    #[test]
    fn test_second_buy_requires_first_buy() {
        let ev = TriggerEvaluator::default();
        let mut state = MonthlyState::new(MonthKey::new(2025, 4));
        // Declines that never reach the first-dip threshold
        state.cumulative_decline_pct = -4.8;
        state.last_reading_date = Some(d(2025, 4, 8));

        let eval = ev.evaluate(&reading(d(2025, 4, 9), -0.9, 30.0), &state);
        assert_relative_eq!(eval.state.cumulative_decline_pct, -5.7, epsilon = 1e-9);
        assert_eq!(eval.action, None);
        assert!(!eval.state.condition3_fired);
    }

    #[test]
    fn test_first_buy_wins_over_second_buy_same_day() {
        let ev = TriggerEvaluator::default();
        let state = MonthlyState::new(MonthKey::new(2025, 4));

        let (state, actions) = run_days(
            &ev,
            state,
            &[reading(d(2025, 4, 3), -6.0, 12.0), reading(d(2025, 4, 4), -0.2, 12.0)],
        );

        assert_eq!(actions, vec![Some(Action::FirstBuy), Some(Action::SecondBuy)]);
        assert!(state.condition3_fired);
        assert!(!state.condition4_fired);
    }

    #[test]
    fn test_third_buy_threshold_is_strict() {
        let ev = TriggerEvaluator::default();
        let mut state = MonthlyState::new(MonthKey::new(2025, 4));
        state.condition1_fired = true;
        state.condition3_fired = true;
        state.cumulative_decline_pct = -6.0;

        let eval = ev.evaluate(&reading(d(2025, 4, 9), 0.5, 15.0), &state);
        assert_eq!(eval.action, None);

        let eval = ev.evaluate(&reading(d(2025, 4, 9), 0.5, 14.9), &state);
        assert_eq!(eval.action, Some(Action::ThirdBuy));
        assert!(eval.state.condition4_fired);

        // Not repeated on the following low-breadth day
        let eval = ev.evaluate(&reading(d(2025, 4, 10), 0.5, 10.0), &eval.state);
        assert_eq!(eval.action, None);
    }

    #[test]
    fn test_third_buy_requires_second_buy() {
        let ev = TriggerEvaluator::default();
        let mut state = MonthlyState::new(MonthKey::new(2025, 4));
        state.condition1_fired = true;

        let eval = ev.evaluate(&reading(d(2025, 4, 9), 0.2, 5.0), &state);
        assert_eq!(eval.action, None);
    }

    #[test]
    fn test_month_rollover_resets_state() {
        let ev = TriggerEvaluator::default();
        let mut state = MonthlyState::new(MonthKey::new(2025, 3));
        state.condition1_fired = true;
        state.condition3_fired = true;
        state.condition4_fired = true;
        state.cumulative_decline_pct = -8.0;
        state.last_reading_date = Some(d(2025, 3, 31));

        let eval = ev.evaluate(&reading(d(2025, 4, 1), 0.3, 40.0), &state);
        assert_eq!(eval.state.month_key, MonthKey::new(2025, 4));
        assert!(!eval.state.condition1_fired);
        assert!(!eval.state.condition3_fired);
        assert!(!eval.state.condition4_fired);
        assert_eq!(eval.state.cumulative_decline_pct, 0.0);
        assert_eq!(eval.action, None);
    }

    #[test]
    fn test_rollover_then_dip_fires_first_buy_again() {
        let ev = TriggerEvaluator::default();
        let mut state = MonthlyState::new(MonthKey::new(2025, 3));
        state.condition1_fired = true;

        let eval = ev.evaluate(&reading(d(2025, 4, 1), -1.1, 40.0), &state);
        assert_eq!(eval.action, Some(Action::FirstBuy));
    }

    #[test]
    fn test_repeated_reading_date_is_ignored() {
        let ev = TriggerEvaluator::default();
        let state = MonthlyState::new(MonthKey::new(2025, 4));
        let r = reading(d(2025, 4, 2), -0.5, 30.0);

        let first = ev.evaluate(&r, &state);
        let second = ev.evaluate(&r, &first.state);
        assert_eq!(second.state, first.state);
        assert_eq!(second.action, None);
        assert_relative_eq!(second.state.cumulative_decline_pct, -0.5, epsilon = 1e-9);
    }

    #[test]
    fn test_up_days_do_not_reduce_sum_of_declines() {
        let ev = TriggerEvaluator::default();
        let (state, _) = run_days(
            &ev,
            MonthlyState::new(MonthKey::new(2025, 4)),
            &[
                reading(d(2025, 4, 1), -0.5, 30.0),
                reading(d(2025, 4, 2), 2.0, 30.0),
                reading(d(2025, 4, 3), -0.4, 30.0),
            ],
        );
        assert_relative_eq!(state.cumulative_decline_pct, -0.9, epsilon = 1e-9);
    }

    #[test]
    fn test_reset_on_up_day_mode() {
        let ev = TriggerEvaluator::new(TriggerConfig {
            decline_mode: DeclineMode::ResetOnUpDay,
            ..TriggerConfig::default()
        });
        let (state, _) = run_days(
            &ev,
            MonthlyState::new(MonthKey::new(2025, 4)),
            &[
                reading(d(2025, 4, 1), -0.5, 30.0),
                reading(d(2025, 4, 2), 0.1, 30.0),
                reading(d(2025, 4, 3), -0.4, 30.0),
            ],
        );
        assert_relative_eq!(state.cumulative_decline_pct, -0.4, epsilon = 1e-9);
    }

    #[test]
    fn test_from_month_open_mode() {
        let ev = TriggerEvaluator::new(TriggerConfig {
            decline_mode: DeclineMode::FromMonthOpen,
            ..TriggerConfig::default()
        });
        let first = DailyReading {
            date: d(2025, 4, 1),
            open: 200.0,
            close: 197.0,
            prev_close: 199.0,
            change_pct: percent_change(199.0, 197.0),
            breadth_pct: 30.0,
            is_third_friday: false,
        };
        let later = DailyReading {
            date: d(2025, 4, 7),
            open: 189.0,
            close: 188.0,
            prev_close: 192.0,
            change_pct: percent_change(192.0, 188.0),
            breadth_pct: 30.0,
            is_third_friday: false,
        };

        let (state, actions) = run_days(&ev, MonthlyState::new(MonthKey::new(2025, 4)), &[first, later]);
        assert_eq!(state.month_anchor_price, Some(200.0));
        assert_relative_eq!(state.cumulative_decline_pct, -6.0, epsilon = 1e-9);
        assert_eq!(actions, vec![Some(Action::FirstBuy), Some(Action::SecondBuy)]);
    }

    #[test]
    fn test_catch_up_rule_fires_after_missed_friday() {
        let ev = TriggerEvaluator::new(TriggerConfig {
            third_friday_rule: ThirdFridayRule::CatchUp,
            ..TriggerConfig::default()
        });
        // 2025-04-18 was Good Friday, no reading that day
        let (state, actions) = run_days(
            &ev,
            MonthlyState::new(MonthKey::new(2025, 4)),
            &[
                reading(d(2025, 4, 17), 0.1, 30.0),
                reading(d(2025, 4, 21), -0.2, 30.0),
                reading(d(2025, 4, 22), -0.2, 30.0),
            ],
        );
        assert_eq!(actions, vec![None, Some(Action::DeadlineReminder), None]);
        assert!(state.deadline_reminded);
    }

    #[test]
    fn test_calendar_rule_misses_holiday_friday() {
        let ev = TriggerEvaluator::default();
        let (_, actions) = run_days(
            &ev,
            MonthlyState::new(MonthKey::new(2025, 4)),
            &[reading(d(2025, 4, 17), 0.1, 30.0), reading(d(2025, 4, 21), -0.2, 30.0)],
        );
        assert_eq!(actions, vec![None, None]);
    }

    #[test]
    fn test_documented_month_scenario() {
        let ev = TriggerEvaluator::default();
        // May 2025: third Friday is the 16th
        let mut days = vec![reading(d(2025, 5, 1), -1.2, 30.0), reading(d(2025, 5, 2), -0.5, 30.0)];
        days.push(reading(d(2025, 5, 16), 0.0, 30.0));
        days.push(reading(d(2025, 5, 21), -3.4, 30.0));

        let (state, actions) = run_days(&ev, MonthlyState::new(MonthKey::new(2025, 5)), &days);

        assert_eq!(actions[0], Some(Action::FirstBuy));
        assert_eq!(actions[1], None);
        assert_eq!(actions[2], None);
        assert_eq!(actions[3], Some(Action::SecondBuy));
        assert_relative_eq!(state.cumulative_decline_pct, -5.1, epsilon = 1e-9);
        assert!(state.condition1_fired);
        assert!(state.condition3_fired);
    }
}

//! Run command implementation

use anyhow::{Context, Result};
use chrono::NaiveDate;
use dca_monitor::journal::TriggerJournal;
use dca_monitor::market_data::{HttpBreadthSource, HttpMarketDataClient};
use dca_monitor::notifier::notifier_from_config;
use dca_monitor::{Config, JsonStateStore, RunReport, Runner, RunnerConfig};
use tracing::{error, info, warn};

pub fn run(config: &Config, date: Option<String>, dry_run: bool) -> Result<u8> {
    let run_date = match date {
        Some(raw) => NaiveDate::parse_from_str(&raw, "%Y-%m-%d")
            .with_context(|| format!("Invalid --date '{}', expected YYYY-MM-DD", raw))?,
        None => chrono::Local::now().date_naive(),
    };

    info!("Starting DCA monitor run for {}", config.monitor.symbol);
    if dry_run {
        warn!("Dry run: notifications go to the console and state is not saved");
    }

    let market_data = HttpMarketDataClient::from_config(&config.market_data)?;
    let breadth = HttpBreadthSource::from_config(&config.breadth)?;
    let notifier = notifier_from_config(&config.notifier, dry_run)?;
    let store = JsonStateStore::new(&config.monitor.state_path);

    let mut runner = Runner::new(
        RunnerConfig::from_config(config, dry_run),
        Box::new(market_data),
        Box::new(breadth),
        Box::new(store),
        notifier,
    );
    if let Some(path) = &config.monitor.journal_path {
        runner = runner.with_journal(TriggerJournal::new(path));
    }

    match runner.run(run_date) {
        Ok(report) => {
            print_report(&config.monitor.symbol, &report);
            info!("DCA monitor run completed");
            Ok(0)
        }
        Err(e) => {
            error!("DCA monitor run failed: {}", e);
            Ok(e.exit_code() as u8)
        }
    }
}

fn mark(done: bool) -> &'static str {
    if done {
        "triggered"
    } else {
        "waiting"
    }
}

fn print_report(symbol: &str, report: &RunReport) {
    let r = &report.reading;
    let s = &report.state;

    println!("\n{}", "=".repeat(60));
    println!("{} MONITOR STATUS ({})", symbol, r.date);
    println!("{}", "=".repeat(60));
    println!("Close:              ${:.2}", r.close);
    println!("Daily change:       {:+.2}%", r.change_pct);
    println!("Month decline:      {:.2}%", s.cumulative_decline_pct);
    println!("Market breadth:     {:.1}%", r.breadth_pct);
    println!("Month:              {}", s.month_key);
    println!();
    println!("First buy:          {}", mark(s.condition1_fired));
    if let Some(deadline) = s.deadline_status() {
        println!("First buy deadline: {}", deadline);
    }
    println!("Second buy:         {}", mark(s.condition3_fired));
    println!("Third buy:          {}", mark(s.condition4_fired));
    println!();
    match report.action {
        Some(action) => println!(
            "Today's trigger:    {} ({})",
            action.label(),
            if report.notified { "notified" } else { "not delivered" }
        ),
        None => println!("Today's trigger:    none"),
    }
    if !report.state_saved {
        println!("State:              not saved");
    }
    println!("{}", "=".repeat(60));
}

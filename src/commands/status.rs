//! Status command implementation

use anyhow::Result;
use dca_monitor::{Config, JsonStateStore};
use tracing::info;

pub fn run(config: &Config) -> Result<u8> {
    let store = JsonStateStore::new(&config.monitor.state_path);
    info!("Reading state from: {}", store.path().display());

    let Some(record) = store.peek()? else {
        println!("No state recorded yet at {}", store.path().display());
        return Ok(0);
    };

    let s = &record.state;
    println!("\n{}", "=".repeat(60));
    println!("{} STORED STATE", config.monitor.symbol);
    println!("{}", "=".repeat(60));
    println!("Schema version:     {}", record.schema_version);
    if let Some(updated) = record.updated_at {
        println!("Updated at:         {}", updated.to_rfc3339());
    }
    println!("Month:              {}", s.month_key);
    println!("First buy fired:    {}", s.condition1_fired);
    println!("Month decline:      {:.2}%", s.cumulative_decline_pct);
    println!("Second buy fired:   {}", s.condition3_fired);
    println!("Third buy fired:    {}", s.condition4_fired);
    if let Some(deadline) = s.deadline_status() {
        println!("First buy deadline: {}", deadline);
    }
    if let Some(anchor) = s.month_anchor_price {
        println!("Month open:         ${:.2}", anchor);
    }
    match s.last_reading_date {
        Some(date) => println!("Last reading:       {}", date),
        None => println!("Last reading:       none"),
    }
    println!("{}", "=".repeat(60));

    Ok(0)
}

//! DCA monitor - main entry point
//!
//! This binary provides three subcommands:
//! - run: One monitoring pass over the previous session (scheduler entrypoint)
//! - status: Show the stored monthly trigger state
//! - test-notify: Send a test message through the configured notifier

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use dca_monitor::Config;

mod commands;

#[derive(Parser, Debug)]
#[command(name = "dca-monitor")]
#[command(about = "Daily dip-buy DCA monitor with monthly trigger state and push alerts", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to configuration file (defaults plus environment when omitted)
    #[arg(short, long, global = true)]
    config: Option<String>,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run one monitoring pass
    Run {
        /// Run date (YYYY-MM-DD); the previous business day is evaluated
        #[arg(long)]
        date: Option<String>,

        /// Evaluate and print without notifying or saving state
        #[arg(long)]
        dry_run: bool,
    },

    /// Show the stored monthly trigger state
    Status,

    /// Send a test notification
    TestNotify,
}

fn setup_logging(verbose: bool, command_name: &str, log_dir: &Path) -> Result<()> {
    std::fs::create_dir_all(log_dir)?;

    // Create log file with naming pattern: {command}_{date}.log
    let log_filename = format!(
        "{}_{}.log",
        command_name,
        chrono::Local::now().format("%Y-%m-%d_%H-%M-%S")
    );
    let log_path = PathBuf::from(log_dir).join(&log_filename);

    // Set log level - filter out noisy external crates
    let level = if verbose { "debug" } else { "info" };
    let filter_str = format!(
        "{},hyper=warn,hyper_util=warn,reqwest=warn,rustls=warn,h2=warn",
        level
    );
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&filter_str));

    let file_appender = tracing_appender::rolling::never(log_dir, &log_filename);

    let console_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_line_number(true)
        .with_file(true)
        .with_ansi(true);

    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(file_appender)
        .with_target(true)
        .with_line_number(true)
        .with_file(true)
        .with_ansi(false);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .with(file_layer)
        .init();

    info!("Log file: {}", log_path.display());
    Ok(())
}

fn load_config(path: Option<&str>) -> Result<Config> {
    let config = match path {
        Some(path) => Config::from_file(path)?,
        None => Config::from_env(),
    };
    config.validate()?;
    Ok(config)
}

fn main() -> ExitCode {
    dotenv::dotenv().ok();
    let cli = Cli::parse();

    let config = match load_config(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Configuration error: {:#}", e);
            return ExitCode::from(1);
        }
    };

    let command_name = match &cli.command {
        Commands::Run { .. } => "run",
        Commands::Status => "status",
        Commands::TestNotify => "test_notify",
    };

    if let Err(e) = setup_logging(cli.verbose, command_name, &config.monitor.log_dir) {
        eprintln!("Failed to initialize logging: {:#}", e);
        return ExitCode::from(1);
    }

    let code = match cli.command {
        Commands::Run { date, dry_run } => commands::run::run(&config, date, dry_run),
        Commands::Status => commands::status::run(&config),
        Commands::TestNotify => commands::test_notify::run(&config),
    };

    match code {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            error!("{:#}", e);
            ExitCode::from(1)
        }
    }
}

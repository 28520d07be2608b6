//! Subcommand implementations. Each returns the process exit code.

pub mod run;
pub mod status;
pub mod test_notify;

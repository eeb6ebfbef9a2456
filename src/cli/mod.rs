//! Command-line interface for the site agent.
//!
//! Provides commands for running the scheduler, watching claimed jobs, and
//! validating workflow definitions.

mod commands;

pub use commands::{parse_cli, run, run_with_cli, Cli, Commands};

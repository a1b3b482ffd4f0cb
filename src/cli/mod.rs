//! Command-line interface for subject-pool.
//!
//! Loads projects from a fixture file and runs one-shot status, sample and
//! readiness commands against them.

mod commands;

pub use commands::{parse_cli, run, run_with_cli, Cli, Commands};

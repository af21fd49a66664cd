//! The `prewarm` command line tool.
//!
//! Loads a [`Config`](config::Config), waits for the configured target to become ready, warms it
//! up with the configured request templates and prints a summary of the outcome.

pub mod cli;
pub mod config;
pub mod observability;
pub mod report;
pub mod warmup;

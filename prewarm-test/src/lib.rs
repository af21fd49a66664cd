//! Test utilities for prewarm.
//!
//! This crate provides utilities to facilitate testing of the warmup service and its transports.
//! See the modules for all available utilities.

pub mod server;
pub mod tracing;

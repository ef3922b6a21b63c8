//! CLI command implementations for herakles-freebsd-exporter.
//!
//! This module provides implementations for all CLI subcommands:
//! - `config`: Configuration file generation
//! - `test`: One-shot metrics collection
//! - `collectors`: Collector listing

pub mod collectors;
pub mod config;

// Re-export command functions
pub use collectors::command_collectors;
pub use config::command_config;
pub use test::command_test;

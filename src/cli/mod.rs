// src/cli/mod.rs
//! Command-line interface definitions
//!
//! Declares the clap command tree: start mining, benchmark a hash
//! algorithm, or generate a configuration template.

/// Command and option structs parsed by clap
pub mod commands;

// Re-export for easier access
pub use commands::{Action, BenchmarkOptions, Commands, ConfigOptions, StartOptions};

//! KAS Miner - solo CPU proof-of-work mining client in Rust
//!
//! This crate provides a complete implementation of a solo mining client with:
//! - A kHeavyHash-style algorithm behind a pluggable trait
//! - A parallel hashing engine with disjoint nonce partitioning
//! - A supervisor driving the job lifecycle against a full node
//! - Deterministic reward accounting (dev fee, capped owner allocation)
//! - Performance benchmarking

#![warn(missing_docs)]
#![forbid(unsafe_code)]

/// Miner core implementation including algorithms, engine and supervisor
pub mod miner;

/// Network communication components for the full-node connection
pub mod network;

/// Reward accounting and price oracle components
pub mod rewards;

/// Statistics collection and reporting functionality
pub mod stats;

/// Utility functions and error handling
pub mod utils;

/// Command-line interface definitions
pub mod cli;

/// Configuration management
pub mod config;

/// Shared type definitions
pub mod types;

// Core exports
pub use cli::Commands;
pub use config::Config;
pub use miner::{Algorithm, HashingEngine, JobSupervisor, MiningJob, Solution};
pub use network::{NodeClient, NodeConnector};
pub use rewards::{PriceOracle, RewardLedger};
pub use stats::{HardwareStats, MiningStats, StatsReporter};
pub use types::AlgorithmType;
pub use utils::{MinerError, init_logging};

// src/miner/mod.rs
//! Core mining functionality
//!
//! This module contains all components related to the mining process:
//! - Hash algorithm implementations behind a common trait
//! - The hashing engine and its worker pool
//! - The job lifecycle supervisor

/// Hash algorithm implementations
///
/// Contains the [`Algorithm`] trait and its implementations:
/// - kHeavyHash-style matrix-weighted Keccak (production)
/// - Plain Keccak-256 (benchmark baseline)
pub mod algorithm;

/// Hashing engine
///
/// Partitions the nonce space into disjoint per-worker ranges and
/// coordinates cooperative cancellation across the worker pool.
pub mod engine;

/// Worker search loop
///
/// Contains the per-range search logic that performs actual hash
/// computations and reports solutions, staleness and exhaustion.
pub mod worker;

/// Job lifecycle supervisor
///
/// Owns the current job, drives the node connection, and decides which
/// solutions may be submitted.
pub mod supervisor;

// Re-export main components for cleaner imports
pub use self::algorithm::Algorithm;
pub use self::engine::{
    EngineHandle, HashingEngine, MAX_NONCE, MiningJob, NonceRange, Solution, WorkerReport,
    partition_nonce_space,
};
pub use self::supervisor::{JobSnapshot, JobSupervisor, SupervisorConfig, SupervisorState};

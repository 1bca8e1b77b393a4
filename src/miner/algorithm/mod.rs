// src/miner/algorithm/mod.rs
//! Hash algorithm implementations
//!
//! This module contains all supported proof-of-work primitives and their
//! common interface. Currently implements:
//! - kHeavyHash-style matrix-weighted Keccak (production algorithm)
//! - Plain Keccak-256 (benchmark baseline)

/// Keccak-based heavy hash implementation
///
/// The production algorithm: Keccak-256 seeding, a deterministic
/// matrix-weighting stage, and a finalizing Keccak-256.
pub mod kheavyhash;

/// Plain Keccak-256 implementation
///
/// Single-pass Keccak over header and nonce. Used as a benchmark
/// baseline and in fast tests.
pub mod keccak;

use crate::types::AlgorithmType;
use crate::utils::error::MinerError;

/// Common interface for all hash algorithms
///
/// All algorithm implementations must provide these basic operations
/// to be compatible with the hashing engine. The digest is interpreted
/// as a big-endian unsigned integer when compared against a target.
pub trait Algorithm: Send + Sync {
    /// Compute the hash for given header data and nonce
    ///
    /// # Arguments
    /// * `header` - The block header bytes without the nonce
    /// * `nonce` - The nonce value to embed in the hash computation
    ///
    /// # Returns
    /// 32-byte digest or error if computation fails
    fn hash(&self, header: &[u8], nonce: u64) -> Result<[u8; 32], MinerError>;

    /// Verify if a (header, nonce) pair meets the target difficulty
    ///
    /// # Arguments
    /// * `header` - The original header bytes
    /// * `nonce` - The nonce that produced the digest
    /// * `target` - The 32-byte big-endian target to compare against
    ///
    /// # Returns
    /// `true` if the digest is numerically below the target
    fn verify(&self, header: &[u8], nonce: u64, target: &[u8]) -> Result<bool, MinerError>;

    /// Get the algorithm type
    fn algorithm_type(&self) -> AlgorithmType;
}

/// Exact difficulty comparison: digest < target as big-endian unsigned integers
///
/// Byte-lexicographic comparison of equal-length big-endian values is
/// identical to the numeric comparison, so no big-integer arithmetic
/// (and no floating point) is involved.
pub fn digest_meets_target(digest: &[u8; 32], target: &[u8; 32]) -> bool {
    digest.as_slice() < target.as_slice()
}

// src/miner/algorithm/kheavyhash.rs
//! Keccak-based heavy hash implementation
//!
//! The production proof-of-work primitive: a Keccak-256 seeded,
//! matrix-weighted double hash. The structure is
//! seed -> matrix product -> fold -> finalize, with the deliberately
//! expensive matrix stage making single evaluations costly while the
//! digest contract stays a plain 32-byte big-endian value.

use crate::miner::algorithm::{Algorithm, digest_meets_target};
use crate::types::AlgorithmType;
use crate::utils::error::MinerError;
use sha3::{Digest, Keccak256};

/// Side length of the weighting matrix
const MATRIX_SIZE: usize = 32;

/// Keccak-based heavy hash
///
/// Stateless; every evaluation derives its weighting matrix from the
/// header seed, so identical headers always see identical weights and
/// the nonce only enters through the seeded digest.
pub struct KHeavyHash;

impl KHeavyHash {
    /// Creates a new heavy hash instance
    pub fn new() -> Self {
        KHeavyHash
    }

    /// Derives the weighting matrix rows from the header seed
    ///
    /// Row `r` is the Keccak-256 digest of `seed || r`, giving
    /// [`MATRIX_SIZE`] rows of [`MATRIX_SIZE`] byte-wide weights that are
    /// fully determined by the header alone.
    fn derive_matrix(seed: &[u8; 32]) -> [[u8; MATRIX_SIZE]; MATRIX_SIZE] {
        let mut matrix = [[0u8; MATRIX_SIZE]; MATRIX_SIZE];
        for (r, row) in matrix.iter_mut().enumerate() {
            let mut hasher = Keccak256::new();
            hasher.update(seed);
            hasher.update((r as u32).to_le_bytes());
            row.copy_from_slice(&hasher.finalize());
        }
        matrix
    }

    /// Computes the matrix product stage and folds it into the input digest
    fn weigh(matrix: &[[u8; MATRIX_SIZE]; MATRIX_SIZE], input: &[u8; 32]) -> [u8; 32] {
        let mut folded = [0u8; 32];
        for (r, row) in matrix.iter().enumerate() {
            let mut acc: u32 = 0;
            for (c, weight) in row.iter().enumerate() {
                acc = acc.wrapping_add(u32::from(*weight) * u32::from(input[c]));
            }
            // High product bits carry the mixing; fold back onto the digest
            folded[r] = ((acc >> 8) as u8) ^ input[r];
        }
        folded
    }
}

impl Default for KHeavyHash {
    fn default() -> Self {
        Self::new()
    }
}

impl Algorithm for KHeavyHash {
    /// Computes the heavy hash for the given header and nonce
    ///
    /// # Arguments
    /// * `header` - The block header bytes without the nonce
    /// * `nonce` - The nonce value, embedded little-endian
    ///
    /// # Returns
    /// The finalizing Keccak-256 digest of the weighted state
    fn hash(&self, header: &[u8], nonce: u64) -> Result<[u8; 32], MinerError> {
        // Header-only seed fixes the matrix for the whole job
        let mut seed_hasher = Keccak256::new();
        seed_hasher.update(header);
        let seed: [u8; 32] = seed_hasher.finalize().into();
        let matrix = Self::derive_matrix(&seed);

        // The nonce enters only through the seeded digest
        let mut hasher = Keccak256::new();
        hasher.update(header);
        hasher.update(nonce.to_le_bytes());
        let seeded: [u8; 32] = hasher.finalize().into();

        let weighted = Self::weigh(&matrix, &seeded);

        let mut finalizer = Keccak256::new();
        finalizer.update(weighted);
        Ok(finalizer.finalize().into())
    }

    fn verify(&self, header: &[u8], nonce: u64, target: &[u8]) -> Result<bool, MinerError> {
        let target: [u8; 32] = target
            .try_into()
            .map_err(|_| MinerError::InputError(format!("Target must be 32 bytes, got {}", target.len())))?;
        Ok(digest_meets_target(&self.hash(header, nonce)?, &target))
    }

    fn algorithm_type(&self) -> AlgorithmType {
        AlgorithmType::KHeavyHash
    }
}

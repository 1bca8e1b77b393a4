// src/miner/algorithm/keccak.rs
//! Plain Keccak-256 implementation
//!
//! Single-pass Keccak over header and nonce. Cheap enough to serve as a
//! benchmark baseline and to keep engine tests fast; never valid on the
//! production chain.

use crate::miner::algorithm::{Algorithm, digest_meets_target};
use crate::types::AlgorithmType;
use crate::utils::error::MinerError;
use sha3::{Digest, Keccak256};

/// Plain Keccak-256 of `header || nonce_le`
pub struct Keccak256Algo;

impl Keccak256Algo {
    /// Creates a new plain Keccak instance
    pub fn new() -> Self {
        Keccak256Algo
    }
}

impl Default for Keccak256Algo {
    fn default() -> Self {
        Self::new()
    }
}

impl Algorithm for Keccak256Algo {
    fn hash(&self, header: &[u8], nonce: u64) -> Result<[u8; 32], MinerError> {
        let mut hasher = Keccak256::new();
        hasher.update(header);
        hasher.update(nonce.to_le_bytes());
        Ok(hasher.finalize().into())
    }

    fn verify(&self, header: &[u8], nonce: u64, target: &[u8]) -> Result<bool, MinerError> {
        let target: [u8; 32] = target
            .try_into()
            .map_err(|_| MinerError::InputError(format!("Target must be 32 bytes, got {}", target.len())))?;
        Ok(digest_meets_target(&self.hash(header, nonce)?, &target))
    }

    fn algorithm_type(&self) -> AlgorithmType {
        AlgorithmType::Keccak256
    }
}

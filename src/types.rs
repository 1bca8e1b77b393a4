// src/types.rs
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Supported hash algorithms for block candidates
///
/// This enum represents the proof-of-work primitives the miner can drive.
/// The engine treats them as interchangeable black boxes; only the digest
/// contract (32 bytes, compared big-endian against the target) matters.
#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
pub enum AlgorithmType {
    /// Keccak-based heavy hash (matrix-weighted double Keccak)
    ///
    /// The chain's production algorithm. The heavy middle stage makes a
    /// single evaluation deliberately expensive.
    #[clap(name = "kheavyhash")]
    KHeavyHash,

    /// Plain Keccak-256 of header and nonce
    ///
    /// A lightweight baseline used for benchmark comparison and fast tests.
    /// Not valid for the production chain.
    #[clap(name = "keccak256")]
    Keccak256,
}

impl fmt::Display for AlgorithmType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AlgorithmType::KHeavyHash => write!(f, "kheavyhash"),
            AlgorithmType::Keccak256 => write!(f, "keccak256"),
        }
    }
}

impl FromStr for AlgorithmType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "kheavyhash" | "heavyhash" => Ok(AlgorithmType::KHeavyHash),
            "keccak" | "keccak256" => Ok(AlgorithmType::Keccak256),
            _ => Err(format!("Unknown algorithm: {}", s)),
        }
    }
}

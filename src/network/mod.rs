// src/network/mod.rs
//! Network communication components
//!
//! This module handles all interaction with the full node. The concrete
//! wire protocol lives behind the [`NodeConnector`] trait so the supervisor
//! only depends on the call contract; [`NodeClient`] implements it over
//! JSON-RPC.

/// Full node client implementation
///
/// Handles communication with a local node for solo mining.
/// Uses JSON-RPC to interact with the node's mining API.
pub mod node;

use crate::miner::engine::{MiningJob, Solution};
use crate::utils::error::MinerError;

// Re-export main components for cleaner imports
pub use node::{NodeClient, NodeConfig};

/// Basic facts about the connected node
#[derive(Debug, Clone)]
pub struct NodeInfo {
    /// Chain height the node currently sees
    pub height: u64,
    /// Whether the node considers itself synced with the network
    pub is_synced: bool,
}

/// Result of submitting a solution to the node
///
/// A protocol-level rejection is a normal outcome, not an error; transport
/// failures surface as [`MinerError::SubmitError`] instead.
#[derive(Debug, Clone)]
pub enum SubmitOutcome {
    /// The node accepted the block
    Accepted,
    /// The node rejected the block, e.g. a stale parent or invalid digest
    Rejected {
        /// Node-supplied rejection reason
        reason: String,
    },
}

/// Call contract between the supervisor and the full node
///
/// The supervisor is the sole caller and the sole decision point for
/// retry versus escalate; implementations only classify failures
/// (connection, no-job-available, submit transport) and never retry
/// internally.
#[allow(async_fn_in_trait)]
pub trait NodeConnector {
    /// Establishes or re-establishes the node connection
    ///
    /// Fails with [`MinerError::ConnectionError`] when the node is
    /// unreachable or not synced.
    async fn connect(&mut self) -> Result<NodeInfo, MinerError>;

    /// Fetches a fresh block-candidate job
    ///
    /// Fails with [`MinerError::JobUnavailable`] on transient conditions
    /// (node momentarily unable to build a template).
    async fn fetch_job(&mut self) -> Result<MiningJob, MinerError>;

    /// Submits a solved block
    ///
    /// Transport failures surface as [`MinerError::SubmitError`]; protocol
    /// rejections come back as [`SubmitOutcome::Rejected`].
    async fn submit_solution(&mut self, solution: &Solution) -> Result<SubmitOutcome, MinerError>;

    /// Current chain height, used to detect that the active job is superseded
    async fn chain_height(&mut self) -> Result<u64, MinerError>;
}

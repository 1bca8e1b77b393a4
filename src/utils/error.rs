// src/utils/error.rs
use crate::miner::engine;
use serde_json;
use std::io;
use thiserror::Error;
use url;

/// Main error type for the mining application
///
/// This enum represents all possible error conditions that can occur
/// during mining operations, including network, I/O, protocol, and
/// configuration errors.
#[derive(Error, Debug)]
pub enum MinerError {
    /// Errors related to hash algorithms (e.g., unsupported algorithm)
    #[error("Algorithm error: {0}")]
    AlgorithmError(String),

    /// Errors related to network connectivity or an unsynced node
    ///
    /// Retried with backoff by the supervisor; fatal once the configured
    /// number of consecutive attempts is exhausted.
    #[error("Network connection error: {0}")]
    ConnectionError(String),

    /// The node cannot hand out work right now (transient)
    ///
    /// The supervisor backs off for the configured retry delay and asks again.
    #[error("No job available: {0}")]
    JobUnavailable(String),

    /// A solution submission failed in transit (transient network issue)
    ///
    /// Distinct from a protocol-level rejection, which is an outcome rather
    /// than an error. Retried a bounded number of times per solution.
    #[error("Submission failed: {0}")]
    SubmitError(String),

    /// Errors in protocol handling or invalid protocol messages
    #[error("Protocol violation: {0}")]
    ProtocolError(String),

    /// Standard I/O operation errors
    #[error("I/O error: {0}")]
    IoError(#[from] io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// URL parsing errors
    #[error("URL parse error: {0}")]
    UrlError(#[from] url::ParseError),

    /// HTTP request/response errors
    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),

    /// Configuration file or parameter errors
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Thread communication channel errors
    #[error("Thread communication error: {0}")]
    ChannelError(String),

    /// Invalid user input or parameter errors
    #[error("Invalid input: {0}")]
    InputError(String),

    /// Async task execution errors
    #[error("Task execution error: {0}")]
    TaskError(String),
}

/// Converts crossbeam channel send errors for worker reports into MinerError
///
/// Used when a worker fails to deliver a report through the engine channel.
/// Wraps the original error in a `ChannelError` variant with context.
impl From<crossbeam_channel::SendError<engine::WorkerReport>> for MinerError {
    fn from(e: crossbeam_channel::SendError<engine::WorkerReport>) -> Self {
        MinerError::ChannelError(format!("Worker report send failed: {}", e))
    }
}

/// Converts hex decoding errors into MinerError
///
/// Used when invalid hex data is encountered during:
/// - Block template processing
/// - Target decoding
/// - Configuration parsing
/// Wraps the original error in an `InputError` variant.
impl From<hex::FromHexError> for MinerError {
    fn from(e: hex::FromHexError) -> Self {
        MinerError::InputError(format!("Hex conversion failed: {}", e))
    }
}

/// Converts async task join errors into MinerError
///
/// Used when background tasks fail unexpectedly, including:
/// - Network operations
/// - Price refresh tasks
/// - Monitoring tasks
/// Wraps the original error in a `TaskError` variant.
impl From<tokio::task::JoinError> for MinerError {
    fn from(e: tokio::task::JoinError) -> Self {
        MinerError::TaskError(format!("Async task failed: {}", e))
    }
}

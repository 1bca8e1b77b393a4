// src/network/node.rs
use crate::miner::engine::{MiningJob, Solution};
use crate::network::{NodeConnector, NodeInfo, SubmitOutcome};
use crate::utils::error::MinerError;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::time::SystemTime;

/// Configuration for connecting to a node's RPC interface
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeConfig {
    /// URL of the node's RPC endpoint (e.g., "http://127.0.0.1:16110/rpc")
    pub rpc_url: String,
    /// Username for RPC authentication (if required)
    #[serde(default)]
    pub rpc_user: String,
    /// Password for RPC authentication (if required)
    #[serde(default)]
    pub rpc_password: String,
    /// Wallet address that will receive mining rewards
    pub wallet_address: String,
}

/// Client for interacting with a node's RPC interface
pub struct NodeClient {
    /// Configuration for the node connection
    config: NodeConfig,
    /// HTTP client for making RPC requests
    client: Client,
    /// Last chain height reported by this node
    last_height: u64,
}

impl NodeClient {
    /// Creates a new NodeClient with the given configuration
    ///
    /// # Arguments
    /// * `config` - Node configuration containing RPC connection details
    ///
    /// # Errors
    /// Fails with [`MinerError::UrlError`] when the configured RPC URL
    /// does not parse.
    pub fn new(config: NodeConfig) -> Result<Self, MinerError> {
        url::Url::parse(&config.rpc_url)?;
        Ok(NodeClient {
            config,
            client: Client::new(),
            last_height: 0,
        })
    }

    /// Makes an RPC call to the node
    ///
    /// # Arguments
    /// * `method` - The RPC method to call
    /// * `params` - Parameters for the RPC call
    async fn rpc_call(&self, method: &str, params: Value) -> Result<Value, MinerError> {
        let response = self
            .client
            .post(&self.config.rpc_url)
            .basic_auth(&self.config.rpc_user, Some(&self.config.rpc_password))
            .json(&json!({
                "jsonrpc": "2.0",
                "id": "0",
                "method": method,
                "params": params
            }))
            .send()
            .await?
            .json()
            .await?;

        Ok(response)
    }

    /// Parses a `get_block_template` response into a [`MiningJob`]
    fn parse_block_template(response: &Value) -> Result<MiningJob, MinerError> {
        let result = &response["result"];
        if !result.is_object() {
            return Err(MinerError::ProtocolError("Missing result object".to_string()));
        }

        Ok(MiningJob {
            job_id: result["job_id"]
                .as_str()
                .ok_or_else(|| MinerError::ProtocolError("Missing job_id".to_string()))?
                .to_string(),
            height: result["height"]
                .as_u64()
                .ok_or_else(|| MinerError::ProtocolError("Missing height".to_string()))?,
            prev_block_hash: parse_hash_field(result, "prev_block_hash")?,
            merkle_root: parse_hash_field(result, "merkle_root")?,
            target: parse_hash_field(result, "target")?,
            timestamp: result["timestamp"]
                .as_u64()
                .ok_or_else(|| MinerError::ProtocolError("Missing timestamp".to_string()))?,
            reward_sompi: result["expected_reward"].as_u64().unwrap_or(0),
            issued_at: SystemTime::now(),
        })
    }

    /// Parses a `submit_block` response into a [`SubmitOutcome`]
    fn parse_submit_response(response: &Value) -> Result<SubmitOutcome, MinerError> {
        let result = &response["result"];
        if !result.is_object() {
            return Err(MinerError::ProtocolError("Missing result object".to_string()));
        }
        match result["status"].as_str() {
            Some("accepted") => Ok(SubmitOutcome::Accepted),
            Some("rejected") => Ok(SubmitOutcome::Rejected {
                reason: result["reason"].as_str().unwrap_or("unspecified").to_string(),
            }),
            other => Err(MinerError::ProtocolError(format!(
                "Unknown submit status: {:?}",
                other
            ))),
        }
    }

    /// Parses a `get_info` response
    fn parse_info(response: &Value) -> Result<NodeInfo, MinerError> {
        let result = &response["result"];
        if !result.is_object() {
            return Err(MinerError::ProtocolError("Missing result object".to_string()));
        }
        Ok(NodeInfo {
            height: result["height"]
                .as_u64()
                .ok_or_else(|| MinerError::ProtocolError("Missing height".to_string()))?,
            is_synced: result["is_synced"].as_bool().unwrap_or(false),
        })
    }
}

/// Decodes a 32-byte hex field out of an RPC result object
fn parse_hash_field(result: &Value, field: &str) -> Result<[u8; 32], MinerError> {
    let raw = result[field]
        .as_str()
        .ok_or_else(|| MinerError::ProtocolError(format!("Missing {}", field)))?;
    let bytes = hex::decode(raw)?;
    bytes
        .try_into()
        .map_err(|_| MinerError::ProtocolError(format!("{} must be 32 bytes", field)))
}

impl NodeConnector for NodeClient {
    /// Checks reachability and sync state via `get_info`
    async fn connect(&mut self) -> Result<NodeInfo, MinerError> {
        let response = self
            .rpc_call("get_info", json!({}))
            .await
            .map_err(|e| MinerError::ConnectionError(e.to_string()))?;
        let info = Self::parse_info(&response)?;
        if !info.is_synced {
            return Err(MinerError::ConnectionError(
                "Node is not synced with the network".to_string(),
            ));
        }
        self.last_height = info.height;
        Ok(info)
    }

    /// Requests a new block template from the node
    async fn fetch_job(&mut self) -> Result<MiningJob, MinerError> {
        let response = self
            .rpc_call(
                "get_block_template",
                json!({
                    "pay_address": self.config.wallet_address,
                    "extra_data": "kas_miner-rs"
                }),
            )
            .await
            .map_err(|e| MinerError::JobUnavailable(e.to_string()))?;

        if let Some(err) = response["error"]["message"].as_str() {
            return Err(MinerError::JobUnavailable(err.to_string()));
        }

        let job = Self::parse_block_template(&response)?;
        self.last_height = self.last_height.max(job.height);
        Ok(job)
    }

    /// Submits a solved block to the node
    async fn submit_solution(&mut self, solution: &Solution) -> Result<SubmitOutcome, MinerError> {
        let mut block = solution.header.clone();
        block.extend_from_slice(&solution.nonce.to_le_bytes());

        let response = self
            .rpc_call(
                "submit_block",
                json!({
                    "block": hex::encode(block),
                    "digest": hex::encode(solution.digest)
                }),
            )
            .await
            .map_err(|e| MinerError::SubmitError(e.to_string()))?;

        Self::parse_submit_response(&response)
    }

    /// Gets the current chain height from the node
    async fn chain_height(&mut self) -> Result<u64, MinerError> {
        let response = self
            .rpc_call("get_info", json!({}))
            .await
            .map_err(|e| MinerError::ConnectionError(e.to_string()))?;
        let info = Self::parse_info(&response)?;
        self.last_height = info.height;
        Ok(info.height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn template_response() -> Value {
        json!({
            "result": {
                "job_id": "a1b2c3",
                "height": 4242,
                "prev_block_hash": "11".repeat(32),
                "merkle_root": "22".repeat(32),
                "target": "000000ffffffffffffffffffffffffffffffffffffffffffffffffffffffffff",
                "timestamp": 1_700_000_000_123u64,
                "expected_reward": 44_000_000_000u64
            }
        })
    }

    #[test]
    fn parses_block_template() {
        let job = NodeClient::parse_block_template(&template_response()).unwrap();
        assert_eq!(job.job_id, "a1b2c3");
        assert_eq!(job.height, 4242);
        assert_eq!(job.prev_block_hash, [0x11u8; 32]);
        assert_eq!(job.merkle_root, [0x22u8; 32]);
        assert_eq!(job.reward_sompi, 44_000_000_000);
        assert_eq!(job.timestamp, 1_700_000_000_123);
    }

    #[test]
    fn rejects_template_missing_fields() {
        let response = json!({ "result": { "job_id": "x" } });
        assert!(matches!(
            NodeClient::parse_block_template(&response),
            Err(MinerError::ProtocolError(_))
        ));
    }

    #[test]
    fn rejects_template_with_bad_hex() {
        let mut response = template_response();
        response["result"]["target"] = json!("zz".repeat(32));
        assert!(matches!(
            NodeClient::parse_block_template(&response),
            Err(MinerError::InputError(_))
        ));
    }

    #[test]
    fn parses_submit_outcomes() {
        let accepted = json!({ "result": { "status": "accepted" } });
        assert!(matches!(
            NodeClient::parse_submit_response(&accepted),
            Ok(SubmitOutcome::Accepted)
        ));

        let rejected = json!({ "result": { "status": "rejected", "reason": "stale parent" } });
        match NodeClient::parse_submit_response(&rejected).unwrap() {
            SubmitOutcome::Rejected { reason } => assert_eq!(reason, "stale parent"),
            other => panic!("expected rejection, got {:?}", other),
        }

        let unknown = json!({ "result": { "status": "maybe" } });
        assert!(NodeClient::parse_submit_response(&unknown).is_err());
    }

    #[test]
    fn parses_node_info() {
        let response = json!({ "result": { "height": 10, "is_synced": true } });
        let info = NodeClient::parse_info(&response).unwrap();
        assert_eq!(info.height, 10);
        assert!(info.is_synced);
    }

    #[test]
    fn bad_rpc_url_is_rejected() {
        let config = NodeConfig {
            rpc_url: "not a url".into(),
            rpc_user: String::new(),
            rpc_password: String::new(),
            wallet_address: "kaspa:test".into(),
        };
        assert!(matches!(
            NodeClient::new(config),
            Err(MinerError::UrlError(_))
        ));
    }
}

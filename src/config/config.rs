// src/config/config.rs
use crate::miner::supervisor::SupervisorConfig;
use crate::network::node::NodeConfig;
use crate::rewards::ledger::RewardConfig;
use crate::utils::error::MinerError;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Default developer fee destination
const DEFAULT_DEV_FEE_ADDRESS: &str =
    "kaspa:qqggvdrxjqdgwql4aac8hg0pq2v4z5p46l86f98hq7ax29k7x55v7sycs9kvm";

/// Main configuration structure for the mining application
///
/// Contains all settings needed to configure mining operations,
/// including algorithm selection, worker configuration, node
/// connection and reward routing.
#[derive(Debug, Serialize, Deserialize)]
pub struct Config {
    /// Hash algorithm to use (e.g., "kheavyhash")
    #[serde(default = "default_algorithm")]
    pub algorithm: String,

    /// Number of worker threads to use for hashing
    /// (0 = auto-detect from available parallelism)
    #[serde(default = "default_worker_threads")]
    pub worker_threads: usize,

    /// Iterations between a worker's checks of the job-version marker
    #[serde(default = "default_staleness_check_interval")]
    pub staleness_check_interval: u64,

    /// Seconds to wait before retrying after a recoverable failure
    #[serde(default = "default_retry_delay_secs")]
    pub retry_delay_secs: u64,

    /// Seconds between chain-height polls while hashing
    #[serde(default = "default_difficulty_poll_secs")]
    pub difficulty_poll_secs: u64,

    /// Bounded retries for transient submission failures
    #[serde(default = "default_submit_retry_limit")]
    pub submit_retry_limit: u32,

    /// Consecutive failed connection attempts tolerated before halting
    #[serde(default = "default_max_connect_attempts")]
    pub max_connect_attempts: u32,

    /// Node connection configuration
    pub node: NodeConfig,

    /// Reward routing configuration
    pub rewards: RewardSettings,

    /// Statistics reporting configuration
    #[serde(default)]
    pub stats: StatsSettings,
}

/// Reward routing settings
///
/// Controls the developer fee, the one-time owner allocation target and
/// the price source used to value it.
#[derive(Debug, Serialize, Deserialize)]
pub struct RewardSettings {
    /// Developer fee in basis points of gross (1000 = 10%)
    #[serde(default = "default_dev_fee_bps")]
    pub dev_fee_bps: u32,

    /// Address receiving the developer fee
    #[serde(default = "default_dev_fee_address")]
    pub dev_fee_address: String,

    /// Address receiving the one-time owner allocation
    pub owner_address: String,

    /// Owner allocation target in whole USD
    #[serde(default = "default_owner_target_usd")]
    pub owner_target_usd: u64,

    /// Simple-price endpoint used to value the owner target
    #[serde(default = "default_price_url")]
    pub price_url: String,

    /// Asset key expected in the price response
    #[serde(default = "default_price_asset_id")]
    pub price_asset_id: String,

    /// Seconds between price refreshes
    #[serde(default = "default_price_poll_secs")]
    pub price_poll_secs: u64,

    /// Quote age in seconds beyond which reward events are flagged stale
    #[serde(default = "default_price_stale_after_secs")]
    pub price_stale_after_secs: u64,
}

/// Statistics reporting settings
#[derive(Debug, Serialize, Deserialize)]
pub struct StatsSettings {
    /// Seconds between periodic stats log lines
    #[serde(default = "default_report_interval_secs")]
    pub report_interval_secs: u64,
}

impl Default for StatsSettings {
    fn default() -> Self {
        StatsSettings {
            report_interval_secs: default_report_interval_secs(),
        }
    }
}

fn default_algorithm() -> String {
    "kheavyhash".into()
}

fn default_worker_threads() -> usize {
    num_cpus::get()
}

fn default_staleness_check_interval() -> u64 {
    10_000
}

fn default_retry_delay_secs() -> u64 {
    10
}

fn default_difficulty_poll_secs() -> u64 {
    5
}

fn default_submit_retry_limit() -> u32 {
    3
}

fn default_max_connect_attempts() -> u32 {
    5
}

fn default_dev_fee_bps() -> u32 {
    1000
}

fn default_dev_fee_address() -> String {
    DEFAULT_DEV_FEE_ADDRESS.into()
}

fn default_owner_target_usd() -> u64 {
    50_000
}

fn default_price_url() -> String {
    "https://api.coingecko.com/api/v3/simple/price?ids=kaspa&vs_currencies=usd".into()
}

fn default_price_asset_id() -> String {
    "kaspa".into()
}

fn default_price_poll_secs() -> u64 {
    60
}

fn default_price_stale_after_secs() -> u64 {
    300
}

fn default_report_interval_secs() -> u64 {
    60
}

impl Config {
    /// Loads configuration from a file
    ///
    /// # Arguments
    /// * `path` - Path to the configuration file (TOML format)
    ///
    /// # Returns
    /// * `Ok(Config)` - Successfully loaded configuration
    /// * `Err(MinerError)` - If file couldn't be read or parsed
    pub fn load(path: impl Into<PathBuf>) -> Result<Self, MinerError> {
        let path = path.into();
        let config_str = std::fs::read_to_string(&path).map_err(|e| {
            MinerError::ConfigError(format!(
                "Failed to read config at {}: {}",
                path.display(),
                e
            ))
        })?;

        toml::from_str(&config_str)
            .map_err(|e| MinerError::ConfigError(format!("Invalid config format: {}", e)))
    }

    /// Checks invariants the type system cannot express
    ///
    /// Addresses must carry the `kaspa:` prefix and the developer fee must
    /// stay within 100%.
    pub fn validate(&self) -> Result<(), MinerError> {
        for (label, address) in [
            ("wallet_address", &self.node.wallet_address),
            ("dev_fee_address", &self.rewards.dev_fee_address),
            ("owner_address", &self.rewards.owner_address),
        ] {
            if !address.starts_with("kaspa:") {
                return Err(MinerError::ConfigError(format!(
                    "Invalid {}: expected a kaspa: address, got {:?}",
                    label, address
                )));
            }
        }
        if self.rewards.dev_fee_bps > 10_000 {
            return Err(MinerError::ConfigError(format!(
                "dev_fee_bps must be at most 10000, got {}",
                self.rewards.dev_fee_bps
            )));
        }
        if self.staleness_check_interval == 0 {
            return Err(MinerError::ConfigError(
                "staleness_check_interval must be positive".into(),
            ));
        }
        Ok(())
    }

    /// Worker count with 0 resolved to the machine's available parallelism
    pub fn effective_worker_threads(&self) -> usize {
        if self.worker_threads == 0 {
            num_cpus::get()
        } else {
            self.worker_threads
        }
    }

    /// Supervisor tuning derived from this configuration
    pub fn supervisor_config(&self) -> SupervisorConfig {
        SupervisorConfig {
            worker_count: self.effective_worker_threads(),
            retry_delay: Duration::from_secs(self.retry_delay_secs),
            difficulty_poll_interval: Duration::from_secs(self.difficulty_poll_secs),
            submit_retry_limit: self.submit_retry_limit,
            max_connect_attempts: self.max_connect_attempts,
        }
    }

    /// Ledger configuration derived from this configuration
    ///
    /// The operator's payout address is the node wallet address.
    pub fn reward_config(&self) -> RewardConfig {
        RewardConfig {
            dev_fee_bps: self.rewards.dev_fee_bps,
            dev_fee_address: self.rewards.dev_fee_address.clone(),
            owner_address: self.rewards.owner_address.clone(),
            user_address: self.node.wallet_address.clone(),
            owner_target_usd: self.rewards.owner_target_usd,
            price_stale_after: Duration::from_secs(self.rewards.price_stale_after_secs),
        }
    }

    /// Generates a configuration template string
    ///
    /// # Returns
    /// String containing a commented TOML configuration template
    pub fn generate_template() -> String {
        let mut template = String::new();
        template.push_str("# KAS Miner Configuration\n\n");
        template.push_str("# Supported algorithms: kheavyhash, keccak256\n");
        template.push_str("algorithm = \"kheavyhash\"\n");
        template.push_str("# Number of worker threads (0 = auto-detect)\n");
        template.push_str("worker_threads = 0\n");
        template.push_str("# Iterations between job-staleness checks per worker\n");
        template.push_str("staleness_check_interval = 10000\n");
        template.push_str("# Seconds to wait before retrying after a recoverable failure\n");
        template.push_str("retry_delay_secs = 10\n");
        template.push_str("# Seconds between chain-height polls while hashing\n");
        template.push_str("difficulty_poll_secs = 5\n\n");

        template.push_str("# Node connection\n");
        template.push_str("[node]\n");
        template.push_str("rpc_url = \"http://127.0.0.1:16110/rpc\"\n");
        template.push_str("rpc_user = \"\"\n");
        template.push_str("rpc_password = \"\"\n");
        template.push_str("wallet_address = \"kaspa:your_wallet_address\"\n\n");

        template.push_str("# Reward routing\n");
        template.push_str("[rewards]\n");
        template.push_str("# Developer fee in basis points (1000 = 10%)\n");
        template.push_str("dev_fee_bps = 1000\n");
        template.push_str("owner_address = \"kaspa:owner_allocation_address\"\n");
        template.push_str("# One-time owner allocation target in USD\n");
        template.push_str("owner_target_usd = 50000\n\n");

        template.push_str("[stats]\n");
        template.push_str("# Seconds between stats log lines\n");
        template.push_str("report_interval_secs = 60\n");

        template
    }
}

// src/rewards/price.rs
//! Price oracle boundary
//!
//! Supplies the reference-currency price used to value the owner
//! allocation target. The ledger tolerates stale or missing prices, so
//! oracle failures are logged and never block reward accounting.

use crate::rewards::ledger::RewardLedger;
use crate::utils::error::MinerError;
use reqwest::Client;
use serde_json::Value;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

/// One observed price of the reward asset in the reference currency
#[derive(Debug, Clone, Copy)]
pub struct PriceQuote {
    /// USD per whole coin
    pub usd_per_kas: f64,
    /// When the quote was obtained
    pub fetched_at: SystemTime,
}

/// Boundary to an external price source
#[allow(async_fn_in_trait)]
pub trait PriceOracle {
    /// Fetches the current price of the reward asset
    async fn current_price(&self) -> Result<PriceQuote, MinerError>;
}

/// Price oracle backed by a CoinGecko-style simple-price HTTP endpoint
///
/// Expects responses shaped like `{"kaspa": {"usd": 0.1}}`.
pub struct HttpPriceOracle {
    client: Client,
    url: String,
    asset_id: String,
}

impl HttpPriceOracle {
    /// Creates a new oracle against the given endpoint
    ///
    /// # Arguments
    /// * `url` - Full simple-price query URL
    /// * `asset_id` - Asset key expected in the response object
    pub fn new(url: &str, asset_id: &str) -> Result<Self, MinerError> {
        url::Url::parse(url)?;
        Ok(HttpPriceOracle {
            client: Client::new(),
            url: url.to_string(),
            asset_id: asset_id.to_string(),
        })
    }

    /// Extracts the USD price for `asset_id` out of a simple-price response
    fn parse_price_response(response: &Value, asset_id: &str) -> Result<f64, MinerError> {
        response[asset_id]["usd"].as_f64().ok_or_else(|| {
            MinerError::ProtocolError(format!("Price response missing {}.usd", asset_id))
        })
    }
}

impl PriceOracle for HttpPriceOracle {
    async fn current_price(&self) -> Result<PriceQuote, MinerError> {
        let response: Value = self.client.get(&self.url).send().await?.json().await?;
        let usd_per_kas = Self::parse_price_response(&response, &self.asset_id)?;
        Ok(PriceQuote {
            usd_per_kas,
            fetched_at: SystemTime::now(),
        })
    }
}

/// Pulls one quote from the oracle into the ledger
///
/// Returns `true` when the ledger received a fresh quote. Failures are
/// logged and leave the last known price in effect.
pub async fn refresh_once<P: PriceOracle>(oracle: &P, ledger: &RewardLedger) -> bool {
    match oracle.current_price().await {
        Ok(quote) => {
            log::debug!("Price refreshed: {} USD", quote.usd_per_kas);
            ledger.update_price(quote);
            true
        }
        Err(e) => {
            log::warn!("Price refresh failed, keeping last known price: {}", e);
            false
        }
    }
}

/// Periodically refreshes the ledger's price snapshot
///
/// Runs until the surrounding task is dropped.
pub async fn run_price_refresh<P: PriceOracle>(
    oracle: P,
    ledger: Arc<RewardLedger>,
    every: Duration,
) {
    let mut interval = tokio::time::interval(every);
    loop {
        interval.tick().await;
        refresh_once(&oracle, &ledger).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rewards::ledger::RewardConfig;
    use serde_json::json;

    struct FixedOracle(Result<f64, ()>);

    impl PriceOracle for FixedOracle {
        async fn current_price(&self) -> Result<PriceQuote, MinerError> {
            match self.0 {
                Ok(price) => Ok(PriceQuote {
                    usd_per_kas: price,
                    fetched_at: SystemTime::now(),
                }),
                Err(()) => Err(MinerError::ConnectionError("oracle down".into())),
            }
        }
    }

    fn test_ledger() -> RewardLedger {
        RewardLedger::new(RewardConfig {
            dev_fee_bps: 1000,
            dev_fee_address: "kaspa:dev".into(),
            owner_address: "kaspa:owner".into(),
            user_address: "kaspa:user".into(),
            owner_target_usd: 50_000,
            price_stale_after: Duration::from_secs(300),
        })
    }

    #[test]
    fn parses_simple_price_response() {
        let response = json!({ "kaspa": { "usd": 0.123 } });
        assert_eq!(
            HttpPriceOracle::parse_price_response(&response, "kaspa").unwrap(),
            0.123
        );
        assert!(HttpPriceOracle::parse_price_response(&response, "bitcoin").is_err());
    }

    #[test]
    fn rejects_bad_endpoint_url() {
        assert!(HttpPriceOracle::new("not a url", "kaspa").is_err());
    }

    #[tokio::test]
    async fn refresh_updates_the_ledger() {
        let ledger = test_ledger();
        assert!(refresh_once(&FixedOracle(Ok(0.25)), &ledger).await);
        let price = ledger.state().last_price.expect("price installed");
        assert_eq!(price.usd_per_kas, 0.25);
    }

    #[tokio::test]
    async fn failed_refresh_keeps_last_price() {
        let ledger = test_ledger();
        assert!(refresh_once(&FixedOracle(Ok(0.25)), &ledger).await);
        assert!(!refresh_once(&FixedOracle(Err(())), &ledger).await);
        let price = ledger.state().last_price.expect("price retained");
        assert_eq!(price.usd_per_kas, 0.25);
    }
}

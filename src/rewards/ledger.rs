// src/rewards/ledger.rs
//! Waterfall reward ledger
//!
//! Apportions each gross reward, in fixed order, into a flat-fraction
//! developer fee, a one-time owner allocation capped at a reference-currency
//! target, and the operator's net share. Cumulative totals are monotonically
//! non-decreasing and satisfy the sum identity
//! `gross == dev_fee + owner_allocation + user_net` after every event.

use crate::rewards::price::PriceQuote;
use std::sync::Mutex;
use std::time::{Duration, SystemTime};

/// Smallest-unit scale of the reward asset
pub const SOMPI_PER_KAS: u64 = 100_000_000;

/// Ledger configuration, fixed for the lifetime of the process
#[derive(Debug, Clone)]
pub struct RewardConfig {
    /// Developer fee in basis points of gross (1000 = 10%)
    pub dev_fee_bps: u32,
    /// Address receiving the developer fee
    pub dev_fee_address: String,
    /// Address receiving the one-time owner allocation
    pub owner_address: String,
    /// Address receiving the operator's net share
    pub user_address: String,
    /// Owner allocation target in whole reference-currency units (USD)
    pub owner_target_usd: u64,
    /// Age beyond which a price quote counts as stale
    pub price_stale_after: Duration,
}

/// Cumulative reward totals, all in sompi
///
/// Snapshot type returned to callers and telemetry; the ledger's own copy
/// is only mutated by [`RewardLedger::record_reward`].
#[derive(Debug, Clone, Default)]
pub struct RewardState {
    /// Total gross rewards processed
    pub cumulative_gross: u64,
    /// Total routed to the developer fee
    pub cumulative_dev_fee: u64,
    /// Total routed to the owner allocation
    pub cumulative_owner_allocation: u64,
    /// Total routed to the operator
    pub cumulative_user_net: u64,
    /// Whether the owner target has been met and closed for good
    pub owner_target_exhausted: bool,
    /// Latest price quote the ledger has seen, if any
    pub last_price: Option<PriceQuote>,
    /// Number of events computed under a stale or missing price
    pub stale_price_events: u64,
}

/// One accepted solution's reward split, appended to the event log
#[derive(Debug, Clone)]
pub struct RewardEvent {
    /// Job whose solution produced this reward
    pub job_id: String,
    /// Gross payout in sompi
    pub gross: u64,
    /// Developer fee portion
    pub dev_fee: u64,
    /// Owner allocation portion
    pub owner_allocation: u64,
    /// Operator net portion
    pub user_net: u64,
    /// Set when the split was computed under a stale or missing price
    pub stale_price: bool,
    /// When the event was recorded
    pub recorded_at: SystemTime,
}

/// Destination bucket of one payout instruction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayoutKind {
    /// Flat-fraction developer fee
    DevFee,
    /// One-time capped owner allocation
    OwnerAllocation,
    /// Operator's net share
    UserReward,
}

/// One transfer implied by a reward event
#[derive(Debug, Clone)]
pub struct PayoutInstruction {
    /// Destination address
    pub address: String,
    /// Amount in sompi
    pub amount_sompi: u64,
    /// Which bucket this transfer settles
    pub kind: PayoutKind,
}

struct LedgerInner {
    state: RewardState,
    events: Vec<RewardEvent>,
}

/// Deterministic accounting of gross rewards
///
/// The single mutating entry point is [`RewardLedger::record_reward`];
/// events are serialized behind the internal lock, so concurrent callers
/// observe a total order of reward events.
pub struct RewardLedger {
    config: RewardConfig,
    inner: Mutex<LedgerInner>,
}

impl RewardLedger {
    /// Creates an empty ledger with the given configuration
    pub fn new(config: RewardConfig) -> Self {
        RewardLedger {
            config,
            inner: Mutex::new(LedgerInner {
                state: RewardState::default(),
                events: Vec::new(),
            }),
        }
    }

    /// Ledger configuration
    pub fn config(&self) -> &RewardConfig {
        &self.config
    }

    /// Installs a fresh price quote
    ///
    /// Non-positive prices are ignored with a warning; the previous quote,
    /// if any, stays in effect.
    pub fn update_price(&self, quote: PriceQuote) {
        if quote.usd_per_kas <= 0.0 {
            log::warn!("Ignoring non-positive price quote: {}", quote.usd_per_kas);
            return;
        }
        let mut inner = self.inner.lock().expect("ledger lock poisoned");
        inner.state.last_price = Some(quote);
    }

    /// Records one gross reward and returns the updated cumulative state
    ///
    /// Waterfall order per event: developer fee, owner allocation (while the
    /// target is open), operator remainder. The owner target is valued at
    /// the latest price snapshot each time, so a price drop before the
    /// target is met raises the amount still required, while once the
    /// target is met it never reopens.
    ///
    /// # Panics
    /// Panics if the cumulative sum identity would be violated; that is a
    /// programming defect, not a recoverable condition.
    pub fn record_reward(&self, gross: u64, job_id: &str) -> RewardState {
        let mut inner = self.inner.lock().expect("ledger lock poisoned");
        if gross == 0 {
            return inner.state.clone();
        }

        let dev_fee = (u128::from(gross) * u128::from(self.config.dev_fee_bps) / 10_000) as u64;
        let remaining = gross - dev_fee;
        let stale_price = Self::price_is_stale(&inner.state, &self.config);

        let owner_allocation = if inner.state.owner_target_exhausted {
            0
        } else {
            let target_remaining = Self::owner_target_remaining(&inner.state, &self.config);
            let portion = remaining.min(target_remaining);
            // The target can only close while a price is known; with no
            // price ever seen it stays open-ended
            if inner.state.last_price.is_some() && target_remaining == portion {
                inner.state.owner_target_exhausted = true;
                log::info!(
                    "Owner allocation target of {} USD has been met",
                    self.config.owner_target_usd
                );
            }
            portion
        };
        let user_net = remaining - owner_allocation;

        inner.state.cumulative_gross += gross;
        inner.state.cumulative_dev_fee += dev_fee;
        inner.state.cumulative_owner_allocation += owner_allocation;
        inner.state.cumulative_user_net += user_net;
        if stale_price {
            inner.state.stale_price_events += 1;
        }

        // Sum identity, exact in the smallest unit
        assert_eq!(
            inner.state.cumulative_gross,
            inner.state.cumulative_dev_fee
                + inner.state.cumulative_owner_allocation
                + inner.state.cumulative_user_net,
            "reward ledger sum identity violated"
        );

        inner.events.push(RewardEvent {
            job_id: job_id.to_string(),
            gross,
            dev_fee,
            owner_allocation,
            user_net,
            stale_price,
            recorded_at: SystemTime::now(),
        });

        inner.state.clone()
    }

    /// Snapshot of the cumulative state
    pub fn state(&self) -> RewardState {
        self.inner.lock().expect("ledger lock poisoned").state.clone()
    }

    /// Copy of the append-only event log
    pub fn events(&self) -> Vec<RewardEvent> {
        self.inner.lock().expect("ledger lock poisoned").events.clone()
    }

    /// Transfers implied by one event
    ///
    /// The developer fee is always listed; owner and user entries appear
    /// only when their portions are non-zero.
    pub fn payouts(&self, event: &RewardEvent) -> Vec<PayoutInstruction> {
        let mut instructions = vec![PayoutInstruction {
            address: self.config.dev_fee_address.clone(),
            amount_sompi: event.dev_fee,
            kind: PayoutKind::DevFee,
        }];
        if event.owner_allocation > 0 {
            instructions.push(PayoutInstruction {
                address: self.config.owner_address.clone(),
                amount_sompi: event.owner_allocation,
                kind: PayoutKind::OwnerAllocation,
            });
        }
        if event.user_net > 0 {
            instructions.push(PayoutInstruction {
                address: self.config.user_address.clone(),
                amount_sompi: event.user_net,
                kind: PayoutKind::UserReward,
            });
        }
        instructions
    }

    /// Sompi still owed to the owner target at the latest price
    ///
    /// With no price ever seen the target cannot be valued and the
    /// allocation stays open-ended.
    fn owner_target_remaining(state: &RewardState, config: &RewardConfig) -> u64 {
        match state.last_price {
            Some(quote) if quote.usd_per_kas > 0.0 => {
                // Dividing last keeps integral targets exact
                let target_sompi = (config.owner_target_usd as f64 * SOMPI_PER_KAS as f64
                    / quote.usd_per_kas)
                    .min(u64::MAX as f64) as u64;
                target_sompi.saturating_sub(state.cumulative_owner_allocation)
            }
            _ => u64::MAX,
        }
    }

    fn price_is_stale(state: &RewardState, config: &RewardConfig) -> bool {
        match state.last_price {
            Some(quote) => match quote.fetched_at.elapsed() {
                Ok(age) => age > config.price_stale_after,
                Err(_) => false,
            },
            None => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> RewardConfig {
        RewardConfig {
            dev_fee_bps: 1000,
            dev_fee_address: "kaspa:dev".into(),
            owner_address: "kaspa:owner".into(),
            user_address: "kaspa:user".into(),
            owner_target_usd: 50_000,
            price_stale_after: Duration::from_secs(300),
        }
    }

    fn fresh_quote(usd_per_kas: f64) -> PriceQuote {
        PriceQuote {
            usd_per_kas,
            fetched_at: SystemTime::now(),
        }
    }

    fn assert_identity(state: &RewardState) {
        assert_eq!(
            state.cumulative_gross,
            state.cumulative_dev_fee
                + state.cumulative_owner_allocation
                + state.cumulative_user_net
        );
    }

    #[test]
    fn waterfall_with_open_target_routes_remainder_to_owner() {
        // Gross 1000, 10% fee, target far from exhausted: 100 / 900 / 0
        let ledger = RewardLedger::new(test_config());
        ledger.update_price(fresh_quote(1.0));

        let state = ledger.record_reward(1000, "job-a");
        assert_eq!(state.cumulative_dev_fee, 100);
        assert_eq!(state.cumulative_owner_allocation, 900);
        assert_eq!(state.cumulative_user_net, 0);
        assert_identity(&state);
    }

    #[test]
    fn nearly_met_target_splits_between_owner_and_user() {
        // Price chosen so the whole owner target is 50 sompi:
        // 1 USD / 2e6 USD-per-KAS * 1e8 sompi-per-KAS = 50
        let mut config = test_config();
        config.owner_target_usd = 1;
        let ledger = RewardLedger::new(config);
        ledger.update_price(fresh_quote(2_000_000.0));

        let state = ledger.record_reward(1000, "job-b");
        assert_eq!(state.cumulative_dev_fee, 100);
        assert_eq!(state.cumulative_owner_allocation, 50);
        assert_eq!(state.cumulative_user_net, 850);
        assert!(state.owner_target_exhausted);
        assert_identity(&state);

        // Subsequent rewards flow entirely to the user
        let state = ledger.record_reward(1000, "job-c");
        assert_eq!(state.cumulative_owner_allocation, 50);
        assert_eq!(state.cumulative_user_net, 850 + 900);
        assert_identity(&state);
    }

    #[test]
    fn exhausted_target_never_reopens_on_price_drop() {
        let mut config = test_config();
        config.owner_target_usd = 1;
        let ledger = RewardLedger::new(config);
        ledger.update_price(fresh_quote(2_000_000.0));
        let state = ledger.record_reward(1000, "job-a");
        assert!(state.owner_target_exhausted);

        // A lower price would value the target higher, but it stays closed
        ledger.update_price(fresh_quote(0.01));
        let state = ledger.record_reward(1000, "job-b");
        assert_eq!(state.cumulative_owner_allocation, 50);
        assert!(state.owner_target_exhausted);
        assert_identity(&state);
    }

    #[test]
    fn price_drop_before_exhaustion_raises_the_requirement() {
        // Target 1 USD at 1 USD/KAS = 1e8 sompi; far from met by one event
        let mut config = test_config();
        config.owner_target_usd = 1;
        let ledger = RewardLedger::new(config);
        ledger.update_price(fresh_quote(1.0));
        let state = ledger.record_reward(1000, "job-a");
        assert_eq!(state.cumulative_owner_allocation, 900);
        assert!(!state.owner_target_exhausted);

        // Halving the price doubles the sompi still required; the next
        // event keeps allocating to the owner
        ledger.update_price(fresh_quote(0.5));
        let state = ledger.record_reward(1000, "job-b");
        assert_eq!(state.cumulative_owner_allocation, 1800);
        assert!(!state.owner_target_exhausted);
        assert_identity(&state);
    }

    #[test]
    fn missing_price_keeps_target_open_and_flags_events() {
        let ledger = RewardLedger::new(test_config());

        let state = ledger.record_reward(1000, "job-a");
        assert_eq!(state.cumulative_dev_fee, 100);
        assert_eq!(state.cumulative_owner_allocation, 900);
        assert_eq!(state.stale_price_events, 1);
        assert!(!state.owner_target_exhausted);
        assert_identity(&state);

        let events = ledger.events();
        assert_eq!(events.len(), 1);
        assert!(events[0].stale_price);
    }

    #[test]
    fn identity_holds_over_mixed_sequence() {
        let ledger = RewardLedger::new(test_config());
        ledger.update_price(fresh_quote(0.07));
        for (i, gross) in [3u64, 1000, 77, 999_999_937, 1, 50_000_000_000]
            .into_iter()
            .enumerate()
        {
            let state = ledger.record_reward(gross, &format!("job-{}", i));
            assert_identity(&state);
        }
        assert_eq!(ledger.events().len(), 6);
    }

    #[test]
    fn zero_gross_is_a_noop() {
        let ledger = RewardLedger::new(test_config());
        let state = ledger.record_reward(0, "job-a");
        assert_eq!(state.cumulative_gross, 0);
        assert!(ledger.events().is_empty());
    }

    #[test]
    fn non_positive_price_is_ignored() {
        let ledger = RewardLedger::new(test_config());
        ledger.update_price(fresh_quote(0.0));
        assert!(ledger.state().last_price.is_none());
    }

    #[test]
    fn payouts_match_the_event_split() {
        let ledger = RewardLedger::new(test_config());
        ledger.update_price(fresh_quote(1.0));
        ledger.record_reward(1000, "job-a");
        let event = &ledger.events()[0];

        let payouts = ledger.payouts(event);
        assert_eq!(payouts.len(), 2); // user portion is zero here
        assert_eq!(payouts[0].kind, PayoutKind::DevFee);
        assert_eq!(payouts[0].address, "kaspa:dev");
        assert_eq!(payouts[0].amount_sompi, 100);
        assert_eq!(payouts[1].kind, PayoutKind::OwnerAllocation);
        assert_eq!(payouts[1].amount_sompi, 900);
    }
}

// src/rewards/mod.rs
//! Reward accounting components
//!
//! This module apportions gross mining rewards into a developer fee, a
//! one-time capped owner allocation, and the operator's net share:
//! - [`RewardLedger`]: deterministic waterfall accounting over an
//!   append-only event log
//! - [`PriceOracle`]: boundary to an external price source used to value
//!   the owner allocation target

/// Waterfall ledger implementation
///
/// Contains the [`RewardLedger`] and its cumulative [`RewardState`],
/// including the exact sum identity maintained after every event.
pub mod ledger;

/// Price oracle boundary and HTTP implementation
///
/// Supplies the reference-currency price used to value the owner
/// allocation target; prices may be stale and never block accounting.
pub mod price;

// Re-export main components for cleaner imports
pub use ledger::{
    PayoutInstruction, PayoutKind, RewardConfig, RewardEvent, RewardLedger, RewardState,
    SOMPI_PER_KAS,
};
pub use price::{HttpPriceOracle, PriceOracle, PriceQuote, refresh_once, run_price_refresh};

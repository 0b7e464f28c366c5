//! Service tier pricing

use crate::defaults::{ECONOMY_MULTIPLIER, PRIORITY_MULTIPLIER};
use crate::types::ServiceTier;

/// Economy shares the van with other bookings and is discounted; priority is
/// a dedicated run at a premium.
pub fn tier_multiplier(tier: ServiceTier) -> f64 {
    match tier {
        ServiceTier::Economy => ECONOMY_MULTIPLIER,
        ServiceTier::Standard => 1.0,
        ServiceTier::Priority => PRIORITY_MULTIPLIER,
    }
}

/// Sum of drop prices adjusted by tier, rounded to pence
pub fn quoted_total(prices: impl IntoIterator<Item = f64>, tier: ServiceTier) -> f64 {
    let base: f64 = prices.into_iter().sum();
    round_pence(base * tier_multiplier(tier))
}

fn round_pence(amount: f64) -> f64 {
    (amount * 100.0).round() / 100.0
}

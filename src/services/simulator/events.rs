//! Admin-triggered market shocks.

use crate::config::ShockMultipliers;
use crate::types::{round2, MarketEventType, StockPrice};

/// Price multiplier for an event. `None` is the identity.
pub fn multiplier(event: MarketEventType, shocks: &ShockMultipliers) -> f64 {
    match event {
        MarketEventType::Crash => shocks.crash,
        MarketEventType::Boost => shocks.boost,
        MarketEventType::Dip => shocks.dip,
        MarketEventType::None => 1.0,
    }
}

/// Scale one row by `multiplier` and set its daily change to the implied
/// percentage. Degenerate rows are left alone.
///
/// With a `band`, the shocked price is clamped into it and the change
/// reflects the move actually applied.
pub fn apply_shock(
    price: &mut StockPrice,
    multiplier: f64,
    band: Option<(f64, f64)>,
    usd_per_gbp: f64,
) -> bool {
    if price.is_degenerate() {
        return false;
    }
    let before = price.price_gbp;
    let shocked = before * multiplier;
    match band {
        Some((floor, ceiling)) if shocked < floor || shocked > ceiling => {
            price.reprice(shocked.clamp(floor, ceiling), usd_per_gbp);
            price.daily_change_percent = round2((price.price_gbp / before - 1.0) * 100.0);
        }
        _ => {
            price.reprice(shocked, usd_per_gbp);
            price.daily_change_percent = round2((multiplier - 1.0) * 100.0);
        }
    }
    true
}

//! Generic daily-volatility walk applied to every non-flagship symbol.

use rand::Rng;

use crate::config::GameRules;
use crate::types::{round2, StockPrice};

/// Move one row by a uniform percentage change and drift its daily change.
///
/// Returns `false` and leaves the row untouched when it is degenerate.
pub fn walk<R: Rng + ?Sized>(
    price: &mut StockPrice,
    rules: &GameRules,
    usd_per_gbp: f64,
    rng: &mut R,
) -> bool {
    if price.is_degenerate() {
        return false;
    }

    let (lo, hi) = rules.walk_change_pct;
    let change_pct = rng.gen_range(lo..=hi);
    let (drift_lo, drift_hi) = rules.walk_drift_pct;
    let drift = rng.gen_range(drift_lo..=drift_hi);

    let new_price = price.price_gbp * (1.0 + change_pct / 100.0);
    price.reprice(new_price, usd_per_gbp);
    price.daily_change_percent = round2(price.daily_change_percent + drift);
    true
}

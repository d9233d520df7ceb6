//! Gradual realisation of analyst targets.
//!
//! Each tick moves a symbol's daily change a fixed fraction of the way toward
//! a momentum-dependent target, plus noise, without passing the target. The
//! price is then rederived from the session base implied by the old change.

use rand::Rng;

use crate::config::SimulatorConfig;
use crate::types::{round2, StockPrice};

/// Daily change beyond which a move counts as strong, in percent.
pub const STRONG_MOVE_PCT: f64 = 2.0;

/// Cap on any analyst target, in percent.
pub const MAX_TARGET_PCT: f64 = 8.0;

/// Target daily change for a symbol currently at `current` percent.
///
/// Strong rallies are extended, weak gains aim for a modest +2.5%, strong
/// sell-offs recover half their loss and mild dips flip to a small gain.
pub fn analyst_target(current: f64) -> f64 {
    if current >= STRONG_MOVE_PCT {
        (current * 1.5).min(MAX_TARGET_PCT)
    } else if current >= 0.0 {
        2.5
    } else if current <= -STRONG_MOVE_PCT {
        current * 0.5
    } else {
        1.0
    }
}

/// One step of size `fraction` toward `target` plus `noise`, clamped so the
/// result never moves past the target.
pub fn step_toward(current: f64, target: f64, fraction: f64, noise: f64) -> f64 {
    let next = current + (target - current) * fraction + noise;
    if target >= current {
        next.min(target)
    } else {
        next.max(target)
    }
}

/// Apply one realisation tick to a row. Returns `false` for degenerate rows.
///
/// With a `band`, the new price is clamped into it and the daily change is
/// rederived from the clamped price.
pub fn realize<R: Rng + ?Sized>(
    price: &mut StockPrice,
    config: &SimulatorConfig,
    band: Option<(f64, f64)>,
    usd_per_gbp: f64,
    rng: &mut R,
) -> bool {
    if price.is_degenerate() {
        return false;
    }

    let current = price.daily_change_percent;
    let base_factor = 1.0 + current / 100.0;
    if base_factor <= 0.0 {
        return false;
    }
    let session_base = price.price_gbp / base_factor;

    let target = analyst_target(current);
    let (noise_lo, noise_hi) = config.trend_noise_pct;
    let noise = rng.gen_range(noise_lo..=noise_hi);
    let next = step_toward(current, target, config.trend_step, noise);

    let target_price = session_base * (1.0 + next / 100.0);
    match band {
        Some((floor, ceiling)) if target_price < floor || target_price > ceiling => {
            let clamped = target_price.clamp(floor, ceiling);
            price.reprice(clamped, usd_per_gbp);
            price.daily_change_percent = round2((price.price_gbp / session_base - 1.0) * 100.0);
        }
        _ => {
            price.reprice(target_price, usd_per_gbp);
            price.daily_change_percent = round2(next);
        }
    }
    true
}

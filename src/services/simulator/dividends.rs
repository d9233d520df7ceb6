//! Multi-factor hourly dividend yield.
//!
//! The yield starts from a base rate and is scaled by the symbol's sector,
//! its momentum and volatility, its size, how long holders have kept it and
//! the time of day, then jittered and clamped. Yields are percentages per
//! hour, so `0.0001` means 0.0001 % of the position value per hour.

use rand::Rng;

use crate::types::round_dp;

/// Base hourly yield before any factor, in percent.
pub const BASE_HOURLY_YIELD: f64 = 0.0001;

/// Everything the model reads about one symbol.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct YieldInputs<'a> {
    pub symbol: &'a str,
    pub price_gbp: f64,
    pub daily_change_percent: f64,
    /// Mean age of open holdings in this symbol, in days. `None` if unheld.
    pub average_holding_days: Option<f64>,
    /// UTC hour of the computation, 0..24.
    pub hour: u32,
}

/// Sector multiplier by symbol. Income-heavy sectors pay more.
pub fn sector_multiplier(symbol: &str) -> f64 {
    match symbol {
        "VOD" | "BT" => 1.8,               // telecoms
        "BP" | "SHEL" | "XOM" => 1.6,      // energy
        "HSBA" | "LLOY" | "BARC" | "JPM" => 1.4, // banks
        "ABPF" => 1.5,
        "AAPL" | "MSFT" => 0.8,
        "GOOGL" | "AMZN" | "TSLA" | "NVDA" => 0.5, // growth tech
        _ => 1.0,
    }
}

/// Rising stocks pay slightly more, falling ones slightly less.
pub fn momentum_factor(daily_change_percent: f64) -> f64 {
    1.0 + (daily_change_percent / 10.0).clamp(-0.3, 0.3)
}

/// Fraction removed for volatile symbols, up to half.
pub fn volatility_penalty(daily_change_percent: f64) -> f64 {
    (daily_change_percent.abs() / 20.0).min(0.5)
}

/// Higher-priced (proxy for larger) names pay a steadier, higher yield
/// than penny stocks.
pub fn market_cap_factor(price_gbp: f64) -> f64 {
    if price_gbp >= 200.0 {
        1.2
    } else if price_gbp >= 50.0 {
        1.1
    } else if price_gbp >= 1.0 {
        1.0
    } else {
        0.8
    }
}

/// Loyalty bonus growing to +50 % after 30 days of holding.
pub fn holding_duration_bonus(average_holding_days: Option<f64>) -> f64 {
    match average_holding_days {
        Some(days) if days.is_finite() && days > 0.0 => 1.0 + (days / 30.0).min(1.0) * 0.5,
        _ => 1.0,
    }
}

/// London trading hours pay full rate, evenings and nights less.
pub fn time_of_day_factor(hour: u32) -> f64 {
    match hour {
        8..=16 => 1.0,
        17..=21 => 0.8,
        _ => 0.6,
    }
}

/// Hourly yield for one symbol, clamped to `bounds` and rounded to 6 dp.
pub fn hourly_yield<R: Rng + ?Sized>(inputs: &YieldInputs<'_>, bounds: (f64, f64), rng: &mut R) -> f64 {
    let (lo, hi) = bounds;
    let change = if inputs.daily_change_percent.is_finite() {
        inputs.daily_change_percent
    } else {
        0.0
    };

    let raw = BASE_HOURLY_YIELD
        * sector_multiplier(inputs.symbol)
        * momentum_factor(change)
        * (1.0 - volatility_penalty(change))
        * market_cap_factor(inputs.price_gbp)
        * holding_duration_bonus(inputs.average_holding_days)
        * time_of_day_factor(inputs.hour)
        * rng.gen_range(0.9..=1.1);

    round_dp(raw.clamp(lo, hi), 6)
}

//! Flagship ticker engine.
//!
//! A mean-reverting, momentum-carrying price process for the house symbol.
//! Each tick blends:
//! - a technical signal from EMA-9/21, RSI-14, MACD(12,26,9) and Bollinger(20,2)
//! - random institutional and retail order flow
//! - momentum decayed every tick
//! - GARCH(1,1) volatility clustering
//! - a time-of-day / day-of-week activity multiplier
//! - reversion toward a fixed fundamental price
//! - occasional news shocks that decay geometrically
//!
//! The result is pulled back at support/resistance levels and clamped to a
//! hard band. [`tick`] is pure given its RNG; the state it returns is meant
//! to be persisted between ticks.

use chrono::{DateTime, Datelike, NaiveDate, Timelike, Utc, Weekday};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

use super::indicators::{bollinger, ema, macd, rsi, Bands};
use crate::config::SimulatorConfig;
use crate::types::round2;

/// Persisted engine state for one symbol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlagshipState {
    /// Last emitted price
    pub price: f64,
    /// Recent closes, oldest first, ending with `price`
    pub history: VecDeque<f64>,
    pub momentum: f64,
    /// GARCH conditional variance of per-tick returns
    pub variance: f64,
    pub last_return: f64,
    pub sentiment: f64,
    /// Residual drift from past news, decays every tick
    pub news_impact: f64,
    /// Price at the start of the current UTC day
    pub session_open: f64,
    pub session_date: Option<NaiveDate>,
    pub ticks: u64,
}

impl FlagshipState {
    /// Fresh state at `price`, variance at its GARCH long-run level.
    pub fn new(price: f64, config: &SimulatorConfig) -> Self {
        let price = price.clamp(config.price_floor, config.price_ceiling);
        let (omega, alpha, beta) = config.garch;
        let persistence = (1.0 - alpha - beta).max(1e-6);

        Self {
            price,
            history: VecDeque::from(vec![price]),
            momentum: 0.0,
            variance: omega / persistence,
            last_return: 0.0,
            sentiment: 0.0,
            news_impact: 0.0,
            session_open: price,
            session_date: None,
            ticks: 0,
        }
    }
}

/// Indicator values read at the start of a tick.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IndicatorSnapshot {
    pub ema9: f64,
    pub ema21: f64,
    pub rsi14: f64,
    pub macd: f64,
    pub macd_signal: f64,
    pub macd_histogram: f64,
    pub bollinger_upper: f64,
    pub bollinger_middle: f64,
    pub bollinger_lower: f64,
}

impl IndicatorSnapshot {
    /// Compute from closes, falling back to neutral values on short history.
    pub fn compute(closes: &[f64], price: f64) -> Self {
        let macd = macd(closes, 12, 26, 9);
        let bands = bollinger(closes, 20, 2.0).unwrap_or(Bands {
            upper: price,
            middle: price,
            lower: price,
        });

        Self {
            ema9: ema(closes, 9).unwrap_or(price),
            ema21: ema(closes, 21).unwrap_or(price),
            rsi14: rsi(closes, 14).unwrap_or(50.0),
            macd: macd.map(|m| m.macd).unwrap_or(0.0),
            macd_signal: macd.map(|m| m.signal).unwrap_or(0.0),
            macd_histogram: macd.map(|m| m.histogram).unwrap_or(0.0),
            bollinger_upper: bands.upper,
            bollinger_middle: bands.middle,
            bollinger_lower: bands.lower,
        }
    }

    /// Combined technical signal in [-1, 1]. Trend-following on the EMAs and
    /// MACD, contrarian on RSI and band position.
    pub fn signal(&self, price: f64) -> f64 {
        let trend = if self.ema21 > 0.0 {
            ((self.ema9 - self.ema21) / self.ema21 * 100.0).clamp(-1.0, 1.0)
        } else {
            0.0
        };
        let rsi = ((50.0 - self.rsi14) / 50.0).clamp(-1.0, 1.0);
        let macd = if price > 0.0 {
            (self.macd_histogram / price * 200.0).clamp(-1.0, 1.0)
        } else {
            0.0
        };
        let bands = Bands {
            upper: self.bollinger_upper,
            middle: self.bollinger_middle,
            lower: self.bollinger_lower,
        };
        let band = if self.bollinger_upper > self.bollinger_middle {
            (-bands.position(price) / 2.0).clamp(-1.0, 1.0)
        } else {
            0.0
        };

        (0.35 * trend + 0.25 * rsi + 0.2 * macd + 0.2 * band).clamp(-1.0, 1.0)
    }
}

/// A news event drawn on this tick.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewsShock {
    /// Signed fractional return impact
    pub impact: f64,
}

/// What one tick produced.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TickObservables {
    pub price: f64,
    /// Change since the session open, in percent
    pub change_percent: f64,
    pub tick_return: f64,
    pub indicators: IndicatorSnapshot,
    pub technical_signal: f64,
    pub order_flow: f64,
    pub momentum: f64,
    pub volatility: f64,
    pub time_multiplier: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub news: Option<NewsShock>,
    /// Support/resistance level the move crossed, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub level_hit: Option<f64>,
}

// Caps the GARCH variance at 5% per-tick standard deviation
const MAX_VARIANCE: f64 = 0.0025;

/// Advance the engine by one tick.
pub fn tick<R: Rng + ?Sized>(
    state: &FlagshipState,
    config: &SimulatorConfig,
    now: DateTime<Utc>,
    rng: &mut R,
) -> (FlagshipState, TickObservables) {
    let mut next = state.clone();

    let price = if state.price.is_finite() && state.price > 0.0 {
        state.price
    } else {
        config.fundamental_price
    };

    let today = now.date_naive();
    if next.session_date != Some(today) || next.session_open <= 0.0 {
        next.session_date = Some(today);
        next.session_open = price;
    }

    let closes: Vec<f64> = state.history.iter().copied().collect();
    let indicators = IndicatorSnapshot::compute(&closes, price);
    let technical = indicators.signal(price);

    // Institutions lean toward the fundamental, retail herds on the last move
    let value_gap = (config.fundamental_price - price) / config.fundamental_price;
    let institutional = rng.gen_range(-1.0..=1.0) * 0.6 + (value_gap * 10.0).clamp(-0.4, 0.4);
    let retail = rng.gen_range(-1.0..=1.0) * 0.4 + signum_or_zero(state.last_return) * 0.2;
    let order_flow = (institutional + retail).clamp(-1.0, 1.0);

    next.news_impact *= config.news_decay;
    let news = if rng.gen_bool(config.news_probability.clamp(0.0, 1.0)) {
        let magnitude = rng.gen_range(0.001..=0.004);
        let impact = if rng.gen_bool(0.5) { magnitude } else { -magnitude };
        next.news_impact += impact;
        Some(NewsShock { impact })
    } else {
        None
    };

    next.sentiment = (0.95 * state.sentiment
        + 0.05 * rng.gen_range(-1.0..=1.0)
        + next.news_impact * 5.0)
        .clamp(-1.0, 1.0);

    let drive = 0.5 * technical + 0.3 * order_flow + 0.2 * next.sentiment;
    next.momentum = (config.momentum_decay * state.momentum
        + (1.0 - config.momentum_decay) * drive)
        .clamp(-1.0, 1.0);

    let (omega, alpha, beta) = config.garch;
    next.variance = (omega + alpha * state.last_return.powi(2) + beta * state.variance)
        .max(omega)
        .min(MAX_VARIANCE);
    let volatility = next.variance.sqrt();

    let time_multiplier = session_multiplier(now);
    let reversion = config.mean_reversion * value_gap * config.fundamental_price / price;
    // Uniform on [-sqrt(3), sqrt(3)] has unit variance
    let noise = rng.gen_range(-1.0..=1.0) * 3f64.sqrt();

    let tick_return = next.momentum * 0.004
        + reversion
        + next.news_impact
        + volatility * noise * time_multiplier;

    let mut new_price = price * (1.0 + tick_return);
    let level_hit = crossed_level(&config.key_levels, price, new_price);
    if let Some(level) = level_hit {
        new_price = level + (new_price - level) * 0.5;
    }
    if !new_price.is_finite() {
        new_price = price;
    }
    let new_price = round2(new_price.clamp(config.price_floor, config.price_ceiling));

    next.last_return = (new_price - price) / price;
    next.price = new_price;
    next.history.push_back(new_price);
    while next.history.len() > config.history_window.max(1) {
        next.history.pop_front();
    }
    next.ticks += 1;

    let change_percent = round2((new_price - next.session_open) / next.session_open * 100.0);

    let observables = TickObservables {
        price: new_price,
        change_percent,
        tick_return: next.last_return,
        indicators,
        technical_signal: technical,
        order_flow,
        momentum: next.momentum,
        volatility,
        time_multiplier,
        news,
        level_hit,
    };

    (next, observables)
}

/// Trading-activity multiplier for the London session (UTC).
pub fn session_multiplier(now: DateTime<Utc>) -> f64 {
    let day = match now.weekday() {
        Weekday::Sat | Weekday::Sun => return 0.3,
        Weekday::Mon => 1.1,
        Weekday::Fri => 0.9,
        _ => 1.0,
    };

    let minutes = now.hour() * 60 + now.minute();
    let intraday = match minutes {
        480..=539 => 1.3,  // opening hour
        720..=839 => 0.7,  // lunch
        960..=990 => 1.2,  // close auction
        540..=959 => 1.0,
        _ => 0.5,          // after hours
    };

    day * intraday
}

/// First key level the move from `from` to `to` crosses, nearest to `from`.
fn crossed_level(levels: &[f64], from: f64, to: f64) -> Option<f64> {
    if to > from {
        levels.iter().copied().filter(|l| *l > from && *l <= to).reduce(f64::min)
    } else if to < from {
        levels.iter().copied().filter(|l| *l < from && *l >= to).reduce(f64::max)
    } else {
        None
    }
}

fn signum_or_zero(value: f64) -> f64 {
    if value > 0.0 {
        1.0
    } else if value < 0.0 {
        -1.0
    } else {
        0.0
    }
}

//! Market Types
//!
//! Per-symbol price snapshots and market-wide shock events.

use serde::{Deserialize, Serialize};

use super::money::round2;

/// Current price snapshot for one symbol. One row per symbol, no history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StockPrice {
    /// Ticker symbol (unique key)
    pub symbol: String,
    /// Price in GBP
    pub price_gbp: f64,
    /// Price in USD, derived from GBP at the current exchange rate
    pub price_usd: f64,
    /// Change since the session open, in percent
    pub daily_change_percent: f64,
    /// Dividend yield paid per hourly sweep, in percent
    pub dividend_yield_hourly: f64,
    /// Last update timestamp (ms)
    pub updated_at: i64,
}

impl StockPrice {
    /// Create a new snapshot with no change and no dividend yield.
    pub fn new(symbol: impl Into<String>, price_gbp: f64, usd_per_gbp: f64) -> Self {
        let price_gbp = round2(price_gbp);
        Self {
            symbol: symbol.into().to_uppercase(),
            price_gbp,
            price_usd: round2(price_gbp * usd_per_gbp),
            daily_change_percent: 0.0,
            dividend_yield_hourly: 0.0,
            updated_at: chrono::Utc::now().timestamp_millis(),
        }
    }

    /// A row whose price cannot be moved multiplicatively.
    pub fn is_degenerate(&self) -> bool {
        !self.price_gbp.is_finite() || self.price_gbp <= 0.0 || !self.daily_change_percent.is_finite()
    }

    /// Set a new GBP price, rederiving USD and touching `updated_at`.
    pub fn reprice(&mut self, price_gbp: f64, usd_per_gbp: f64) {
        self.price_gbp = round2(price_gbp.max(0.01));
        self.price_usd = round2(self.price_gbp * usd_per_gbp);
        self.updated_at = chrono::Utc::now().timestamp_millis();
    }
}

/// Admin-triggered market-wide shock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MarketEventType {
    Crash,
    Boost,
    Dip,
    None,
}

impl std::fmt::Display for MarketEventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MarketEventType::Crash => write!(f, "crash"),
            MarketEventType::Boost => write!(f, "boost"),
            MarketEventType::Dip => write!(f, "dip"),
            MarketEventType::None => write!(f, "none"),
        }
    }
}

/// Body of `POST /api/market/events`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketEventRequest {
    pub event_type: MarketEventType,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stock_price_new_rounds_and_converts() {
        let price = StockPrice::new("aapl", 150.004, 1.27);
        assert_eq!(price.symbol, "AAPL");
        assert_eq!(price.price_gbp, 150.0);
        assert_eq!(price.price_usd, 190.5);
        assert_eq!(price.daily_change_percent, 0.0);
    }

    #[test]
    fn test_degenerate_prices() {
        let mut price = StockPrice::new("X", 10.0, 1.0);
        assert!(!price.is_degenerate());
        price.price_gbp = 0.0;
        assert!(price.is_degenerate());
        price.price_gbp = f64::NAN;
        assert!(price.is_degenerate());
    }

    #[test]
    fn test_market_event_serialization() {
        assert_eq!(serde_json::to_string(&MarketEventType::Crash).unwrap(), "\"crash\"");
        let parsed: MarketEventRequest = serde_json::from_str(r#"{"eventType":"dip"}"#).unwrap();
        assert_eq!(parsed.event_type, MarketEventType::Dip);
    }
}

//! GBP/USD exchange rate.
//!
//! Holds the current USD-per-GBP rate used to derive `price_usd`. The rate
//! starts at the configured value and can be refreshed from an HTTP endpoint
//! returning `{"rates": {"USD": 1.27}}`. A failed refresh keeps the last rate.

use reqwest::Client;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};
use tracing::{debug, info, warn};

use crate::error::{AppError, Result};

#[derive(Debug, Deserialize)]
struct RatesResponse {
    rates: HashMap<String, f64>,
}

/// Shared exchange-rate holder.
pub struct FxRates {
    client: Client,
    url: Option<String>,
    usd_per_gbp: RwLock<f64>,
}

impl FxRates {
    pub fn new(usd_per_gbp: f64, url: Option<String>) -> Self {
        let client = Client::builder()
            .user_agent("Tradeground/0.1 (FX refresh)")
            .timeout(std::time::Duration::from_secs(10))
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            client,
            url,
            usd_per_gbp: RwLock::new(usd_per_gbp),
        }
    }

    /// Current USD per GBP.
    pub fn usd_per_gbp(&self) -> f64 {
        *self.usd_per_gbp.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// Replace the rate. Non-finite or non-positive values are ignored.
    pub fn set_usd_per_gbp(&self, rate: f64) -> bool {
        if !rate.is_finite() || rate <= 0.0 {
            warn!("Ignoring invalid USD/GBP rate {}", rate);
            return false;
        }
        *self.usd_per_gbp.write().unwrap_or_else(PoisonError::into_inner) = rate;
        true
    }

    /// Whether a refresh endpoint is configured.
    pub fn is_remote(&self) -> bool {
        self.url.is_some()
    }

    /// Fetch the latest rate. Returns the rate in effect afterwards.
    pub async fn refresh(&self) -> Result<f64> {
        let Some(url) = self.url.as_deref() else {
            debug!("No FX endpoint configured, keeping {}", self.usd_per_gbp());
            return Ok(self.usd_per_gbp());
        };

        let response = self
            .client
            .get(url)
            .header("Accept", "application/json")
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            warn!("FX endpoint returned {}", status);
            return Err(AppError::ExternalApi(format!("FX endpoint error: {}", status)));
        }

        let body: RatesResponse = response.json().await?;
        let rate = body
            .rates
            .get("USD")
            .copied()
            .ok_or_else(|| AppError::ExternalApi("FX response has no USD rate".to_string()))?;

        if !self.set_usd_per_gbp(rate) {
            return Err(AppError::ExternalApi(format!("FX endpoint sent invalid rate {}", rate)));
        }
        info!("USD/GBP rate refreshed to {}", rate);
        Ok(rate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_rates_are_ignored() {
        let fx = FxRates::new(1.27, None);
        assert!(!fx.set_usd_per_gbp(0.0));
        assert!(!fx.set_usd_per_gbp(f64::NAN));
        assert_eq!(fx.usd_per_gbp(), 1.27);
        assert!(fx.set_usd_per_gbp(1.31));
        assert_eq!(fx.usd_per_gbp(), 1.31);
    }

    #[tokio::test]
    async fn test_refresh_without_endpoint_keeps_rate() {
        let fx = FxRates::new(1.25, None);
        assert!(!fx.is_remote());
        assert_eq!(fx.refresh().await.unwrap(), 1.25);
    }

    #[test]
    fn test_rates_response_parsing() {
        let body: RatesResponse = serde_json::from_str(r#"{"base":"GBP","rates":{"USD":1.2712,"EUR":1.17}}"#).unwrap();
        assert_eq!(body.rates.get("USD"), Some(&1.2712));
    }
}

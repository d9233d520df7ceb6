//! Market simulator service.
//!
//! Owns every routine that mutates the `stock_prices` table: the generic
//! random walk, the flagship engine, analyst trend realisation, dividend
//! yield assignment and admin shocks. Each routine reads the full table,
//! computes per row and writes back inside one store transaction. Rows that
//! cannot be moved are skipped and counted out of the result.

pub mod dividends;
pub mod events;
pub mod flagship;
pub mod indicators;
pub mod random_walk;
pub mod trend;

use chrono::{DateTime, Timelike, Utc};
use dashmap::DashMap;
use rand::Rng;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::config::{GameRules, SimulatorConfig};
use crate::error::Result;
use crate::services::fx::FxRates;
use crate::services::sqlite_store::{SqliteStore, Tables};
use crate::types::{round_dp, MarketEventType, StockPrice};

pub use dividends::YieldInputs;
pub use flagship::{FlagshipState, TickObservables};

const MS_PER_DAY: f64 = 86_400_000.0;

/// Drives all synthetic price movement.
pub struct MarketSimulator {
    store: Arc<SqliteStore>,
    fx: Arc<FxRates>,
    rules: GameRules,
    config: SimulatorConfig,
    /// Flagship engine state by symbol, mirrored to `simulator_state`
    flagship_cache: DashMap<String, FlagshipState>,
}

impl MarketSimulator {
    pub fn new(
        store: Arc<SqliteStore>,
        fx: Arc<FxRates>,
        rules: GameRules,
        config: SimulatorConfig,
    ) -> Self {
        Self {
            store,
            fx,
            rules,
            config,
            flagship_cache: DashMap::new(),
        }
    }

    /// Hard price band for `symbol`, set only for the flagship.
    fn band_for(&self, symbol: &str) -> Option<(f64, f64)> {
        (symbol == self.config.flagship_symbol)
            .then_some((self.config.price_floor, self.config.price_ceiling))
    }

    pub fn flagship_symbol(&self) -> &str {
        &self.config.flagship_symbol
    }

    /// Current snapshot of every symbol.
    pub fn prices(&self) -> Result<Vec<StockPrice>> {
        Ok(self.store.read(|t| t.list_prices())?)
    }

    /// Insert `seeds` when the price table is empty. Returns rows inserted.
    pub fn seed_prices(&self, seeds: &[(String, f64)]) -> Result<usize> {
        let usd_per_gbp = self.fx.usd_per_gbp();
        let inserted = self.store.atomically(|t| -> Result<usize> {
            if t.price_count()? > 0 {
                return Ok(0);
            }
            let mut inserted = 0;
            for (symbol, price_gbp) in seeds {
                if !price_gbp.is_finite() || *price_gbp <= 0.0 {
                    warn!("Skipping seed {} with invalid price {}", symbol, price_gbp);
                    continue;
                }
                t.upsert_price(&StockPrice::new(symbol.as_str(), *price_gbp, usd_per_gbp))?;
                inserted += 1;
            }
            Ok(inserted)
        })?;

        if inserted > 0 {
            info!("Seeded {} stock prices", inserted);
        }
        Ok(inserted)
    }

    // =========================================================================
    // Random walk
    // =========================================================================

    pub fn simulate_price_movement(&self) -> Result<usize> {
        self.simulate_price_movement_with(&mut rand::thread_rng())
    }

    /// Walk every symbol except the flagship. Returns rows updated.
    pub fn simulate_price_movement_with<R: Rng + ?Sized>(&self, rng: &mut R) -> Result<usize> {
        let usd_per_gbp = self.fx.usd_per_gbp();
        let flagship = self.config.flagship_symbol.as_str();

        let updated = self.store.atomically(|t| -> Result<usize> {
            let mut updated = 0;
            for mut price in t.list_prices()? {
                if price.symbol == flagship {
                    continue;
                }
                if random_walk::walk(&mut price, &self.rules, usd_per_gbp, rng) {
                    t.upsert_price(&price)?;
                    updated += 1;
                } else {
                    warn!("Skipping degenerate price row {}", price.symbol);
                }
            }
            Ok(updated)
        })?;

        debug!("Random walk updated {} prices", updated);
        Ok(updated)
    }

    // =========================================================================
    // Flagship engine
    // =========================================================================

    pub fn tick_flagship(&self) -> Result<TickObservables> {
        self.tick_flagship_with(&mut rand::thread_rng(), Utc::now())
    }

    /// Advance the flagship engine one tick and persist both its state and
    /// the resulting price row.
    pub fn tick_flagship_with<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
        now: DateTime<Utc>,
    ) -> Result<TickObservables> {
        let symbol = self.config.flagship_symbol.clone();
        let usd_per_gbp = self.fx.usd_per_gbp();

        let result = self.store.atomically(|t| -> Result<TickObservables> {
            let row = t.get_price(&symbol)?;
            let mut state = self.load_flagship_state(t, &symbol, row.as_ref())?;

            // Other routines may have moved the row since the last tick
            if let Some(row) = row.as_ref().filter(|r| !r.is_degenerate()) {
                if (row.price_gbp - state.price).abs() > f64::EPSILON {
                    state.price = row.price_gbp;
                }
            }

            let (next, observables) = flagship::tick(&state, &self.config, now, rng);

            let mut row = row.unwrap_or_else(|| StockPrice::new(symbol.as_str(), next.price, usd_per_gbp));
            row.reprice(next.price, usd_per_gbp);
            row.daily_change_percent = observables.change_percent;
            t.upsert_price(&row)?;
            t.save_simulator_state(&symbol, &serde_json::to_string(&next)?)?;
            // Updated under the store lock so the next tick reads this state
            self.flagship_cache.insert(symbol.clone(), next);

            Ok(observables)
        });

        let observables = match result {
            Ok(observables) => observables,
            Err(e) => {
                // The cache may be ahead of a rolled back transaction
                self.flagship_cache.remove(&symbol);
                return Err(e);
            }
        };

        debug!(
            "Flagship {} ticked to {} ({:+.2}%)",
            symbol, observables.price, observables.change_percent
        );
        Ok(observables)
    }

    /// Persisted engine state for `symbol`, if it has ever ticked.
    pub fn flagship_state(&self, symbol: &str) -> Result<Option<FlagshipState>> {
        if let Some(state) = self.flagship_cache.get(symbol) {
            return Ok(Some(state.clone()));
        }
        let json = self.store.read(|t| t.load_simulator_state(symbol))?;
        Ok(json.and_then(|j| parse_state(symbol, &j)))
    }

    fn load_flagship_state(
        &self,
        t: &Tables<'_>,
        symbol: &str,
        row: Option<&StockPrice>,
    ) -> Result<FlagshipState> {
        if let Some(state) = self.flagship_cache.get(symbol) {
            return Ok(state.clone());
        }
        if let Some(state) = t
            .load_simulator_state(symbol)?
            .and_then(|json| parse_state(symbol, &json))
        {
            return Ok(state);
        }

        let start = row
            .filter(|r| !r.is_degenerate())
            .map(|r| r.price_gbp)
            .unwrap_or(self.config.fundamental_price);
        info!("Starting flagship engine for {} at {}", symbol, start);
        Ok(FlagshipState::new(start, &self.config))
    }

    // =========================================================================
    // Analyst trends
    // =========================================================================

    pub fn realize_analyst_trends(&self) -> Result<usize> {
        self.realize_analyst_trends_with(&mut rand::thread_rng())
    }

    /// Step every held symbol, plus the flagship, toward its analyst target.
    pub fn realize_analyst_trends_with<R: Rng + ?Sized>(&self, rng: &mut R) -> Result<usize> {
        let usd_per_gbp = self.fx.usd_per_gbp();

        let updated = self.store.atomically(|t| -> Result<usize> {
            let mut symbols = t.held_symbols()?;
            if !symbols.contains(&self.config.flagship_symbol) {
                symbols.push(self.config.flagship_symbol.clone());
            }

            let mut updated = 0;
            for symbol in &symbols {
                let Some(mut price) = t.get_price(symbol)? else {
                    continue;
                };
                let band = self.band_for(symbol);
                if trend::realize(&mut price, &self.config, band, usd_per_gbp, rng) {
                    t.upsert_price(&price)?;
                    updated += 1;
                } else {
                    warn!("Skipping trend for degenerate row {}", symbol);
                }
            }
            Ok(updated)
        })?;

        debug!("Analyst trends moved {} prices", updated);
        Ok(updated)
    }

    // =========================================================================
    // Dividend yields
    // =========================================================================

    pub fn assign_dividend_yields(&self) -> Result<usize> {
        self.assign_dividend_yields_with(&mut rand::thread_rng(), Utc::now())
    }

    /// Recompute `dividend_yield_hourly` for every symbol.
    pub fn assign_dividend_yields_with<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
        now: DateTime<Utc>,
    ) -> Result<usize> {
        let now_ms = now.timestamp_millis();
        let bounds = self.config.dividend_yield_bounds;

        let updated = self.store.atomically(|t| -> Result<usize> {
            // Mean holding age per symbol, in days
            let mut ages: HashMap<String, (f64, usize)> = HashMap::new();
            for holding in t.list_all_holdings()? {
                let days = ((now_ms - holding.created_at) as f64 / MS_PER_DAY).max(0.0);
                let entry = ages.entry(holding.symbol).or_insert((0.0, 0));
                entry.0 += days;
                entry.1 += 1;
            }

            let mut updated = 0;
            for mut price in t.list_prices()? {
                if price.is_degenerate() {
                    warn!("Skipping yield for degenerate row {}", price.symbol);
                    continue;
                }
                let inputs = YieldInputs {
                    symbol: &price.symbol,
                    price_gbp: price.price_gbp,
                    daily_change_percent: price.daily_change_percent,
                    average_holding_days: ages.get(&price.symbol).map(|(sum, n)| sum / *n as f64),
                    hour: now.hour(),
                };
                let y = dividends::hourly_yield(&inputs, bounds, rng);
                price.dividend_yield_hourly = round_dp(y, 6);
                price.updated_at = now_ms;
                t.upsert_price(&price)?;
                updated += 1;
            }
            Ok(updated)
        })?;

        debug!("Assigned dividend yields to {} symbols", updated);
        Ok(updated)
    }

    // =========================================================================
    // Shocks
    // =========================================================================

    /// Apply a market-wide shock. Returns the multiplier used.
    pub fn apply_market_event(&self, event: MarketEventType) -> Result<f64> {
        let multiplier = events::multiplier(event, &self.rules.shocks);
        if event == MarketEventType::None {
            return Ok(multiplier);
        }

        let usd_per_gbp = self.fx.usd_per_gbp();
        let updated = self.store.atomically(|t| -> Result<usize> {
            let mut updated = 0;
            for mut price in t.list_prices()? {
                let band = self.band_for(&price.symbol);
                if events::apply_shock(&mut price, multiplier, band, usd_per_gbp) {
                    t.upsert_price(&price)?;
                    updated += 1;
                }
            }
            Ok(updated)
        })?;

        info!("Market event {} applied x{} to {} symbols", event, multiplier, updated);
        Ok(multiplier)
    }
}

fn parse_state(symbol: &str, json: &str) -> Option<FlagshipState> {
    match serde_json::from_str(json) {
        Ok(state) => Some(state),
        Err(e) => {
            warn!("Discarding unreadable simulator state for {}: {}", symbol, e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn create_test_simulator() -> MarketSimulator {
        let store = Arc::new(SqliteStore::new_in_memory().unwrap());
        let fx = Arc::new(FxRates::new(1.0, None));
        MarketSimulator::new(store, fx, GameRules::default(), SimulatorConfig::default())
    }

    fn seeds() -> Vec<(String, f64)> {
        vec![("ABPF".to_string(), 125.0), ("AAPL".to_string(), 150.0)]
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 13, 10, 0, 0).unwrap()
    }

    #[test]
    fn test_empty_table_is_noop() {
        let sim = create_test_simulator();
        let mut rng = StdRng::seed_from_u64(1);
        assert_eq!(sim.simulate_price_movement_with(&mut rng).unwrap(), 0);
        assert_eq!(sim.assign_dividend_yields_with(&mut rng, now()).unwrap(), 0);
        assert_eq!(sim.apply_market_event(MarketEventType::Crash).unwrap(), 0.85);
        assert!(sim.prices().unwrap().is_empty());
    }

    #[test]
    fn test_seed_only_when_empty() {
        let sim = create_test_simulator();
        assert_eq!(sim.seed_prices(&seeds()).unwrap(), 2);
        assert_eq!(sim.seed_prices(&seeds()).unwrap(), 0);
    }

    #[test]
    fn test_walk_skips_flagship() {
        let sim = create_test_simulator();
        sim.seed_prices(&seeds()).unwrap();
        let updated = sim.simulate_price_movement_with(&mut StdRng::seed_from_u64(4)).unwrap();
        assert_eq!(updated, 1);

        let prices = sim.prices().unwrap();
        let flagship = prices.iter().find(|p| p.symbol == "ABPF").unwrap();
        assert_eq!(flagship.price_gbp, 125.0);
    }

    #[test]
    fn test_flagship_state_persists_between_ticks() {
        let sim = create_test_simulator();
        sim.seed_prices(&seeds()).unwrap();
        let mut rng = StdRng::seed_from_u64(21);

        for _ in 0..30 {
            let obs = sim.tick_flagship_with(&mut rng, now()).unwrap();
            assert!(obs.price >= 115.0 && obs.price <= 135.0);
        }

        let state = sim.flagship_state("ABPF").unwrap().unwrap();
        assert_eq!(state.ticks, 30);
        assert_eq!(state.history.len(), 31);

        // A fresh simulator over the same store resumes from the saved state
        let resumed = MarketSimulator::new(
            sim.store.clone(),
            sim.fx.clone(),
            GameRules::default(),
            SimulatorConfig::default(),
        );
        resumed.tick_flagship_with(&mut rng, now()).unwrap();
        assert_eq!(resumed.flagship_state("ABPF").unwrap().unwrap().ticks, 31);
    }

    #[test]
    fn test_none_event_changes_nothing() {
        let sim = create_test_simulator();
        sim.seed_prices(&seeds()).unwrap();
        let before = sim.prices().unwrap();
        assert_eq!(sim.apply_market_event(MarketEventType::None).unwrap(), 1.0);
        assert_eq!(sim.prices().unwrap(), before);
    }

    #[test]
    fn test_boost_applies_to_every_symbol() {
        let sim = create_test_simulator();
        sim.seed_prices(&seeds()).unwrap();
        sim.apply_market_event(MarketEventType::Boost).unwrap();

        let aapl = sim.store.read(|t| t.get_price("AAPL")).unwrap().unwrap();
        assert_eq!(aapl.price_gbp, 168.0);
        assert_eq!(aapl.daily_change_percent, 12.0);

        // 125 * 1.12 = 140 stops at the ceiling
        let flagship = sim.store.read(|t| t.get_price("ABPF")).unwrap().unwrap();
        assert_eq!(flagship.price_gbp, 135.0);
        assert_eq!(flagship.daily_change_percent, 8.0);
    }

    #[test]
    fn test_concurrent_ticks_keep_one_state_history() {
        let sim = create_test_simulator();
        sim.seed_prices(&seeds()).unwrap();

        std::thread::scope(|scope| {
            for _ in 0..4 {
                scope.spawn(|| {
                    for _ in 0..25 {
                        sim.tick_flagship().unwrap();
                    }
                });
            }
        });

        let cached = sim.flagship_state("ABPF").unwrap().unwrap();
        assert_eq!(cached.ticks, 100);

        let stored = sim
            .store
            .read(|t| t.load_simulator_state("ABPF"))
            .unwrap()
            .and_then(|json| parse_state("ABPF", &json))
            .unwrap();
        assert_eq!(stored.ticks, 100);
        assert_eq!(stored.history.len(), cached.history.len());
        assert!((stored.price - cached.price).abs() < 1e-9);
    }

    #[test]
    fn test_yields_within_bounds() {
        let sim = create_test_simulator();
        sim.seed_prices(&seeds()).unwrap();
        let mut rng = StdRng::seed_from_u64(2);
        assert_eq!(sim.assign_dividend_yields_with(&mut rng, now()).unwrap(), 2);
        for price in sim.prices().unwrap() {
            assert!(price.dividend_yield_hourly >= 0.000_01);
            assert!(price.dividend_yield_hourly <= 0.000_3);
        }
    }
}

//! Tradeground - simulated stock-trading game server
//!
//! A synthetic market simulator and a transactional ledger behind a JSON API.

pub mod api;
pub mod config;
pub mod error;
pub mod services;
pub mod types;

use config::Config;
use services::{FxRates, LedgerService, MarketSimulator, SqliteStore};
use std::sync::Arc;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub store: Arc<SqliteStore>,
    pub fx: Arc<FxRates>,
    pub ledger: Arc<LedgerService>,
    pub simulator: Arc<MarketSimulator>,
}

impl AppState {
    /// Wire every service over an already opened store.
    pub fn with_store(config: Config, store: Arc<SqliteStore>) -> Self {
        let fx = Arc::new(FxRates::new(config.usd_per_gbp, config.fx_rate_url.clone()));
        let ledger = Arc::new(LedgerService::new(store.clone(), config.rules.clone()));
        let simulator = Arc::new(MarketSimulator::new(
            store.clone(),
            fx.clone(),
            config.rules.clone(),
            config.simulator.clone(),
        ));

        Self {
            config: Arc::new(config),
            store,
            fx,
            ledger,
            simulator,
        }
    }

    /// Open the database at `config.database_path`.
    pub fn open(config: Config) -> Result<Self, rusqlite::Error> {
        let store = Arc::new(SqliteStore::new(&config.database_path)?);
        Ok(Self::with_store(config, store))
    }

    /// State over a fresh in-memory database (for testing).
    pub fn in_memory(config: Config) -> Result<Self, rusqlite::Error> {
        let store = Arc::new(SqliteStore::new_in_memory()?);
        Ok(Self::with_store(config, store))
    }
}

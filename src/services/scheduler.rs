//! Built-in market scheduler.
//!
//! Spawns one tokio task per periodic routine. A failing run is logged and
//! the loop keeps going. The same routines stay reachable over HTTP for an
//! external scheduler.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info};

use crate::config::SchedulerConfig;
use crate::services::fx::FxRates;
use crate::services::ledger::LedgerService;
use crate::services::simulator::MarketSimulator;

/// Handles to the running loops. Dropping this does not stop them.
pub struct MarketScheduler {
    handles: Vec<JoinHandle<()>>,
}

impl MarketScheduler {
    /// Start every loop. Must be called inside a tokio runtime.
    pub fn spawn(
        config: &SchedulerConfig,
        simulator: Arc<MarketSimulator>,
        ledger: Arc<LedgerService>,
        fx: Arc<FxRates>,
    ) -> Self {
        let mut handles = Vec::new();

        {
            let simulator = simulator.clone();
            handles.push(every("price walk", config.price_walk_every, move || {
                let simulator = simulator.clone();
                async move { simulator.simulate_price_movement().map(|n| format!("{} prices", n)) }
            }));
        }
        {
            let simulator = simulator.clone();
            handles.push(every("flagship tick", config.flagship_every, move || {
                let simulator = simulator.clone();
                async move { simulator.tick_flagship().map(|o| format!("price {}", o.price)) }
            }));
        }
        {
            let simulator = simulator.clone();
            handles.push(every("analyst trends", config.trends_every, move || {
                let simulator = simulator.clone();
                async move { simulator.realize_analyst_trends().map(|n| format!("{} prices", n)) }
            }));
        }
        {
            let simulator = simulator.clone();
            handles.push(every("dividend yields", config.dividend_yields_every, move || {
                let simulator = simulator.clone();
                async move { simulator.assign_dividend_yields().map(|n| format!("{} symbols", n)) }
            }));
        }
        {
            let ledger = ledger.clone();
            handles.push(every("dividend payout", config.dividend_payout_every, move || {
                let ledger = ledger.clone();
                async move {
                    ledger
                        .pay_dividends()
                        .await
                        .map(|s| format!("{:.4} to {} accounts", s.total_payouts, s.payouts_count))
                }
            }));
        }
        if fx.is_remote() {
            handles.push(every("fx refresh", config.fx_refresh_every, move || {
                let fx = fx.clone();
                async move { fx.refresh().await.map(|r| format!("USD/GBP {}", r)) }
            }));
        }

        info!("Market scheduler started {} loops", handles.len());
        Self { handles }
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Stop every loop.
    pub fn shutdown(self) {
        for handle in self.handles {
            handle.abort();
        }
    }
}

/// Run `job` every `period`, skipping the immediate first tick.
fn every<F, Fut, E>(name: &'static str, period: Duration, job: F) -> JoinHandle<()>
where
    F: Fn() -> Fut + Send + 'static,
    Fut: Future<Output = Result<String, E>> + Send,
    E: std::fmt::Display,
{
    let period = period.max(Duration::from_secs(1));
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        interval.tick().await;

        loop {
            interval.tick().await;
            match job().await {
                Ok(summary) => debug!("Scheduled {} done: {}", name, summary),
                Err(e) => error!("Scheduled {} failed: {}", name, e),
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{GameRules, SimulatorConfig};
    use crate::services::sqlite_store::SqliteStore;

    #[tokio::test]
    async fn test_spawn_and_shutdown() {
        let store = Arc::new(SqliteStore::new_in_memory().unwrap());
        let fx = Arc::new(FxRates::new(1.27, None));
        let simulator = Arc::new(MarketSimulator::new(
            store.clone(),
            fx.clone(),
            GameRules::default(),
            SimulatorConfig::default(),
        ));
        let ledger = Arc::new(LedgerService::new(store, GameRules::default()));

        let scheduler = MarketScheduler::spawn(&SchedulerConfig::default(), simulator, ledger, fx);
        // No FX endpoint, so no refresh loop
        assert_eq!(scheduler.len(), 5);
        scheduler.shutdown();
    }
}

use std::env;
use std::time::Duration;

/// Multipliers applied by admin-triggered market shocks.
#[derive(Debug, Clone)]
pub struct ShockMultipliers {
    pub crash: f64,
    pub boost: f64,
    pub dip: f64,
}

impl Default for ShockMultipliers {
    fn default() -> Self {
        Self {
            crash: 0.85,
            boost: 1.12,
            dip: 0.93,
        }
    }
}

/// Ledger and generic-market rules.
#[derive(Debug, Clone)]
pub struct GameRules {
    /// Cash every new account starts with (GBP).
    pub initial_balance: f64,
    /// Share of a copy-trade stake paid to the leader.
    pub copy_trade_commission: f64,
    /// Market shock multipliers.
    pub shocks: ShockMultipliers,
    /// Accounts credited per dividend batch.
    pub dividend_batch_size: usize,
    /// Pause between dividend batches.
    pub dividend_batch_delay: Duration,
    /// Random-walk price change range per tick, in percent.
    pub walk_change_pct: (f64, f64),
    /// Random-walk drift applied to the daily change, in percent.
    pub walk_drift_pct: (f64, f64),
}

impl Default for GameRules {
    fn default() -> Self {
        Self {
            initial_balance: 10_000.0,
            copy_trade_commission: 0.20,
            shocks: ShockMultipliers::default(),
            dividend_batch_size: 10,
            dividend_batch_delay: Duration::from_millis(200),
            walk_change_pct: (-2.0, 3.0),
            walk_drift_pct: (-0.5, 0.5),
        }
    }
}

/// Flagship ticker, trend realisation and dividend-yield model parameters.
#[derive(Debug, Clone)]
pub struct SimulatorConfig {
    /// Symbol driven by the flagship engine.
    pub flagship_symbol: String,
    /// Price the flagship mean-reverts toward.
    pub fundamental_price: f64,
    /// Hard price band for the flagship.
    pub price_floor: f64,
    pub price_ceiling: f64,
    /// Support/resistance levels, ascending.
    pub key_levels: Vec<f64>,
    /// Number of closes kept for indicator computation.
    pub history_window: usize,
    /// Chance of a news shock per tick.
    pub news_probability: f64,
    /// Fraction of a news impact retained each tick.
    pub news_decay: f64,
    /// Fraction of momentum retained each tick.
    pub momentum_decay: f64,
    /// Mean-reversion strength toward the fundamental price.
    pub mean_reversion: f64,
    /// GARCH(1,1) omega, alpha, beta.
    pub garch: (f64, f64, f64),
    /// Fraction of the remaining distance covered per trend tick.
    pub trend_step: f64,
    /// Noise added to each trend step, in percent.
    pub trend_noise_pct: (f64, f64),
    /// Clamp applied to hourly dividend yields, in percent.
    pub dividend_yield_bounds: (f64, f64),
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            flagship_symbol: "ABPF".to_string(),
            fundamental_price: 125.0,
            price_floor: 115.0,
            price_ceiling: 135.0,
            key_levels: vec![117.5, 120.0, 122.5, 125.0, 127.5, 130.0, 132.5],
            history_window: 60,
            news_probability: 0.05,
            news_decay: 0.95,
            momentum_decay: 0.9,
            mean_reversion: 0.02,
            garch: (0.000_002, 0.10, 0.85),
            trend_step: 0.25,
            trend_noise_pct: (-0.7, 1.2),
            dividend_yield_bounds: (0.000_01, 0.000_3),
        }
    }
}

/// Built-in interval scheduler. Disabled when an external scheduler calls the endpoints.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    pub enabled: bool,
    pub price_walk_every: Duration,
    pub flagship_every: Duration,
    pub trends_every: Duration,
    pub dividend_yields_every: Duration,
    pub dividend_payout_every: Duration,
    pub fx_refresh_every: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            price_walk_every: Duration::from_secs(300),
            flagship_every: Duration::from_secs(60),
            trends_every: Duration::from_secs(900),
            dividend_yields_every: Duration::from_secs(3600),
            dividend_payout_every: Duration::from_secs(3600),
            fx_refresh_every: Duration::from_secs(3600),
        }
    }
}

/// Application configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Server host address.
    pub host: String,
    /// Server port.
    pub port: u16,
    /// SQLite database file.
    pub database_path: String,
    /// Owners allowed to trigger market events and resets.
    pub admin_owners: Vec<String>,
    /// Endpoint returning `{"rates":{"USD":..}}` for GBP, if any.
    pub fx_rate_url: Option<String>,
    /// Fixed USD per GBP rate, used until (or instead of) a fetched one.
    pub usd_per_gbp: f64,
    /// Symbols inserted into an empty price table, with GBP prices.
    pub seed_prices: Vec<(String, f64)>,
    pub rules: GameRules,
    pub simulator: SimulatorConfig,
    pub scheduler: SchedulerConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3001,
            database_path: "tradeground.db".to_string(),
            admin_owners: Vec::new(),
            fx_rate_url: None,
            usd_per_gbp: 1.27,
            seed_prices: default_seed_prices(),
            rules: GameRules::default(),
            simulator: SimulatorConfig::default(),
            scheduler: SchedulerConfig::default(),
        }
    }
}

fn default_seed_prices() -> Vec<(String, f64)> {
    [
        ("ABPF", 125.0),
        ("AAPL", 150.0),
        ("MSFT", 320.0),
        ("GOOGL", 110.0),
        ("AMZN", 105.0),
        ("TSLA", 190.0),
        ("NVDA", 350.0),
        ("VOD", 0.72),
        ("BP", 4.85),
        ("HSBA", 6.20),
    ]
    .iter()
    .map(|(s, p)| (s.to_string(), *p))
    .collect()
}

fn env_secs(name: &str, default: Duration) -> Duration {
    env::var(name)
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .map(Duration::from_secs)
        .unwrap_or(default)
}

fn env_f64(name: &str, default: f64) -> f64 {
    env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let defaults = Config::default();

        // Format: "alice@example.com,bob@example.com"
        let admin_owners = env::var("ADMIN_OWNERS")
            .ok()
            .map(|s| {
                s.split(',')
                    .map(|o| o.trim().to_string())
                    .filter(|o| !o.is_empty())
                    .collect()
            })
            .unwrap_or_default();

        // Format: "AAPL:150,MSFT:320"
        let seed_prices = env::var("SEED_PRICES")
            .ok()
            .map(|s| {
                s.split(',')
                    .filter_map(|pair| {
                        let (symbol, price) = pair.split_once(':')?;
                        let price = price.trim().parse::<f64>().ok()?;
                        Some((symbol.trim().to_uppercase(), price))
                    })
                    .collect::<Vec<_>>()
            })
            .filter(|v| !v.is_empty())
            .unwrap_or(defaults.seed_prices);

        let rules = GameRules {
            initial_balance: env_f64("INITIAL_BALANCE", defaults.rules.initial_balance),
            copy_trade_commission: env_f64("COPY_TRADE_COMMISSION", defaults.rules.copy_trade_commission),
            ..defaults.rules
        };

        let simulator = SimulatorConfig {
            flagship_symbol: env::var("FLAGSHIP_SYMBOL")
                .map(|s| s.to_uppercase())
                .unwrap_or(defaults.simulator.flagship_symbol),
            ..defaults.simulator
        };

        let scheduler = SchedulerConfig {
            enabled: env::var("SCHEDULER_ENABLED")
                .map(|v| v == "true" || v == "1")
                .unwrap_or(false),
            price_walk_every: env_secs("PRICE_WALK_SECS", defaults.scheduler.price_walk_every),
            flagship_every: env_secs("FLAGSHIP_TICK_SECS", defaults.scheduler.flagship_every),
            trends_every: env_secs("TRENDS_SECS", defaults.scheduler.trends_every),
            dividend_yields_every: env_secs("DIVIDEND_YIELDS_SECS", defaults.scheduler.dividend_yields_every),
            dividend_payout_every: env_secs("DIVIDEND_PAYOUT_SECS", defaults.scheduler.dividend_payout_every),
            fx_refresh_every: env_secs("FX_REFRESH_SECS", defaults.scheduler.fx_refresh_every),
        };

        Self {
            host: env::var("HOST").unwrap_or(defaults.host),
            port: env::var("PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(defaults.port),
            database_path: env::var("DATABASE_PATH").unwrap_or(defaults.database_path),
            admin_owners,
            fx_rate_url: env::var("FX_RATE_URL").ok().filter(|u| !u.is_empty()),
            usd_per_gbp: env_f64("USD_PER_GBP", defaults.usd_per_gbp),
            seed_prices,
            rules,
            simulator,
            scheduler,
        }
    }

    /// Whether `owner` may trigger privileged operations.
    pub fn is_admin(&self, owner: &str) -> bool {
        self.admin_owners.iter().any(|a| a.eq_ignore_ascii_case(owner))
    }
}

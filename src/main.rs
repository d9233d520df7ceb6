use tokio::sync::broadcast::error::RecvError;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use tradeground::api;
use tradeground::config::Config;
use tradeground::services::MarketScheduler;
use tradeground::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tradeground=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = Config::from_env();
    info!("Starting Tradeground server on {}:{}", config.host, config.port);
    if config.admin_owners.is_empty() {
        warn!("ADMIN_OWNERS is empty, admin endpoints will reject every caller");
    }

    let state = AppState::open(config)?;
    let config = state.config.clone();

    // Seed the price table on first start
    state.simulator.seed_prices(&config.seed_prices)?;

    // Pick up a live exchange rate before the first price write
    if state.fx.is_remote() {
        if let Err(e) = state.fx.refresh().await {
            warn!("Initial FX refresh failed, using {}: {}", state.fx.usd_per_gbp(), e);
        }
    }

    let _scheduler = if config.scheduler.enabled {
        Some(MarketScheduler::spawn(
            &config.scheduler,
            state.simulator.clone(),
            state.ledger.clone(),
            state.fx.clone(),
        ))
    } else {
        info!("Built-in scheduler disabled, expecting external calls");
        None
    };

    // Log ledger notifications
    {
        let mut events = state.ledger.subscribe();
        tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(event) => tracing::debug!("Ledger event: {:?}", event),
                    Err(RecvError::Lagged(skipped)) => warn!("Ledger event log skipped {}", skipped),
                    Err(RecvError::Closed) => break,
                }
            }
        });
    }

    // Build CORS layer
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Build the router
    let app = api::router()
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    // Start the server
    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Tradeground server listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}

use crate::AppState;
use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
    /// Symbols in the price table, `None` if the store is unreadable
    tracked_symbols: Option<usize>,
    flagship_symbol: String,
    scheduler_enabled: bool,
}

async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let tracked_symbols = state.store.read(|t| t.price_count()).ok();
    Json(HealthResponse {
        status: if tracked_symbols.is_some() { "ok" } else { "degraded" },
        version: env!("CARGO_PKG_VERSION"),
        tracked_symbols,
        flagship_symbol: state.config.simulator.flagship_symbol.clone(),
        scheduler_enabled: state.config.scheduler.enabled,
    })
}

pub fn router() -> Router<AppState> {
    Router::new().route("/api/health", get(health))
}

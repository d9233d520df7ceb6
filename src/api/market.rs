//! Market simulation endpoints.
//!
//! The periodic routines are exposed as plain POSTs so an external scheduler
//! can drive them when the built-in one is disabled. Shock events are
//! admin-only.

use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use tracing::info;

use super::caller::AdminCaller;
use crate::error::{AppError, Result};
use crate::services::simulator::TickObservables;
use crate::types::{DividendSweep, MarketEventRequest, StockPrice};
use crate::AppState;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdatedResponse {
    pub success: bool,
    pub updated: usize,
}

impl UpdatedResponse {
    fn new(updated: usize) -> Json<Self> {
        Json(Self {
            success: true,
            updated,
        })
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FlagshipTickResponse {
    pub success: bool,
    pub symbol: String,
    pub observables: TickObservables,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketEventResponse {
    pub success: bool,
    pub multiplier: f64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PayoutResponse {
    pub success: bool,
    #[serde(flatten)]
    pub sweep: DividendSweep,
}

/// GET /api/market/prices
async fn prices(State(state): State<AppState>) -> Result<Json<Vec<StockPrice>>> {
    Ok(Json(state.simulator.prices()?))
}

/// POST /api/market/simulate
async fn simulate(State(state): State<AppState>) -> Result<Json<UpdatedResponse>> {
    Ok(UpdatedResponse::new(state.simulator.simulate_price_movement()?))
}

/// POST /api/market/flagship/tick
async fn flagship_tick(State(state): State<AppState>) -> Result<Json<FlagshipTickResponse>> {
    let observables = state.simulator.tick_flagship()?;
    Ok(Json(FlagshipTickResponse {
        success: true,
        symbol: state.simulator.flagship_symbol().to_string(),
        observables,
    }))
}

/// POST /api/market/trends
async fn trends(State(state): State<AppState>) -> Result<Json<UpdatedResponse>> {
    Ok(UpdatedResponse::new(state.simulator.realize_analyst_trends()?))
}

/// POST /api/market/dividend-yields
async fn dividend_yields(State(state): State<AppState>) -> Result<Json<UpdatedResponse>> {
    Ok(UpdatedResponse::new(state.simulator.assign_dividend_yields()?))
}

/// POST /api/market/events
async fn market_event(
    State(state): State<AppState>,
    admin: AdminCaller,
    Json(request): Json<MarketEventRequest>,
) -> Result<Json<MarketEventResponse>> {
    info!("{} triggered market event {}", admin.owner, request.event_type);
    let multiplier = state.simulator.apply_market_event(request.event_type)?;
    Ok(Json(MarketEventResponse {
        success: true,
        multiplier,
    }))
}

/// POST /api/dividends/payout
async fn payout(State(state): State<AppState>) -> Result<Json<PayoutResponse>> {
    let sweep = state
        .ledger
        .pay_dividends()
        .await
        .map_err(|e| AppError::Internal(e.to_string()))?;
    Ok(Json(PayoutResponse {
        success: true,
        sweep,
    }))
}

/// Routes nested under `/api/market`.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/prices", get(prices))
        .route("/simulate", post(simulate))
        .route("/flagship/tick", post(flagship_tick))
        .route("/trends", post(trends))
        .route("/dividend-yields", post(dividend_yields))
        .route("/events", post(market_event))
}

/// Routes nested under `/api/dividends`.
pub fn dividends_router() -> Router<AppState> {
    Router::new().route("/payout", post(payout))
}

//! Transfers, copy trading and the leaderboard.

use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;

use super::caller::Caller;
use crate::services::LedgerError;
use crate::types::{
    CopyTrade, CopyTradeView, LeaderboardEntry, StartCopyTradeRequest, StopCopyTradeRequest,
    TransferRequest,
};
use crate::AppState;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferResponse {
    pub success: bool,
    /// Sender's cash after the transfer
    pub cash_balance: f64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CopyTradeResponse {
    pub success: bool,
    pub copy_trade: CopyTrade,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StopCopyTradeResponse {
    pub success: bool,
    pub credited: f64,
    pub stopped: Vec<CopyTradeView>,
}

#[derive(Debug, Serialize)]
pub struct LeaderboardResponse {
    pub leaderboard: Vec<LeaderboardEntry>,
}

/// POST /api/transfers
async fn transfer(
    State(state): State<AppState>,
    caller: Caller,
    Json(request): Json<TransferRequest>,
) -> Result<Json<TransferResponse>, LedgerError> {
    let receipt = state
        .ledger
        .transfer(&caller.owner, &request.recipient, request.amount)?;
    Ok(Json(TransferResponse {
        success: true,
        cash_balance: receipt.sender.cash_balance,
    }))
}

/// POST /api/copy-trades
async fn start_copy_trade(
    State(state): State<AppState>,
    caller: Caller,
    Json(request): Json<StartCopyTradeRequest>,
) -> Result<Json<CopyTradeResponse>, LedgerError> {
    let copy_trade = state
        .ledger
        .start_copy_trade(&caller.owner, &request.leader, request.amount)?;
    Ok(Json(CopyTradeResponse {
        success: true,
        copy_trade,
    }))
}

/// GET /api/copy-trades
async fn list_copy_trades(
    State(state): State<AppState>,
    caller: Caller,
) -> Result<Json<Vec<CopyTradeView>>, LedgerError> {
    Ok(Json(state.ledger.copy_trades(&caller.owner)?))
}

/// POST /api/copy-trades/stop
///
/// An empty body stops every active copy trade.
async fn stop_copy_trade(
    State(state): State<AppState>,
    caller: Caller,
    request: Option<Json<StopCopyTradeRequest>>,
) -> Result<Json<StopCopyTradeResponse>, LedgerError> {
    let request = request.map(|Json(r)| r).unwrap_or_default();
    let receipt = state
        .ledger
        .stop_copy_trade(&caller.owner, request.copy_trade_id.as_deref())?;
    Ok(Json(StopCopyTradeResponse {
        success: true,
        credited: receipt.credited,
        stopped: receipt.stopped,
    }))
}

/// GET /api/leaderboard
async fn leaderboard(
    State(state): State<AppState>,
    _caller: Caller,
) -> Result<Json<LeaderboardResponse>, LedgerError> {
    Ok(Json(LeaderboardResponse {
        leaderboard: state.ledger.leaderboard()?,
    }))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/transfers", post(transfer))
        .route("/api/copy-trades", post(start_copy_trade).get(list_copy_trades))
        .route("/api/copy-trades/stop", post(stop_copy_trade))
        .route("/api/leaderboard", get(leaderboard))
}

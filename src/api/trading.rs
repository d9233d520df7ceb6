//! Trading API
//!
//! Endpoints for the caller's account, buys and sells, holdings and logs.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use super::caller::Caller;
use crate::services::LedgerError;
use crate::types::{
    BuyRequest, Holding, HoldingView, PortfolioHistoryEntry, TradeRequest, Transaction,
    TransactionType, UserAccount,
};
use crate::AppState;

const DEFAULT_LIMIT: usize = 50;
const MAX_LIMIT: usize = 500;

// =============================================================================
// Error Response
// =============================================================================

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

impl IntoResponse for LedgerError {
    fn into_response(self) -> axum::response::Response {
        let (status, code) = match &self {
            LedgerError::InvalidRequest(_) => (StatusCode::BAD_REQUEST, "INVALID_REQUEST"),
            LedgerError::InsufficientFunds { .. } => {
                (StatusCode::BAD_REQUEST, "INSUFFICIENT_FUNDS")
            }
            LedgerError::InsufficientShares { .. } => {
                (StatusCode::BAD_REQUEST, "INSUFFICIENT_SHARES")
            }
            LedgerError::AccountNotFound(_) => (StatusCode::NOT_FOUND, "ACCOUNT_NOT_FOUND"),
            LedgerError::HoldingNotFound(_) => (StatusCode::NOT_FOUND, "HOLDING_NOT_FOUND"),
            LedgerError::LeaderNotFound(_) => (StatusCode::NOT_FOUND, "LEADER_NOT_FOUND"),
            LedgerError::CopyTradeNotFound(_) => (StatusCode::NOT_FOUND, "COPY_TRADE_NOT_FOUND"),
            LedgerError::NoPriceData(_) => (StatusCode::NOT_FOUND, "NO_PRICE_DATA"),
            LedgerError::DatabaseError(_) => {
                tracing::error!("{}", self);
                (StatusCode::INTERNAL_SERVER_ERROR, "DATABASE_ERROR")
            }
        };

        let body = Json(ErrorResponse {
            error: self.to_string(),
            code: code.to_string(),
        });

        (status, body).into_response()
    }
}

// =============================================================================
// Request / Response Types
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct LimitQuery {
    pub limit: Option<usize>,
}

impl LimitQuery {
    fn resolve(&self) -> usize {
        self.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT)
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BuyResponse {
    pub success: bool,
    pub transaction: Transaction,
    pub portfolio: Holding,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TradeResponse {
    pub success: bool,
    pub transaction: Transaction,
    /// Realised P/L, present for sells
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profit_loss: Option<f64>,
}

// =============================================================================
// Handlers
// =============================================================================

/// GET /api/account
async fn get_account(
    State(state): State<AppState>,
    caller: Caller,
) -> Result<Json<UserAccount>, LedgerError> {
    Ok(Json(state.ledger.account(&caller.owner)?))
}

/// POST /api/trading/buy
async fn buy(
    State(state): State<AppState>,
    caller: Caller,
    Json(request): Json<BuyRequest>,
) -> Result<Json<BuyResponse>, LedgerError> {
    let receipt = state
        .ledger
        .buy(&caller.owner, &request.symbol, request.shares, request.price)?;

    Ok(Json(BuyResponse {
        success: true,
        transaction: receipt.transaction,
        portfolio: receipt.holding,
    }))
}

/// POST /api/trading/trade
async fn trade(
    State(state): State<AppState>,
    caller: Caller,
    Json(request): Json<TradeRequest>,
) -> Result<Json<TradeResponse>, LedgerError> {
    let symbol = &request.stock.symbol;
    let response = match request.trade_type {
        TransactionType::Buy => {
            let receipt = state
                .ledger
                .buy(&caller.owner, symbol, request.shares, request.stock.price)?;
            TradeResponse {
                success: true,
                transaction: receipt.transaction,
                profit_loss: None,
            }
        }
        TransactionType::Sell => {
            let receipt = state
                .ledger
                .sell(&caller.owner, symbol, request.shares, request.stock.price)?;
            TradeResponse {
                success: true,
                transaction: receipt.transaction,
                profit_loss: Some(receipt.profit_loss),
            }
        }
    };

    Ok(Json(response))
}

/// GET /api/trading/holdings
async fn holdings(
    State(state): State<AppState>,
    caller: Caller,
) -> Result<Json<Vec<HoldingView>>, LedgerError> {
    Ok(Json(state.ledger.holdings_view(&caller.owner)?))
}

/// GET /api/trading/transactions
async fn transactions(
    State(state): State<AppState>,
    caller: Caller,
    Query(query): Query<LimitQuery>,
) -> Result<Json<Vec<Transaction>>, LedgerError> {
    Ok(Json(state.ledger.transactions(&caller.owner, query.resolve())?))
}

/// GET /api/trading/history
async fn history(
    State(state): State<AppState>,
    caller: Caller,
    Query(query): Query<LimitQuery>,
) -> Result<Json<Vec<PortfolioHistoryEntry>>, LedgerError> {
    Ok(Json(state.ledger.history(&caller.owner, query.resolve())?))
}

/// Routes nested under `/api/trading`.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/buy", post(buy))
        .route("/trade", post(trade))
        .route("/holdings", get(holdings))
        .route("/transactions", get(transactions))
        .route("/history", get(history))
}

/// Routes nested under `/api/account`.
pub fn account_router() -> Router<AppState> {
    Router::new().route("/", get(get_account))
}

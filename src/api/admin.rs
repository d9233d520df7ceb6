use axum::{extract::State, routing::post, Json, Router};
use serde::Serialize;
use tracing::warn;

use super::caller::AdminCaller;
use crate::services::LedgerError;
use crate::AppState;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResetResponse {
    pub success: bool,
    pub accounts_reset: usize,
}

/// POST /api/admin/reset
async fn reset(
    State(state): State<AppState>,
    admin: AdminCaller,
) -> Result<Json<ResetResponse>, LedgerError> {
    warn!("{} requested a full ledger reset", admin.owner);
    let accounts_reset = state.ledger.reset_all()?;
    Ok(Json(ResetResponse {
        success: true,
        accounts_reset,
    }))
}

/// Routes nested under `/api/admin`.
pub fn router() -> Router<AppState> {
    Router::new().route("/reset", post(reset))
}

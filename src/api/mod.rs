pub mod admin;
pub mod caller;
pub mod health;
pub mod market;
pub mod social;
pub mod trading;

use crate::AppState;
use axum::Router;

/// Create the API router.
pub fn router() -> Router<AppState> {
    Router::new()
        .merge(health::router())
        .merge(social::router())
        .nest("/api/account", trading::account_router())
        .nest("/api/trading", trading::router())
        .nest("/api/market", market::router())
        .nest("/api/dividends", market::dividends_router())
        .nest("/api/admin", admin::router())
}

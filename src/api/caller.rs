//! Caller identity extractors.
//!
//! Authentication happens upstream; the gateway forwards the authenticated
//! owner in the `x-owner` header.
//!
//! ```ignore
//! async fn my_handler(caller: Caller) -> impl IntoResponse {
//!     let owner = caller.owner;
//!     // ...
//! }
//! ```

use axum::{extract::FromRequestParts, http::request::Parts};

use crate::error::AppError;
use crate::AppState;

/// Header carrying the authenticated owner.
pub const OWNER_HEADER: &str = "x-owner";

/// Any authenticated caller.
#[derive(Debug, Clone)]
pub struct Caller {
    pub owner: String,
}

#[axum::async_trait]
impl<S> FromRequestParts<S> for Caller
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let owner = parts
            .headers
            .get(OWNER_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .ok_or_else(|| AppError::Unauthorized("Missing caller identity".to_string()))?;

        Ok(Caller {
            owner: owner.to_string(),
        })
    }
}

/// A caller listed in `ADMIN_OWNERS`.
#[derive(Debug, Clone)]
pub struct AdminCaller {
    pub owner: String,
}

#[axum::async_trait]
impl FromRequestParts<AppState> for AdminCaller {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let caller = Caller::from_request_parts(parts, state).await?;
        if !state.config.is_admin(&caller.owner) {
            return Err(AppError::Forbidden("Admin access required".to_string()));
        }
        Ok(AdminCaller {
            owner: caller.owner,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    async fn extract(header: Option<&str>) -> Result<Caller, AppError> {
        let mut builder = Request::builder().uri("/");
        if let Some(value) = header {
            builder = builder.header(OWNER_HEADER, value);
        }
        let (mut parts, _) = builder.body(()).unwrap().into_parts();
        Caller::from_request_parts(&mut parts, &()).await
    }

    #[tokio::test]
    async fn test_caller_from_header() {
        let caller = extract(Some(" alice@example.com ")).await.unwrap();
        assert_eq!(caller.owner, "alice@example.com");
    }

    #[tokio::test]
    async fn test_missing_or_blank_header_is_unauthorized() {
        assert!(matches!(extract(None).await, Err(AppError::Unauthorized(_))));
        assert!(matches!(extract(Some("  ")).await, Err(AppError::Unauthorized(_))));
    }
}

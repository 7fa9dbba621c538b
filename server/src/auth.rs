//! Admin credential check for operator routes.
//!
//! The caller sends the admin token either as `x-admin-token: <token>` or
//! `Authorization: Bearer <token>`. It is compared in constant time against
//! the token captured in [`AppState`] when the store was opened.

use crate::error::ApiError;
use crate::AppState;
use axum::extract::{Request, State};
use axum::http::{header, HeaderMap};
use axum::middleware::Next;
use axum::response::Response;
use subtle::ConstantTimeEq;
use tracing::warn;

/// Header carrying the admin token.
pub const ADMIN_TOKEN_HEADER: &str = "x-admin-token";

/// Middleware rejecting requests without a valid admin token.
pub async fn require_admin(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let Some(presented) = presented_token(request.headers()) else {
        warn!("Admin request without credential: {}", request.uri().path());
        return Err(ApiError::Unauthorized);
    };

    if !token_matches(presented, state.admin_token()) {
        warn!("Admin request with wrong credential: {}", request.uri().path());
        return Err(ApiError::Unauthorized);
    }

    Ok(next.run(request).await)
}

/// Extracts the admin token from the request headers, if any.
fn presented_token(headers: &HeaderMap) -> Option<&str> {
    if let Some(value) = headers.get(ADMIN_TOKEN_HEADER) {
        return value.to_str().ok().map(str::trim).filter(|t| !t.is_empty());
    }

    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

fn token_matches(presented: &str, expected: &str) -> bool {
    presented.as_bytes().ct_eq(expected.as_bytes()).into()
}

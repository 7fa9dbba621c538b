//! HTTP API for the devgate device authorization store.
//!
//! | Method | Path                                | Auth  |
//! |--------|-------------------------------------|-------|
//! | GET    | `/healthz`                          | none  |
//! | GET    | `/api/v1/check?deviceId=…`          | none  |
//! | POST   | `/api/v1/check`                     | none  |
//! | POST   | `/api/v1/admin/allow`               | admin |
//! | POST   | `/api/v1/admin/block`               | admin |
//! | POST   | `/api/v1/admin/unallow`             | admin |
//! | POST   | `/api/v1/admin/unblock`             | admin |
//! | POST   | `/api/v1/admin/pending/clear`       | admin |
//! | GET    | `/api/v1/admin/devices`             | admin |
//! | GET    | `/api/v1/admin/devices/{device_id}` | admin |

pub mod auth;
pub mod error;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::middleware;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post};
use axum::Router;
use chrono::Utc;
use devgate_store::{CheckOutcome, DeviceReport, DeviceSnapshot, DeviceStore};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::error::ApiError;

/// Shared handler state.
///
/// The admin token is fixed once the store is open, so it is read here once
/// and the auth middleware never has to take the store lock.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<DeviceStore>,
    admin_token: Arc<str>,
}

impl AppState {
    pub fn new(store: DeviceStore) -> Self {
        let admin_token = Arc::from(store.admin_token());
        Self {
            store: Arc::new(store),
            admin_token,
        }
    }

    /// The credential admin routes are checked against.
    pub fn admin_token(&self) -> &str {
        &self.admin_token
    }
}

/// Body (or query) naming a single device.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DeviceRequest {
    #[serde(default)]
    pub device_id: String,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct AllowResponse {
    pub allow: Vec<String>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct BlockResponse {
    pub block: Vec<String>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct PendingResponse {
    pub pending: Vec<String>,
}

/// Runs a store operation off the async runtime; every mutation ends in an fsync.
async fn with_store<T, F>(state: &AppState, op: F) -> Result<T, ApiError>
where
    F: FnOnce(&DeviceStore) -> Result<T, devgate_store::StoreError> + Send + 'static,
    T: Send + 'static,
{
    let store = Arc::clone(&state.store);
    tokio::task::spawn_blocking(move || op(&store))
        .await
        .map_err(|e| ApiError::Internal(format!("store task failed: {e}")))?
        .map_err(ApiError::from)
}

async fn health_handler() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

async fn check(state: &AppState, device_id: String) -> Result<Response, ApiError> {
    let decision = with_store(state, move |store| store.check(&device_id, Utc::now())).await?;
    let status = if decision.reason == CheckOutcome::MissingDevice.reason() {
        StatusCode::BAD_REQUEST
    } else {
        StatusCode::OK
    };
    Ok((status, Json(decision)).into_response())
}

async fn check_query_handler(
    State(state): State<AppState>,
    Query(req): Query<DeviceRequest>,
) -> Result<Response, ApiError> {
    check(&state, req.device_id).await
}

async fn check_body_handler(
    State(state): State<AppState>,
    Json(req): Json<DeviceRequest>,
) -> Result<Response, ApiError> {
    check(&state, req.device_id).await
}

async fn allow_handler(
    State(state): State<AppState>,
    Json(req): Json<DeviceRequest>,
) -> Result<Json<AllowResponse>, ApiError> {
    let allow = with_store(&state, move |store| store.allow(&req.device_id)).await?;
    Ok(Json(AllowResponse { allow }))
}

async fn block_handler(
    State(state): State<AppState>,
    Json(req): Json<DeviceRequest>,
) -> Result<Json<BlockResponse>, ApiError> {
    let block = with_store(&state, move |store| store.block(&req.device_id)).await?;
    Ok(Json(BlockResponse { block }))
}

async fn unallow_handler(
    State(state): State<AppState>,
    Json(req): Json<DeviceRequest>,
) -> Result<Json<AllowResponse>, ApiError> {
    let allow = with_store(&state, move |store| store.unallow(&req.device_id)).await?;
    Ok(Json(AllowResponse { allow }))
}

async fn unblock_handler(
    State(state): State<AppState>,
    Json(req): Json<DeviceRequest>,
) -> Result<Json<BlockResponse>, ApiError> {
    let block = with_store(&state, move |store| store.unblock(&req.device_id)).await?;
    Ok(Json(BlockResponse { block }))
}

async fn clear_pending_handler(
    State(state): State<AppState>,
) -> Result<Json<PendingResponse>, ApiError> {
    let pending = with_store(&state, |store| store.clear_pending()).await?;
    Ok(Json(PendingResponse { pending }))
}

async fn list_handler(State(state): State<AppState>) -> Result<Json<DeviceSnapshot>, ApiError> {
    let snapshot = with_store(&state, |store| Ok(store.list())).await?;
    Ok(Json(snapshot))
}

async fn status_handler(
    State(state): State<AppState>,
    Path(device_id): Path<String>,
) -> Result<Json<DeviceReport>, ApiError> {
    let report = with_store(&state, move |store| store.status(&device_id)).await?;
    Ok(Json(report))
}

/// Build the HTTP API router over the given store.
pub fn build_router(state: AppState) -> Router {
    let admin = Router::new()
        .route("/allow", post(allow_handler))
        .route("/block", post(block_handler))
        .route("/unallow", post(unallow_handler))
        .route("/unblock", post(unblock_handler))
        .route("/pending/clear", post(clear_pending_handler))
        .route("/devices", get(list_handler))
        .route("/devices/{device_id}", get(status_handler))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth::require_admin,
        ));

    Router::new()
        .route("/healthz", get(health_handler))
        .route(
            "/api/v1/check",
            get(check_query_handler).post(check_body_handler),
        )
        .nest("/api/v1/admin", admin)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

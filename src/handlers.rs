use crate::coordinator::Coordinator;
use crate::errors::GasError;
use crate::sensors::build_sensor_readings;
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use std::sync::Arc;

/// Shared application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    /// Owner of the gas client and the latest snapshot.
    pub coordinator: Arc<Coordinator>,
}

/// Routes exposed to the hub. Middleware is layered on by the caller.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/v1/accounts", get(get_accounts))
        .route("/api/v1/sensors", get(get_sensors))
        .route("/api/v1/status", get(get_status))
        .route("/api/v1/refresh", post(trigger_refresh))
        .with_state(state)
}

/// Health check endpoint.
pub async fn health() -> (StatusCode, Json<serde_json::Value>) {
    (
        StatusCode::OK,
        Json(json!({
            "status": "healthy",
            "service": "bjgas-api",
            "version": env!("CARGO_PKG_VERSION")
        })),
    )
}

fn not_ready() -> Response {
    (
        StatusCode::SERVICE_UNAVAILABLE,
        Json(json!({
            "error": "No gas data fetched yet"
        })),
    )
        .into_response()
}

/// GET /api/v1/accounts
///
/// Latest snapshot: account code to flat facet record.
pub async fn get_accounts(State(state): State<AppState>) -> Response {
    match state.coordinator.snapshot().await {
        Some(snapshot) => Json(snapshot.as_ref()).into_response(),
        None => not_ready(),
    }
}

/// GET /api/v1/sensors
///
/// Latest snapshot projected into sensor readings.
pub async fn get_sensors(State(state): State<AppState>) -> Response {
    match state.coordinator.snapshot().await {
        Some(snapshot) => Json(json!({
            "updated_at": snapshot.updated_at,
            "sensors": build_sensor_readings(&snapshot.accounts),
        }))
        .into_response(),
        None => not_ready(),
    }
}

/// GET /api/v1/status
pub async fn get_status(State(state): State<AppState>) -> Json<serde_json::Value> {
    let status = state.coordinator.status().await;
    Json(json!({
        "last_success": status.last_success,
        "last_error": status.last_error,
        "last_error_at": status.last_error_at,
        "account_count": status.account_count,
        "scan_interval_secs": state.coordinator.interval().as_secs(),
    }))
}

/// POST /api/v1/refresh
///
/// Runs one refresh immediately instead of waiting for the next tick.
pub async fn trigger_refresh(
    State(state): State<AppState>,
) -> Result<Json<serde_json::Value>, GasError> {
    tracing::info!("Manual refresh requested");
    let snapshot = state.coordinator.refresh().await?;
    Ok(Json(json!({
        "updated_at": snapshot.updated_at,
        "account_count": snapshot.accounts.len(),
    })))
}

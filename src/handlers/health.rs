use super::AppState;
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json},
};
use serde_json::json;

/// Health check endpoint
/// Returns 200 while the store answers, 503 otherwise
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let store_up = state.store.ping().await.is_ok();
    let status = if store_up {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status, Json(json!({
        "status": if store_up { "healthy" } else { "degraded" },
        "service": "applog",
        "version": env!("CARGO_PKG_VERSION"),
        "store": if store_up { "up" } else { "down" },
        "buffered": state.logger.buffered(),
        "minLevel": state.logger.min_level(),
    })))
}

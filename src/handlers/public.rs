use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde_json::{json, Value};

use crate::app::AppState;
use crate::error::ApiError;

/// GET / - service info and registered resources
pub async fn root(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "name": "HRM API (Rust)",
        "version": env!("CARGO_PKG_VERSION"),
        "resources": state.registry.names(),
        "endpoints": {
            "home": "/ (public)",
            "health": "/health (public)",
            "resource": "/api/:resource/:id (GET, PUT, DELETE; bearer token)",
        }
    }))
}

/// GET /health - record store connectivity
pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let now = chrono::Utc::now();
    let store = state.store.backend_name();

    match state.store.health_check().await {
        Ok(()) => (
            StatusCode::OK,
            Json(json!({
                "status": "ok",
                "timestamp": now,
                "store": store,
            })),
        ),
        Err(e) => {
            tracing::error!("Health check failed: {}", e);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({
                    "status": "degraded",
                    "timestamp": now,
                    "store": store,
                    "error": "record store unavailable",
                })),
            )
        }
    }
}

/// Unmatched routes
pub async fn not_found() -> ApiError {
    ApiError::not_found("Route not found")
}

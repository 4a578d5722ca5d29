//! Route handlers served alongside the throttle.

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde::Serialize;

use super::middleware::ThrottleState;

/// Liveness check. Mounted outside the throttle so it never spends quota.
pub async fn health_handler() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

/// Snapshot of throttle occupancy and settings.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ThrottleStats {
    pub tracked_clients: usize,
    pub limit: u64,
    pub window_duration_ms: u64,
}

pub async fn stats_handler(State(state): State<ThrottleState>) -> Json<ThrottleStats> {
    let config = state.throttle.config();
    Json(ThrottleStats {
        tracked_clients: state.throttle.tracked_clients(),
        limit: config.max_requests_per_window,
        window_duration_ms: config.window_duration_ms,
    })
}

/// Fallback for unmatched paths. It sits behind the throttle, so misses spend quota too.
pub async fn not_found_handler() -> impl IntoResponse {
    (
        StatusCode::NOT_FOUND,
        Json(serde_json::json!({
            "success": false,
            "error": "Not found"
        })),
    )
}

use axum::{extract::State, Json};
use chrono::Utc;
use serde::Serialize;

use crate::AppState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub upstream: String,
    pub timestamp: String,
}

/// Always answers 200; the model runtime's state is reported, not enforced.
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let upstream = if state.orchestrator().upstream_reachable().await {
        "reachable"
    } else {
        "unreachable"
    };

    Json(HealthResponse {
        status: "ok".to_string(),
        upstream: upstream.to_string(),
        timestamp: Utc::now().to_rfc3339(),
    })
}

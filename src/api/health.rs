//! Health check endpoint handler.

use crate::api::{AppState, HealthResponse};
use axum::{extract::State, Json};
use std::sync::Arc;

/// GET /health - Liveness with node identity and uptime.
pub async fn handle(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        server: state.engine.aggregator().identity().id.clone(),
        uptime_seconds: state.start_time.elapsed().as_secs(),
    })
}

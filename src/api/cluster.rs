//! Cluster status, routing preview, and accelerator endpoints.

use crate::api::{AppState, GpusResponse, RouteQuery, StatusQuery};
use crate::cluster::ClusterStatus;
use crate::config::is_truthy;
use crate::routing::{RouteRequest, RoutingDecision};
use axum::{
    extract::{Query, State},
    http::HeaderMap,
    Json,
};
use std::sync::Arc;

/// GET /api/cluster/status - This node's status document. Peers call this.
pub async fn status(
    State(state): State<Arc<AppState>>,
    Query(query): Query<StatusQuery>,
) -> Json<ClusterStatus> {
    let force = query.force.as_deref().is_some_and(is_truthy);
    let status = state.engine.aggregator().local_status(force).await;
    Json(ClusterStatus::clone(&status))
}

/// GET /api/cluster/route?model= - Where a request for `model` would execute.
pub async fn route(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(query): Query<RouteQuery>,
) -> Json<RoutingDecision> {
    let request = RouteRequest::from_parts(query.model.as_deref(), &headers);
    Json(state.engine.pick_execution_target(&request).await)
}

/// GET /api/gpus - Reachable instances and accelerator telemetry.
pub async fn gpus(State(state): State<Arc<AppState>>) -> Json<GpusResponse> {
    let aggregator = state.engine.aggregator();
    let (instances, report) = tokio::join!(
        aggregator.instances().list_instances(),
        aggregator.telemetry().get_gpu_metrics()
    );
    Json(GpusResponse::new(instances, report))
}

//! Chat relay endpoint handler.

use crate::api::headers::ProvenanceHeaders;
use crate::api::{ApiError, AppState};
use crate::forward::{relay_response, ForwardRequest};
use crate::inflight::InFlightKey;
use crate::instances::InstanceError;
use crate::logging::generate_request_id;
use crate::routing::{ExecutionTarget, RouteRequest};
use axum::{
    body::Bytes,
    extract::State,
    http::{header, HeaderMap, HeaderName, HeaderValue},
    response::Response,
};
use std::sync::Arc;
use tracing::Instrument;

const CHAT_PATH: &str = "/api/chat";
const REQUEST_ID_HEADER: &str = "x-request-id";

/// POST /api/chat - Execute locally or forward to a friendly server.
pub async fn handle(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, ApiError> {
    let payload: serde_json::Value = serde_json::from_slice(&body)
        .map_err(|e| ApiError::bad_request(&format!("Invalid JSON body: {}", e)))?;

    let request_id = generate_request_id();
    let route = RouteRequest::from_body(&payload, &headers);
    let span = tracing::info_span!(
        "chat",
        request_id = %request_id,
        model = route.model().unwrap_or_default()
    );

    let mut response = relay(state, headers, payload, route).instrument(span).await?;
    if let Ok(value) = HeaderValue::from_str(&request_id) {
        response
            .headers_mut()
            .insert(HeaderName::from_static(REQUEST_ID_HEADER), value);
    }
    Ok(response)
}

async fn relay(
    state: Arc<AppState>,
    headers: HeaderMap,
    payload: serde_json::Value,
    route: RouteRequest,
) -> Result<Response, ApiError> {
    let decision = state.engine.pick_execution_target(&route).await;

    match decision.target {
        ExecutionTarget::Friendly(server) => {
            let mut request = ForwardRequest::new(CHAT_PATH, payload);
            request.accept = headers
                .get(header::ACCEPT)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string);
            request.route_reason = Some(decision.trace.reason);
            request.guard = Some(
                state
                    .engine
                    .aggregator()
                    .inflight()
                    .begin(InFlightKey::new(None, route.model())),
            );

            Ok(state.proxy.forward(&server, request).await?)
        }
        ExecutionTarget::Local => {
            let aggregator = state.engine.aggregator();
            let instance = aggregator
                .instances()
                .resolve_instance_for_model(route.model())
                .await;
            let guard = aggregator
                .inflight()
                .begin(InFlightKey::new(Some(instance.id), route.model()));

            tracing::info!(
                instance_id = instance.id,
                base_url = %instance.base_url,
                reason = decision.trace.reason.as_str(),
                "Executing locally"
            );

            let timeout = state.request_timeout();
            let upstream = state
                .http_client
                .post(instance.url(CHAT_PATH))
                .json(&payload)
                .timeout(timeout)
                .send()
                .await
                .map_err(|e| {
                    let error = InstanceError::classify(e, timeout.as_millis() as u64);
                    tracing::warn!(instance_id = instance.id, error = %error, "Local instance failed");
                    ApiError::from(error)
                })?;

            let mut response = relay_response(upstream, Some(guard));
            ProvenanceHeaders::local(instance.id, decision.trace.reason)
                .inject_into(response.headers_mut());
            Ok(response)
        }
    }
}

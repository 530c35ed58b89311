//! Forwarding proxy for requests routed to a friendly server.
//!
//! The original JSON body is replayed against the peer's equivalent endpoint
//! with the peer credential and the loop-prevention marker, so the peer
//! always executes locally. The peer's status, content type and cache
//! control are propagated and the body is streamed back without buffering.
//! Transport failures surface to the caller; nothing is retried here.
//! A request may carry an in-flight guard, which stays held until the
//! relayed body ends or is dropped.

use crate::api::headers::{peer_request_headers, ProvenanceHeaders};
use crate::friendly::FriendlyServer;
use crate::inflight::InFlightGuard;
use crate::routing::RouteReason;
use axum::body::Body;
use axum::http::{header, StatusCode};
use axum::response::Response;
use futures_util::StreamExt;
use std::time::Duration;
use thiserror::Error;

/// Failure reaching the peer.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ForwardError {
    #[error("friendly server timed out after {0}ms")]
    Timeout(u64),

    #[error("friendly server unreachable: {0}")]
    Connection(String),

    #[error("invalid friendly server URL: {0}")]
    InvalidUrl(String),
}

impl ForwardError {
    fn classify(e: reqwest::Error, timeout_ms: u64) -> Self {
        if e.is_timeout() {
            ForwardError::Timeout(timeout_ms)
        } else {
            ForwardError::Connection(e.to_string())
        }
    }
}

/// A request to replay on a peer.
#[derive(Debug)]
pub struct ForwardRequest {
    /// Endpoint path on the peer, e.g. `/api/chat`
    pub path: String,
    pub body: serde_json::Value,
    /// Inbound `Accept` header, defaults to JSON
    pub accept: Option<String>,
    /// Overrides the proxy's default timeout
    pub timeout: Option<Duration>,
    /// Held until the relayed body is finished
    pub guard: Option<InFlightGuard>,
    /// Reported back in the provenance headers
    pub route_reason: Option<RouteReason>,
}

impl ForwardRequest {
    pub fn new(path: &str, body: serde_json::Value) -> Self {
        Self {
            path: path.to_string(),
            body,
            accept: None,
            timeout: None,
            guard: None,
            route_reason: None,
        }
    }
}

/// Relays requests to friendly servers.
#[derive(Clone)]
pub struct ForwardingProxy {
    client: reqwest::Client,
    forwarded_by: String,
    default_timeout: Duration,
}

impl ForwardingProxy {
    pub fn new(client: reqwest::Client, forwarded_by: String, default_timeout: Duration) -> Self {
        Self {
            client,
            forwarded_by,
            default_timeout,
        }
    }

    /// Node id sent as the forwarding node.
    pub fn forwarded_by(&self) -> &str {
        &self.forwarded_by
    }

    /// Replay `request` on `server` and stream its response back.
    pub async fn forward(
        &self,
        server: &FriendlyServer,
        request: ForwardRequest,
    ) -> Result<Response, ForwardError> {
        let url = server.url(&request.path);
        reqwest::Url::parse(&url).map_err(|e| ForwardError::InvalidUrl(format!("{url}: {e}")))?;

        let timeout = request.timeout.unwrap_or(self.default_timeout);
        let timeout_ms = timeout.as_millis() as u64;
        let accept = request.accept.as_deref().unwrap_or("application/json");
        let server_label = server.cache_key().to_string();

        tracing::info!(
            server = %server.name,
            url = %url,
            "Forwarding request to friendly server"
        );

        let upstream = match self
            .client
            .post(&url)
            .headers(peer_request_headers(&server.api_key, &self.forwarded_by, accept))
            .json(&request.body)
            .timeout(timeout)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                let error = ForwardError::classify(e, timeout_ms);
                metrics::counter!(
                    "ollamify_forward_requests_total",
                    "server" => server_label,
                    "status" => "error"
                )
                .increment(1);
                tracing::warn!(server = %server.name, error = %error, "Forwarding failed");
                return Err(error);
            }
        };

        metrics::counter!(
            "ollamify_forward_requests_total",
            "server" => server_label,
            "status" => upstream.status().as_u16().to_string()
        )
        .increment(1);

        let mut response = relay_response(upstream, request.guard);
        let mut provenance = ProvenanceHeaders::friendly(server.label(), &self.forwarded_by);
        if let Some(reason) = request.route_reason {
            provenance = provenance.with_reason(reason);
        }
        provenance.inject_into(response.headers_mut());
        Ok(response)
    }
}

/// Turn an upstream response into a streamed axum response.
///
/// Only status, `Content-Type` and `Cache-Control` are propagated. The
/// in-flight guard is released once the body stream ends or is dropped.
pub fn relay_response(upstream: reqwest::Response, guard: Option<InFlightGuard>) -> Response {
    let status = StatusCode::from_u16(upstream.status().as_u16()).unwrap_or(StatusCode::BAD_GATEWAY);
    let content_type = upstream.headers().get(header::CONTENT_TYPE).cloned();
    let cache_control = upstream.headers().get(header::CACHE_CONTROL).cloned();

    let mut response = Response::new(stream_body(upstream, guard));
    *response.status_mut() = status;
    let headers = response.headers_mut();
    if let Some(value) = content_type {
        headers.insert(header::CONTENT_TYPE, value);
    }
    if let Some(value) = cache_control {
        headers.insert(header::CACHE_CONTROL, value);
    }
    response
}

fn stream_body(upstream: reqwest::Response, guard: Option<InFlightGuard>) -> Body {
    let stream = async_stream::stream! {
        let _guard = guard;
        let mut chunks = upstream.bytes_stream();
        while let Some(chunk) = chunks.next().await {
            yield chunk;
        }
    };
    Body::from_stream(stream)
}

//! X-Ollamify-* headers for loop prevention and provenance.
//!
//! A request carrying [`NO_FORWARD`] always executes on the receiving node.
//! Responses name the node that forwarded the request and the node that
//! actually executed it.

use axum::http::{HeaderMap, HeaderName, HeaderValue};

use crate::config::is_truthy;
use crate::routing::RouteReason;

/// Loop-prevention marker honoured on inbound requests
pub const NO_FORWARD: &str = "x-ollamify-no-forward";
/// Node that forwarded the request
pub const FORWARDED_BY: &str = "x-ollamify-forwarded-by";
/// Node that executed the request
pub const EXECUTED_ON: &str = "x-ollamify-executed-on";
/// Why the executing node was chosen
pub const ROUTE_REASON: &str = "x-ollamify-route-reason";

/// Whether the inbound headers carry a truthy no-forward marker.
pub fn is_no_forward(headers: &HeaderMap) -> bool {
    headers
        .get(NO_FORWARD)
        .and_then(|value| value.to_str().ok())
        .is_some_and(is_truthy)
}

/// Where a request was executed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutedOn {
    /// A local instance, by id
    Local(u32),
    /// A friendly server, by label
    Friendly(String),
}

impl ExecutedOn {
    pub fn header_value(&self) -> String {
        match self {
            ExecutedOn::Local(id) => format!("local:{}", id),
            ExecutedOn::Friendly(label) => format!("friendly:{}", label),
        }
    }
}

/// Provenance headers attached to relayed responses.
#[derive(Debug, Clone)]
pub struct ProvenanceHeaders {
    pub executed_on: ExecutedOn,
    /// Set when this node handed the request to a peer
    pub forwarded_by: Option<String>,
    pub route_reason: Option<RouteReason>,
}

impl ProvenanceHeaders {
    pub fn local(instance_id: u32, route_reason: RouteReason) -> Self {
        Self {
            executed_on: ExecutedOn::Local(instance_id),
            forwarded_by: None,
            route_reason: Some(route_reason),
        }
    }

    pub fn friendly(label: &str, forwarded_by: &str) -> Self {
        Self {
            executed_on: ExecutedOn::Friendly(label.to_string()),
            forwarded_by: Some(forwarded_by.to_string()),
            route_reason: None,
        }
    }

    pub fn with_reason(mut self, reason: RouteReason) -> Self {
        self.route_reason = Some(reason);
        self
    }

    /// Inject headers into a HeaderMap
    pub fn inject_into(&self, headers: &mut HeaderMap) {
        if let Ok(value) = HeaderValue::from_str(&self.executed_on.header_value()) {
            headers.insert(HeaderName::from_static(EXECUTED_ON), value);
        }

        if let Some(forwarded_by) = &self.forwarded_by {
            if let Ok(value) = HeaderValue::from_str(forwarded_by) {
                headers.insert(HeaderName::from_static(FORWARDED_BY), value);
            }
        }

        if let Some(reason) = self.route_reason {
            headers.insert(
                HeaderName::from_static(ROUTE_REASON),
                HeaderValue::from_static(reason.as_str()),
            );
        }
    }
}

/// Headers sent on every call to a peer: credential, loop marker, and caller.
pub fn peer_request_headers(api_key: &str, forwarded_by: &str, accept: &str) -> HeaderMap {
    let mut headers = HeaderMap::new();
    if let Ok(value) = HeaderValue::from_str(&format!("Bearer {}", api_key)) {
        headers.insert(axum::http::header::AUTHORIZATION, value);
    }
    if let Ok(value) = HeaderValue::from_str(accept) {
        headers.insert(axum::http::header::ACCEPT, value);
    }
    headers.insert(
        HeaderName::from_static(NO_FORWARD),
        HeaderValue::from_static("1"),
    );
    if let Ok(value) = HeaderValue::from_str(forwarded_by) {
        headers.insert(HeaderName::from_static(FORWARDED_BY), value);
    }
    headers
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_no_forward_truthy_values() {
        for value in ["1", "true", "YES", "on", "y"] {
            let mut headers = HeaderMap::new();
            headers.insert(NO_FORWARD, HeaderValue::from_str(value).unwrap());
            assert!(is_no_forward(&headers), "{value} should force local");
        }
    }

    #[test]
    fn test_is_no_forward_absent_or_falsy() {
        assert!(!is_no_forward(&HeaderMap::new()));

        let mut headers = HeaderMap::new();
        headers.insert(NO_FORWARD, HeaderValue::from_static("0"));
        assert!(!is_no_forward(&headers));
    }

    #[test]
    fn test_provenance_local() {
        let mut headers = HeaderMap::new();
        ProvenanceHeaders::local(1, RouteReason::LocalWarmAndFree).inject_into(&mut headers);

        assert_eq!(headers.get(EXECUTED_ON).unwrap(), "local:1");
        assert!(headers.get(FORWARDED_BY).is_none());
        assert_eq!(
            headers.get(ROUTE_REASON).unwrap(),
            "local_warm_and_free"
        );
    }

    #[test]
    fn test_provenance_friendly() {
        let mut headers = HeaderMap::new();
        ProvenanceHeaders::friendly("peer-a", "node-1").inject_into(&mut headers);

        assert_eq!(headers.get(EXECUTED_ON).unwrap(), "friendly:peer-a");
        assert_eq!(headers.get(FORWARDED_BY).unwrap(), "node-1");
        assert!(headers.get(ROUTE_REASON).is_none());
    }

    #[test]
    fn test_peer_request_headers() {
        let headers = peer_request_headers("k-123", "node-1", "application/json");
        assert_eq!(headers.get("authorization").unwrap(), "Bearer k-123");
        assert_eq!(headers.get("accept").unwrap(), "application/json");
        assert_eq!(headers.get(NO_FORWARD).unwrap(), "1");
        assert_eq!(headers.get(FORWARDED_BY).unwrap(), "node-1");
    }
}

//! Routing inputs extracted from an incoming request

use axum::http::HeaderMap;

use crate::api::headers::is_no_forward;

/// What the routing engine needs to know about a request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RouteRequest {
    /// Requested model name
    pub model: Option<String>,
    /// Inbound request carried the loop-prevention marker
    pub no_forward: bool,
}

impl RouteRequest {
    pub fn new(model: &str) -> Self {
        Self {
            model: Some(model.to_string()),
            no_forward: false,
        }
    }

    /// Build from a model name and the inbound headers.
    pub fn from_parts(model: Option<&str>, headers: &HeaderMap) -> Self {
        Self {
            model: model
                .map(str::trim)
                .filter(|m| !m.is_empty())
                .map(str::to_string),
            no_forward: is_no_forward(headers),
        }
    }

    /// Build from a JSON request body (`model` field) and the inbound headers.
    pub fn from_body(body: &serde_json::Value, headers: &HeaderMap) -> Self {
        Self::from_parts(body.get("model").and_then(|m| m.as_str()), headers)
    }

    pub fn with_no_forward(mut self) -> Self {
        self.no_forward = true;
        self
    }

    pub fn model(&self) -> Option<&str> {
        self.model.as_deref()
    }
}

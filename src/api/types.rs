//! Request and response types for the node API.

use crate::forward::ForwardError;
use crate::instances::{Instance, InstanceError};
use crate::telemetry::{GpuMetricSample, GpuMetricsReport};
use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::{Deserialize, Serialize};

/// Query for the dry-run routing endpoint.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RouteQuery {
    pub model: Option<String>,
}

/// Query for the cluster status endpoint.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StatusQuery {
    /// Bypass the status cache
    #[serde(default)]
    pub force: Option<String>,
}

/// GET /api/gpus payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GpusResponse {
    pub instances: Vec<Instance>,
    pub gpus: Vec<GpuMetricSample>,
    #[serde(rename = "metricsAvailable")]
    pub metrics_available: bool,
    #[serde(rename = "metricsStale")]
    pub metrics_stale: bool,
    #[serde(rename = "metricsUpdatedAt")]
    pub metrics_updated_at: Option<u64>,
}

impl GpusResponse {
    pub fn new(instances: Vec<Instance>, report: GpuMetricsReport) -> Self {
        Self {
            instances,
            gpus: report.gpus,
            metrics_available: report.metrics_available,
            metrics_stale: report.metrics_stale,
            metrics_updated_at: report.metrics_updated_at,
        }
    }
}

/// GET /health payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub server: String,
    pub uptime_seconds: u64,
}

/// API error response.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ApiError {
    pub error: ApiErrorBody,
}

/// Error details.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ApiErrorBody {
    pub message: String,
    pub r#type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub param: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

impl ApiError {
    /// Create a bad request error (400).
    pub fn bad_request(message: &str) -> Self {
        Self {
            error: ApiErrorBody {
                message: message.to_string(),
                r#type: "invalid_request_error".to_string(),
                param: None,
                code: Some("invalid_request_error".to_string()),
            },
        }
    }

    /// Create a bad gateway error (502).
    pub fn bad_gateway(message: &str) -> Self {
        Self {
            error: ApiErrorBody {
                message: message.to_string(),
                r#type: "server_error".to_string(),
                param: None,
                code: Some("bad_gateway".to_string()),
            },
        }
    }

    /// Create a gateway timeout error (504).
    pub fn gateway_timeout(message: &str) -> Self {
        Self {
            error: ApiErrorBody {
                message: message.to_string(),
                r#type: "server_error".to_string(),
                param: None,
                code: Some("gateway_timeout".to_string()),
            },
        }
    }

    /// Get the HTTP status code for this error.
    fn status_code(&self) -> StatusCode {
        match self.error.code.as_deref() {
            Some("invalid_request_error") => StatusCode::BAD_REQUEST,
            Some("bad_gateway") => StatusCode::BAD_GATEWAY,
            Some("gateway_timeout") => StatusCode::GATEWAY_TIMEOUT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<ForwardError> for ApiError {
    fn from(error: ForwardError) -> Self {
        match error {
            ForwardError::Timeout(_) => ApiError::gateway_timeout(&error.to_string()),
            ForwardError::Connection(_) | ForwardError::InvalidUrl(_) => {
                ApiError::bad_gateway(&error.to_string())
            }
        }
    }
}

impl From<InstanceError> for ApiError {
    fn from(error: InstanceError) -> Self {
        match error {
            InstanceError::Timeout(_) => ApiError::gateway_timeout(&error.to_string()),
            _ => ApiError::bad_gateway(&error.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status_code(), Json(self)).into_response()
    }
}

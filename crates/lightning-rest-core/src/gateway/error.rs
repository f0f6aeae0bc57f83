//! Translation of every failure into an HTTP status and JSON error body.
//!
//! Body shape: `{"error": {"code": <int>, "message": <string>}}`. Daemon
//! errors keep their original code and message. Transport failures are
//! reported generically and their detail only goes to the log.

use axum::Json;
use axum::http::{HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use lightning_rest_config::ErrorsConfig;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use super::params::ValidationError;
use crate::rpc::{RpcCallError, RpcError, TransportError};

/// JSON-RPC "invalid params", used for local validation failures.
pub const CODE_INVALID_PARAMS: i64 = -32602;
/// JSON-RPC "method not found", used for unknown routes.
pub const CODE_NOT_FOUND: i64 = -32601;
/// JSON-RPC "internal error", used when the daemon is unreachable.
pub const CODE_UPSTREAM_UNAVAILABLE: i64 = -32603;

/// Everything that can go wrong while serving a request.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("no endpoint for {method} {path}")]
    NotFound { method: String, path: String },

    #[error("method {method} not allowed for {path}")]
    MethodNotAllowed {
        method: String,
        path: String,
        allow: Vec<&'static str>,
    },

    /// The daemon rejected the call; `status` comes from the classifier.
    #[error("daemon rejected call: {error}")]
    Rpc { status: StatusCode, error: RpcError },

    #[error("daemon unavailable: {0}")]
    Upstream(TransportError),
}

impl GatewayError {
    pub fn status(&self) -> StatusCode {
        match self {
            GatewayError::Validation(ValidationError::TooLarge { .. }) => {
                StatusCode::PAYLOAD_TOO_LARGE
            }
            GatewayError::Validation(_) => StatusCode::BAD_REQUEST,
            GatewayError::NotFound { .. } => StatusCode::NOT_FOUND,
            GatewayError::MethodNotAllowed { .. } => StatusCode::METHOD_NOT_ALLOWED,
            GatewayError::Rpc { status, .. } => *status,
            GatewayError::Upstream(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    pub fn body(&self) -> ErrorBody {
        let detail = match self {
            GatewayError::Validation(err) => ErrorDetail {
                code: CODE_INVALID_PARAMS,
                message: err.to_string(),
                field: Some(err.field().to_string()),
                reason: Some(err.reason().to_string()),
                data: None,
            },
            GatewayError::NotFound { .. } | GatewayError::MethodNotAllowed { .. } => {
                ErrorDetail::new(CODE_NOT_FOUND, self.to_string())
            }
            GatewayError::Rpc { error, .. } => ErrorDetail {
                data: error.data.clone(),
                ..ErrorDetail::new(error.code, error.message.clone())
            },
            GatewayError::Upstream(_) => {
                ErrorDetail::new(CODE_UPSTREAM_UNAVAILABLE, "upstream unavailable")
            }
        };
        ErrorBody { error: detail }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let mut response = (self.status(), Json(self.body())).into_response();
        if let GatewayError::MethodNotAllowed { allow, .. } = &self {
            if let Ok(value) = HeaderValue::from_str(&allow.join(", ")) {
                response.headers_mut().insert(header::ALLOW, value);
            }
        }
        response
    }
}

/// The JSON error envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorDetail {
    pub code: i64,
    pub message: String,
    /// Offending request field, for validation errors.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    /// The daemon's `data` member, when it sent one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl ErrorDetail {
    pub fn new(code: i64, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            field: None,
            reason: None,
            data: None,
        }
    }
}

/// Maps daemon error codes onto HTTP statuses.
#[derive(Debug, Clone)]
pub struct ErrorClassifier {
    not_found: Vec<i64>,
    bad_request: Vec<i64>,
}

impl Default for ErrorClassifier {
    fn default() -> Self {
        Self::from_config(&ErrorsConfig::default())
    }
}

impl ErrorClassifier {
    pub fn from_config(config: &ErrorsConfig) -> Self {
        Self {
            not_found: config.not_found_codes.clone(),
            bad_request: config.bad_request_codes.clone(),
        }
    }

    /// 404 and 400 for the configured codes, 502 for everything else.
    pub fn classify(&self, code: i64) -> StatusCode {
        if self.not_found.contains(&code) {
            StatusCode::NOT_FOUND
        } else if self.bad_request.contains(&code) {
            StatusCode::BAD_REQUEST
        } else {
            StatusCode::BAD_GATEWAY
        }
    }

    /// Turn a failed call into the error the client will see.
    pub fn translate(&self, method: &str, err: RpcCallError) -> GatewayError {
        match err {
            RpcCallError::Rpc(error) => GatewayError::Rpc {
                status: self.classify(error.code),
                error,
            },
            RpcCallError::Transport(err) => {
                warn!(rpc = method, error = %err, "Daemon call failed");
                GatewayError::Upstream(err)
            }
        }
    }
}

// HTTP API error shape shared by every stage of the gateway pipeline
use std::backtrace::Backtrace;
use std::sync::Arc;

use axum::{http::StatusCode, response::IntoResponse, Json};
use serde_json::{json, Value};

/// Normalized error: every failure (auth, validation, downstream, cache)
/// ends up as one of these before it reaches the transport.
#[derive(Debug, Clone)]
pub struct ApiError {
    status_code: u16,
    code: u16,
    message: String,
    metadata: Option<Value>,
    backtrace: Option<Arc<Backtrace>>,
}

impl ApiError {
    pub fn new(status_code: u16, message: impl Into<String>) -> Self {
        let backtrace = if status_code >= 500 {
            Some(Arc::new(Backtrace::capture()))
        } else {
            None
        };

        Self {
            status_code,
            code: status_code,
            message: message.into(),
            metadata: None,
            backtrace,
        }
    }

    /// Attach structured details (e.g. the full validation error list)
    pub fn with_metadata(mut self, metadata: Value) -> Self {
        self.metadata = Some(metadata);
        self
    }

    /// Get HTTP status code
    pub fn status_code(&self) -> u16 {
        self.status_code
    }

    pub fn code(&self) -> u16 {
        self.code
    }

    /// Get client-safe error message
    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn metadata(&self) -> Option<&Value> {
        self.metadata.as_ref()
    }

    pub fn backtrace(&self) -> Option<&Backtrace> {
        self.backtrace.as_deref()
    }

    pub fn is_client_error(&self) -> bool {
        (400..500).contains(&self.status_code)
    }

    /// Convert to JSON response body
    pub fn to_json(&self) -> Value {
        json!({
            "message": self.message,
            "statusCode": self.status_code,
        })
    }

    /// Get error label for log lines
    pub fn error_code(&self) -> &'static str {
        match self.status_code {
            400 => "BAD_REQUEST",
            401 => "UNAUTHORIZED",
            403 => "FORBIDDEN",
            404 => "NOT_FOUND",
            409 => "CONFLICT",
            422 => "UNPROCESSABLE_ENTITY",
            429 => "TOO_MANY_REQUESTS",
            502 => "BAD_GATEWAY",
            503 => "SERVICE_UNAVAILABLE",
            504 => "GATEWAY_TIMEOUT",
            400..=499 => "CLIENT_ERROR",
            _ => "INTERNAL_SERVER_ERROR",
        }
    }

    /// Log once with severity derived from the status range
    pub fn log(&self) {
        if self.status_code >= 500 {
            tracing::error!(
                status = self.status_code,
                code = self.error_code(),
                backtrace = %self.backtrace.as_deref().map(|b| b.to_string()).unwrap_or_default(),
                "{}",
                self.message
            );
        } else {
            tracing::warn!(status = self.status_code, code = self.error_code(), "{}", self.message);
        }
    }
}

// Static constructor methods
impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(400, message)
    }

    pub fn validation_error(message: impl Into<String>, errors: Value) -> Self {
        Self::new(400, message).with_metadata(json!({ "errors": errors }))
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(401, message)
    }

    pub fn internal_server_error(message: impl Into<String>) -> Self {
        Self::new(500, message)
    }

    pub fn service_unavailable(message: impl Into<String>) -> Self {
        Self::new(503, message)
    }

    /// Error reported by a downstream function; its status code is kept verbatim
    pub fn downstream(status_code: Option<u16>, message: impl Into<String>) -> Self {
        Self::new(status_code.unwrap_or(500), message)
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        tracing::error!("JSON serialization error: {}", err);
        ApiError::internal_server_error("Failed to serialize payload")
    }
}

impl From<crate::cache::CacheError> for ApiError {
    fn from(err: crate::cache::CacheError) -> Self {
        use crate::cache::CacheError;

        match err {
            CacheError::InvalidSegment { .. } => ApiError::internal_server_error(err.to_string()),
            CacheError::Backend(msg) => {
                ApiError::service_unavailable(format!("cache unavailable: {}", msg))
            }
            CacheError::Serialization(e) => {
                ApiError::internal_server_error(format!("cache serialization failed: {}", e))
            }
        }
    }
}

impl From<crate::invoke::TransportError> for ApiError {
    fn from(err: crate::invoke::TransportError) -> Self {
        // No downstream statusCode exists at this layer, timeouts included
        ApiError::internal_server_error(err.to_string())
    }
}

impl From<crate::invoke::RouteError> for ApiError {
    fn from(err: crate::invoke::RouteError) -> Self {
        ApiError::internal_server_error(err.to_string())
    }
}

// Standard error trait implementations
impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for ApiError {}

// Automatic HTTP response conversion for Axum
impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        self.log();
        let status =
            StatusCode::from_u16(self.status_code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(self.to_json())).into_response()
    }
}

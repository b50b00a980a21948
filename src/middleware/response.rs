use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde_json::Value;

/// Relays a downstream result to the caller as plain JSON
#[derive(Debug)]
pub struct ApiResponse {
    pub data: Option<Value>,
    pub status_code: Option<StatusCode>,
}

impl ApiResponse {
    /// Create a response with default 200 status; `None` renders as 204
    pub fn success(data: Option<Value>) -> Self {
        Self {
            data,
            status_code: None,
        }
    }

    /// Create an API response with custom status code
    pub fn with_status(data: Option<Value>, status_code: StatusCode) -> Self {
        Self {
            data,
            status_code: Some(status_code),
        }
    }

    /// Create a 201 Created response
    pub fn created(data: Option<Value>) -> Self {
        Self::with_status(data, StatusCode::CREATED)
    }

    /// Create a 204 No Content response
    pub fn no_content() -> Self {
        Self::with_status(None, StatusCode::NO_CONTENT)
    }
}

impl IntoResponse for ApiResponse {
    fn into_response(self) -> Response {
        match self.data {
            None | Some(Value::Null) => StatusCode::NO_CONTENT.into_response(),
            Some(data) => (self.status_code.unwrap_or(StatusCode::OK), Json(data)).into_response(),
        }
    }
}

// Convenience type alias
pub type ApiResult = Result<ApiResponse, crate::error::ApiError>;

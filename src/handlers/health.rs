use std::sync::Arc;

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde_json::{json, Value};

use crate::gateway::Gateway;

/// GET / - service banner
pub async fn root(State(gateway): State<Arc<Gateway>>) -> Json<Value> {
    Json(json!({
        "name": "mex-gateway",
        "version": env!("CARGO_PKG_VERSION"),
        "environment": format!("{:?}", gateway.config.environment),
        "prefix": gateway.config.api.prefix,
    }))
}

/// GET /health - liveness plus cache backend reachability
pub async fn health(State(gateway): State<Arc<Gateway>>) -> impl IntoResponse {
    let now = chrono::Utc::now();
    let backend = gateway.cache.store().backend_name();

    match gateway.cache.store().ping().await {
        Ok(()) => (
            StatusCode::OK,
            Json(json!({
                "status": "ok",
                "timestamp": now,
                "cache": { "backend": backend, "status": "ok" },
            })),
        ),
        Err(e) => {
            tracing::warn!("Health check: cache unreachable: {}", e);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({
                    "status": "degraded",
                    "timestamp": now,
                    "cache": { "backend": backend, "status": "unavailable", "error": e.to_string() },
                })),
            )
        }
    }
}

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    routing::get,
    Extension, Router,
};
use serde_json::json;

use crate::cache::{encode_cache_key, GetOrSet};
use crate::gateway::Gateway;
use crate::invoke::InvocationOptions;
use crate::middleware::{ApiResponse, ApiResult, RequestContext};

const PUBLIC_NODE_LABEL: &str = "PUBLIC_NODE";

pub fn routes() -> Router<Arc<Gateway>> {
    Router::new().route("/public/node/:id", get(get_node))
}

/// GET /public/node/:id - published node, served by a function that takes
/// its input directly rather than a request envelope
pub async fn get_node(
    State(gateway): State<Arc<Gateway>>,
    Extension(context): Extension<RequestContext>,
    Path(id): Path<String>,
) -> ApiResult {
    let key = encode_cache_key(&[PUBLIC_NODE_LABEL, id.as_str()])?;
    let options = InvocationOptions::new().payload(json!({ "nodeId": id }));

    let node = gateway
        .cache
        .get_or_set(GetOrSet::new(key), || {
            gateway.forward_direct("getPublicNode", options, &context)
        })
        .await?;

    Ok(ApiResponse::success(Some(node)))
}

use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    routing::{get, post},
    Extension, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::cache::{encode_cache_key, CacheError, GetOrSet};
use crate::gateway::Gateway;
use crate::invoke::InvocationOptions;
use crate::middleware::{ApiResponse, ApiResult, JsonBody, RequestContext};

const NODE_LABEL: &str = "NODE";

pub fn routes() -> Router<Arc<Gateway>> {
    Router::new()
        .route("/node", post(create))
        .route("/node/ids", post(get_many))
        .route("/node/:id", get(get_one).put(update).delete(archive))
}

#[derive(Debug, Default, Deserialize)]
pub struct GetQuery {
    /// Bypass the cache and refetch
    #[serde(default)]
    pub refresh: bool,
}

#[derive(Debug, Deserialize)]
pub struct IdsRequest {
    pub ids: Vec<String>,
}

fn node_key(context: &RequestContext, id: &str) -> Result<String, CacheError> {
    encode_cache_key(&[NODE_LABEL, context.workspace_id.as_deref().unwrap_or_default(), id])
}

/// GET /node/:id - fetch one node, read through the cache
pub async fn get_one(
    State(gateway): State<Arc<Gateway>>,
    Extension(context): Extension<RequestContext>,
    Path(id): Path<String>,
    Query(query): Query<GetQuery>,
) -> ApiResult {
    let params = GetOrSet::new(node_key(&context, &id)?).force(query.refresh);
    let options = InvocationOptions::new().path_param("id", id.as_str());

    let node = gateway.forward_cached(params, "getNode", options, &context).await?;
    Ok(ApiResponse::success(Some(node)))
}

/// POST /node - create a node
pub async fn create(
    State(gateway): State<Arc<Gateway>>,
    Extension(context): Extension<RequestContext>,
    JsonBody(body): JsonBody,
) -> ApiResult {
    let body = gateway.validate(body, Some("CreateNode"))?;
    let created = gateway
        .forward("createNode", InvocationOptions::new().payload(body), &context)
        .await?;
    Ok(ApiResponse::created(created))
}

/// PUT /node/:id - update a node and refresh its cache entry
pub async fn update(
    State(gateway): State<Arc<Gateway>>,
    Extension(context): Extension<RequestContext>,
    Path(id): Path<String>,
    JsonBody(body): JsonBody,
) -> ApiResult {
    let body = gateway.validate(body, Some("UpdateNode"))?;
    let options = InvocationOptions::new()
        .path_param("id", id.as_str())
        .payload(body);

    let updated = gateway.forward("updateNode", options, &context).await?;

    let key = node_key(&context, &id)?;
    match &updated {
        Some(node) => gateway.cache.replace_and_set(&key, node.clone(), None).await?,
        None => gateway.cache.del(&key).await?,
    }

    Ok(ApiResponse::success(updated))
}

/// DELETE /node/:id - archive a node in the background
pub async fn archive(
    State(gateway): State<Arc<Gateway>>,
    Extension(context): Extension<RequestContext>,
    Path(id): Path<String>,
) -> ApiResult {
    gateway.cache.del(&node_key(&context, &id)?).await?;
    gateway.fire_and_forget(
        "archiveNode",
        InvocationOptions::new().path_param("id", id.as_str()),
        &context,
    )?;
    Ok(ApiResponse::no_content())
}

/// POST /node/ids - fetch many nodes; cached ones are served directly, the
/// rest are fanned out and reported per id
pub async fn get_many(
    State(gateway): State<Arc<Gateway>>,
    Extension(context): Extension<RequestContext>,
    JsonBody(body): JsonBody,
) -> ApiResult {
    let request: IdsRequest = serde_json::from_value(gateway.validate(body, Some("NodeIds"))?)?;

    let keys = request
        .ids
        .iter()
        .map(|id| node_key(&context, id))
        .collect::<Result<Vec<_>, _>>()?;
    // A cached `null` is an earlier empty reply, so it is fetched again
    let mut cached = gateway.cache.mget_map(&keys).await?;
    cached.retain(|_, node| !node.is_null());

    let misses: Vec<String> = request
        .ids
        .iter()
        .zip(&keys)
        .filter(|(_, key)| !cached.contains_key(key.as_str()))
        .map(|(id, _)| id.clone())
        .collect();

    let settled = gateway
        .forward_all_settled(
            "getNode",
            InvocationOptions::new().all_settled(misses, "id"),
            &context,
        )
        .await?;

    // Keyed by the requested id, not whatever the reply carries
    let mut fresh = HashMap::new();
    for (id, node) in settled.successful.into_iter().filter(|(_, node)| !node.is_null()) {
        fresh.insert(node_key(&context, &id)?, node);
    }

    let successful: Vec<Value> = cached.values().chain(fresh.values()).cloned().collect();
    gateway.cache.mset(fresh, None).await?;
    let failed: Vec<Value> = settled.failed.iter().map(|err| err.to_json()).collect();

    Ok(ApiResponse::success(Some(json!({
        "successful": successful,
        "failed": failed,
    }))))
}

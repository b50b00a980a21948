use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    routing::get,
    Extension, Router,
};

use crate::cache::{encode_cache_key, GetOrSet};
use crate::gateway::Gateway;
use crate::invoke::InvocationOptions;
use crate::middleware::{ApiResponse, ApiResult, JsonBody, RequestContext};
use crate::transform::filter_empty;

const SNIPPET_LABEL: &str = "SNIPPET";

pub fn routes() -> Router<Arc<Gateway>> {
    Router::new()
        .route("/snippet", get(list).post(create))
        .route("/snippet/:id", get(get_one))
}

/// GET /snippet - list snippets of the workspace
pub async fn list(
    State(gateway): State<Arc<Gateway>>,
    Extension(context): Extension<RequestContext>,
    Query(query): Query<HashMap<String, String>>,
) -> ApiResult {
    let options = InvocationOptions::new().query(filter_empty(query));
    let snippets = gateway.forward("getAllSnippets", options, &context).await?;
    Ok(ApiResponse::success(snippets))
}

/// GET /snippet/:id
pub async fn get_one(
    State(gateway): State<Arc<Gateway>>,
    Extension(context): Extension<RequestContext>,
    Path(id): Path<String>,
) -> ApiResult {
    let key = encode_cache_key(&[
        SNIPPET_LABEL,
        context.workspace_id.as_deref().unwrap_or_default(),
        id.as_str(),
    ])?;
    let options = InvocationOptions::new().path_param("id", id.as_str());

    let snippet = gateway
        .forward_cached(GetOrSet::new(key), "getSnippet", options, &context)
        .await?;
    Ok(ApiResponse::success(Some(snippet)))
}

/// POST /snippet
pub async fn create(
    State(gateway): State<Arc<Gateway>>,
    Extension(context): Extension<RequestContext>,
    JsonBody(body): JsonBody,
) -> ApiResult {
    let body = gateway.validate(body, Some("CreateSnippet"))?;
    let created = gateway
        .forward("createSnippet", InvocationOptions::new().payload(body), &context)
        .await?;
    Ok(ApiResponse::created(created))
}

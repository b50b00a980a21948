use std::sync::Arc;

use axum::{
    extract::{Path, State},
    routing::{get, post},
    Extension, Router,
};

use crate::gateway::Gateway;
use crate::invoke::InvocationOptions;
use crate::middleware::{ApiResponse, ApiResult, RequestContext};

pub fn routes() -> Router<Arc<Gateway>> {
    Router::new()
        .route("/bookmark", get(list))
        .route("/bookmark/:node_id", post(create).delete(remove))
}

/// GET /bookmark - bookmarked node ids of the current user
pub async fn list(
    State(gateway): State<Arc<Gateway>>,
    Extension(context): Extension<RequestContext>,
) -> ApiResult {
    let bookmarks = gateway
        .forward("getAllBookmarks", InvocationOptions::new(), &context)
        .await?;
    Ok(ApiResponse::success(bookmarks))
}

/// POST /bookmark/:node_id
pub async fn create(
    State(gateway): State<Arc<Gateway>>,
    Extension(context): Extension<RequestContext>,
    Path(node_id): Path<String>,
) -> ApiResult {
    let options = InvocationOptions::new().path_param("nodeID", node_id);
    let created = gateway.forward("createBookmark", options, &context).await?;
    Ok(ApiResponse::created(created))
}

/// DELETE /bookmark/:node_id
pub async fn remove(
    State(gateway): State<Arc<Gateway>>,
    Extension(context): Extension<RequestContext>,
    Path(node_id): Path<String>,
) -> ApiResult {
    let options = InvocationOptions::new().path_param("nodeID", node_id);
    gateway.forward("deleteBookmark", options, &context).await?;
    Ok(ApiResponse::no_content())
}

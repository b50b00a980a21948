use std::sync::Arc;

use axum::{
    extract::State,
    routing::{get, put},
    Extension, Router,
};

use crate::cache::{encode_cache_key, GetOrSet};
use crate::gateway::Gateway;
use crate::invoke::InvocationOptions;
use crate::middleware::{ApiResponse, ApiResult, JsonBody, RequestContext};

const USER_LABEL: &str = "USER";

pub fn routes() -> Router<Arc<Gateway>> {
    Router::new()
        .route("/user/me", get(me))
        .route("/user/info", put(update))
        .route("/user/workspace", get(workspace))
}

/// GET /user/me - profile of the caller; no workspace needed
pub async fn me(
    State(gateway): State<Arc<Gateway>>,
    Extension(context): Extension<RequestContext>,
) -> ApiResult {
    let key = encode_cache_key(&[USER_LABEL, context.user_id.as_str()])?;
    let user = gateway
        .forward_cached(GetOrSet::new(key), "getUser", InvocationOptions::new(), &context)
        .await?;
    Ok(ApiResponse::success(Some(user)))
}

/// PUT /user/info
pub async fn update(
    State(gateway): State<Arc<Gateway>>,
    Extension(context): Extension<RequestContext>,
    JsonBody(body): JsonBody,
) -> ApiResult {
    let body = gateway.validate(body, Some("UpdateUser"))?;
    let updated = gateway
        .forward("updateUser", InvocationOptions::new().payload(body), &context)
        .await?;

    gateway
        .cache
        .del(&encode_cache_key(&[USER_LABEL, context.user_id.as_str()])?)
        .await?;

    Ok(ApiResponse::success(updated))
}

/// GET /user/workspace - members of the current workspace; needs the header
pub async fn workspace(
    State(gateway): State<Arc<Gateway>>,
    Extension(context): Extension<RequestContext>,
) -> ApiResult {
    let users = gateway
        .forward("getUsersOfWorkspace", InvocationOptions::new(), &context)
        .await?;
    Ok(ApiResponse::success(users))
}

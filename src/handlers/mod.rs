// Per-resource controllers. Each one only shapes invocation options and
// hands off to the gateway pipeline; business logic lives downstream.
use std::sync::Arc;

use axum::Router;

use crate::gateway::Gateway;

pub mod bookmark;
pub mod health;
pub mod node;
pub mod public;
pub mod snippet;
pub mod user;

/// Every authenticated resource route, relative to the API prefix
pub fn routes() -> Router<Arc<Gateway>> {
    Router::new()
        .merge(node::routes())
        .merge(snippet::routes())
        .merge(bookmark::routes())
        .merge(user::routes())
        .merge(public::routes())
}

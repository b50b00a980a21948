use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::{header::AUTHORIZATION, HeaderMap},
    middleware::Next,
    response::Response,
};

use super::workspace::{WorkspacePolicy, WorkspaceValidator, WORKSPACE_HEADER};
use crate::auth::{ClaimVerifier, Verification};
use crate::error::ApiError;

/// Per-request facts established by the authorization guard
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RequestContext {
    pub workspace_id: Option<String>,
    /// Raw `Authorization` header value, forwarded downstream as-is
    pub id_token: String,
    /// Subject with hyphens stripped; downstream identifiers are hyphen-free
    pub user_id: String,
    pub user_email: String,
    pub user_id_raw: String,
}

/// Everything the guard needs, built once at startup
pub struct AuthGuard {
    pub verifier: Arc<ClaimVerifier>,
    pub policy: WorkspacePolicy,
    pub workspace_validator: Arc<dyn WorkspaceValidator>,
}

impl AuthGuard {
    pub async fn authorize(&self, path: &str, headers: &HeaderMap) -> Result<RequestContext, ApiError> {
        let auth_header = header_str(headers, AUTHORIZATION.as_str());
        let token = auth_header
            .and_then(extract_bearer_token)
            .ok_or_else(|| ApiError::bad_request("no token provided"))?;

        let claim = match self.verifier.verify(token).await {
            Verification::Valid(claim) => claim,
            Verification::Invalid { error } => return Err(ApiError::unauthorized(error)),
        };

        let mut context = RequestContext {
            workspace_id: None,
            id_token: auth_header.unwrap_or_default().to_string(),
            user_id: claim.user_id.replace('-', ""),
            user_email: claim.user_email,
            user_id_raw: claim.user_id,
        };

        if self.policy.requires_workspace(path) {
            let workspace_id = header_str(headers, WORKSPACE_HEADER);
            if !self.workspace_validator.validate(workspace_id, auth_header) {
                return Err(ApiError::bad_request("workspace is invalid"));
            }
            context.workspace_id = workspace_id.map(str::to_string);
        }

        tracing::debug!(
            "Authorized user {} for {} (workspace: {:?})",
            context.user_id,
            path,
            context.workspace_id
        );

        Ok(context)
    }
}

/// Authorization middleware: verifies the bearer token, checks the workspace
/// scope and injects a `RequestContext` into the request
pub async fn authorize_middleware(
    State(guard): State<Arc<AuthGuard>>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let path = request.uri().path().to_string();
    let context = guard.authorize(&path, request.headers()).await?;

    request.extensions_mut().insert(context);

    Ok(next.run(request).await)
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

/// Extract the token from `Bearer <token>`; a bare token is accepted too
fn extract_bearer_token(value: &str) -> Option<&str> {
    let token = value
        .strip_prefix("Bearer ")
        .or_else(|| value.strip_prefix("bearer "))
        .unwrap_or(value)
        .trim();

    if token.is_empty() {
        None
    } else {
        Some(token)
    }
}

// Request pipeline shared by every handler: validate -> cache -> build -> invoke
use std::sync::Arc;

use axum::{
    extract::Request,
    http::{HeaderValue, Method},
    middleware,
    routing::get,
    Router,
};
use serde_json::Value;
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    trace::TraceLayer,
};
use uuid::Uuid;

use crate::auth::ClaimVerifier;
use crate::cache::{CacheStore, GetOrSet, ResponseCache};
use crate::config::{AppConfig, SecurityConfig};
use crate::error::ApiError;
use crate::handlers;
use crate::invoke::{
    AllSettled, EnvelopeBuilder, FunctionTransport, InvocationOptions, InvocationSource, Invoker,
    PreparedInvocation, RouteTable,
};
use crate::middleware::{authorize_middleware, AuthGuard, HeaderShapeValidator, RequestContext, WorkspacePolicy};
use crate::validation::SchemaRegistry;

/// Process-wide components, constructed once and shared through axum state
pub struct Gateway {
    pub config: AppConfig,
    pub registry: SchemaRegistry,
    pub builder: EnvelopeBuilder,
    pub invoker: Invoker,
    pub cache: ResponseCache,
    pub guard: Arc<AuthGuard>,
}

impl Gateway {
    pub fn new(
        config: AppConfig,
        routes: RouteTable,
        registry: SchemaRegistry,
        transport: Arc<dyn FunctionTransport>,
        cache: Arc<dyn CacheStore>,
        verifier: ClaimVerifier,
    ) -> Self {
        let guard = AuthGuard {
            verifier: Arc::new(verifier),
            policy: WorkspacePolicy::from_config(&config.api),
            workspace_validator: Arc::new(HeaderShapeValidator),
        };

        tracing::info!(
            "Gateway ready: {} routes, {} schemas, {} cache",
            routes.len(),
            registry.len(),
            cache.backend_name()
        );

        Self {
            config,
            registry,
            builder: EnvelopeBuilder::new(Arc::new(routes)),
            invoker: Invoker::new(transport),
            cache: ResponseCache::new(cache),
            guard: Arc::new(guard),
        }
    }

    /// Schema check on an inbound body; `None` skips validation
    pub fn validate(&self, payload: Value, type_name: Option<&str>) -> Result<Value, ApiError> {
        self.registry.validate(payload, type_name)
    }

    /// Invoke `route` once and require a successful downstream status
    pub async fn forward(
        &self,
        route: &str,
        options: InvocationOptions,
        context: &RequestContext,
    ) -> Result<Option<Value>, ApiError> {
        let invocation = single(self.builder.build(route, &options, context)?, route)?;
        self.invoker.invoke_and_check(&invocation).await
    }

    /// Like `forward`, but read through the response cache
    pub async fn forward_cached(
        &self,
        params: GetOrSet,
        route: &str,
        options: InvocationOptions,
        context: &RequestContext,
    ) -> Result<Value, ApiError> {
        self.cache
            .get_or_set(params, || async move {
                self.forward(route, options, context)
                    .await
                    .map(Option::unwrap_or_default)
            })
            .await
    }

    /// Direct invocation: payload passed verbatim, reply returned as-is
    /// unless it signals a downstream failure
    pub async fn forward_direct(
        &self,
        route: &str,
        options: InvocationOptions,
        context: &RequestContext,
    ) -> Result<Value, ApiError> {
        let options = options.source(InvocationSource::Direct);
        let invocation = single(self.builder.build(route, &options, context)?, route)?;
        self.invoker.invoke_direct(&invocation).await
    }

    /// One invocation per fan-out id; failures never abort the batch
    pub async fn forward_all_settled(
        &self,
        route: &str,
        options: InvocationOptions,
        context: &RequestContext,
    ) -> Result<AllSettled, ApiError> {
        if options.all_settled.is_none() {
            return Err(ApiError::internal_server_error(format!(
                "route {route}: fan-out requested without ids"
            )));
        }
        let invocations = self.builder.build(route, &options, context)?;
        Ok(self.invoker.invoke_all_settled(&invocations).await)
    }

    /// Fire-and-forget: returns once the calls are spawned, before they run.
    /// Failures are only logged.
    pub fn fire_and_forget(
        &self,
        route: &str,
        options: InvocationOptions,
        context: &RequestContext,
    ) -> Result<usize, ApiError> {
        let invocations = self.builder.build(route, &options.fire_and_forget(), context)?;
        let spawned = invocations.len();
        for invocation in invocations {
            self.invoker.spawn_detached(invocation);
        }
        Ok(spawned)
    }
}

fn single(mut prepared: Vec<PreparedInvocation>, route: &str) -> Result<PreparedInvocation, ApiError> {
    match (prepared.pop(), prepared.is_empty()) {
        (Some(invocation), true) => Ok(invocation),
        _ => Err(ApiError::internal_server_error(format!(
            "route {route} did not resolve to a single invocation"
        ))),
    }
}

/// Build the HTTP surface: public probes at the root, every resource route
/// behind the authorization guard under the configured prefix.
pub fn app(gateway: Arc<Gateway>) -> Router {
    let api = handlers::routes().route_layer(middleware::from_fn_with_state(
        gateway.guard.clone(),
        authorize_middleware,
    ));

    let prefix = gateway.config.api.prefix.trim_end_matches('/').to_string();
    let router = Router::new()
        .route("/", get(handlers::health::root))
        .route("/health", get(handlers::health::health));

    // axum refuses to nest at the root
    let router = if prefix.is_empty() {
        router.merge(api)
    } else {
        router.nest(&prefix, api)
    };

    let router = match cors_layer(&gateway.config.security) {
        Some(cors) => router.layer(cors),
        None => router,
    };

    router
        .layer(TraceLayer::new_for_http().make_span_with(|request: &Request| {
            tracing::info_span!(
                "request",
                method = %request.method(),
                uri = %request.uri(),
                request_id = %Uuid::new_v4(),
            )
        }))
        .with_state(gateway)
}

fn cors_layer(security: &SecurityConfig) -> Option<CorsLayer> {
    if !security.enable_cors {
        return None;
    }
    if security.cors_origins.is_empty() {
        return Some(CorsLayer::permissive());
    }

    let origins: Vec<HeaderValue> = security
        .cors_origins
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();

    Some(
        CorsLayer::new()
            .allow_origin(AllowOrigin::list(origins))
            .allow_methods([
                Method::GET,
                Method::POST,
                Method::PUT,
                Method::PATCH,
                Method::DELETE,
                Method::OPTIONS,
            ])
            .allow_headers(Any),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn invocation(id: &str) -> PreparedInvocation {
        PreparedInvocation {
            target: "node-test".to_string(),
            invocation_type: Default::default(),
            payload: json!({}),
            id: Some(id.to_string()),
        }
    }

    #[test]
    fn single_requires_exactly_one() {
        assert!(single(vec![invocation("a")], "getNode").is_ok());
        assert_eq!(single(vec![], "getNode").unwrap_err().status_code(), 500);
        assert_eq!(
            single(vec![invocation("a"), invocation("b")], "getNode")
                .unwrap_err()
                .status_code(),
            500
        );
    }

    #[test]
    fn cors_follows_security_config() {
        let mut security = SecurityConfig {
            enable_cors: false,
            cors_origins: Vec::new(),
        };
        assert!(cors_layer(&security).is_none());

        security.enable_cors = true;
        security.cors_origins = vec!["http://localhost:3000".to_string()];
        assert!(cors_layer(&security).is_some());
    }
}

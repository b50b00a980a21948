#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde_json::{json, Value};
use tower::ServiceExt;
use tracing_subscriber::EnvFilter;

use mex_gateway::auth::{ClaimVerifier, StaticJwks};
use mex_gateway::cache::MemoryCache;
use mex_gateway::config::AppConfig;
use mex_gateway::invoke::{FunctionTransport, InvocationType, RouteTable, TransportError};
use mex_gateway::validation::SchemaRegistry;
use mex_gateway::{app, Gateway};

pub const ISSUER: &str = "https://cognito-idp.us-east-1.amazonaws.com/us-east-1_test";
pub const USER_ID: &str = "abc-123-def";
pub const WORKSPACE_ID: &str = "WORKSPACE_1";

const JWKS: &str = include_str!("../fixtures/jwks.json");
const SIGNING_KEY: &[u8] = include_bytes!("../fixtures/signing_key.pem");
const ROUTES: &str = include_str!("../../config/routes.yaml");

/// One recorded downstream call
#[derive(Debug, Clone)]
pub struct Call {
    pub target: String,
    pub invocation_type: InvocationType,
    pub payload: Value,
}

type Responder = dyn Fn(&str, &Value) -> Value + Send + Sync;

/// Downstream stand-in: records every call and answers through `respond`
pub struct StubTransport {
    respond: Box<Responder>,
    calls: Mutex<Vec<Call>>,
}

impl StubTransport {
    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_to(&self, route_key: &str) -> Vec<Call> {
        self.calls()
            .into_iter()
            .filter(|c| c.payload["routeKey"] == route_key)
            .collect()
    }

    /// Wait for detached invocations to land
    pub async fn wait_for_calls(&self, count: usize) -> Vec<Call> {
        for _ in 0..100 {
            let calls = self.calls();
            if calls.len() >= count {
                return calls;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        self.calls()
    }
}

#[async_trait]
impl FunctionTransport for StubTransport {
    async fn invoke(
        &self,
        function: &str,
        invocation_type: InvocationType,
        payload: Vec<u8>,
    ) -> Result<Vec<u8>, TransportError> {
        let payload: Value =
            serde_json::from_slice(&payload).map_err(|e| TransportError::Request(e.to_string()))?;
        let response = (self.respond)(function, &payload);
        self.calls.lock().unwrap().push(Call {
            target: function.to_string(),
            invocation_type,
            payload,
        });
        serde_json::to_vec(&response).map_err(|e| TransportError::Request(e.to_string()))
    }
}

/// Successful gateway-style response carrying `body`
pub fn ok(body: Value) -> Value {
    json!({ "statusCode": 200, "body": body.to_string() })
}

pub fn status(code: u16, message: &str) -> Value {
    json!({ "statusCode": code, "body": json!({ "message": message }).to_string() })
}

/// Echoes `{id, title}` for any envelope carrying `pathParameters.id`
pub fn echo_node(_target: &str, envelope: &Value) -> Value {
    match envelope["pathParameters"]["id"].as_str() {
        Some(id) => ok(json!({ "id": id, "title": format!("title {id}") })),
        None => json!({ "statusCode": 204 }),
    }
}

pub struct TestApp {
    pub router: Router,
    pub gateway: Arc<Gateway>,
    pub transport: Arc<StubTransport>,
}

pub fn test_app(respond: impl Fn(&str, &Value) -> Value + Send + Sync + 'static) -> Result<TestApp> {
    // RUST_LOG=mex_gateway=debug cargo test -- --nocapture
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();

    let config = AppConfig::development();
    let routes = RouteTable::from_yaml(ROUTES, "test")?;
    let registry = SchemaRegistry::from_dir(concat!(env!("CARGO_MANIFEST_DIR"), "/schemas"))?;
    let transport = Arc::new(StubTransport {
        respond: Box::new(respond),
        calls: Mutex::new(Vec::new()),
    });
    let cache = Arc::new(MemoryCache::new(1_000, Duration::from_secs(60)));
    let verifier = ClaimVerifier::new(ISSUER, Arc::new(StaticJwks::from_json(JWKS)?));

    let gateway = Arc::new(Gateway::new(
        config,
        routes,
        registry,
        transport.clone(),
        cache,
        verifier,
    ));

    Ok(TestApp {
        router: app(gateway.clone()),
        gateway,
        transport,
    })
}

pub fn claims() -> Value {
    let now = chrono::Utc::now().timestamp();
    json!({
        "sub": USER_ID,
        "iss": ISSUER,
        "exp": now + 3600,
        "auth_time": now - 60,
        "token_use": "id",
        "email": "user@example.com",
        "event_id": "evt-1",
    })
}

pub fn sign(claims: &Value) -> String {
    let mut header = Header::new(Algorithm::RS256);
    header.kid = Some("test-key-1".to_string());
    encode(&header, claims, &EncodingKey::from_rsa_pem(SIGNING_KEY).unwrap()).unwrap()
}

pub fn token() -> String {
    sign(&claims())
}

/// Request carrying a valid token and workspace header
pub fn authed(method: &str, uri: &str) -> axum::http::request::Builder {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("authorization", format!("Bearer {}", token()))
        .header("mex-workspace-id", WORKSPACE_ID)
}

pub fn json_body(builder: axum::http::request::Builder, body: Value) -> Request<Body> {
    builder
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub fn empty(builder: axum::http::request::Builder) -> Request<Body> {
    builder.body(Body::empty()).unwrap()
}

/// Drive the router in-process; empty bodies come back as `Null`
pub async fn send(router: &Router, request: Request<Body>) -> Result<(StatusCode, Value)> {
    let response = router.clone().oneshot(request).await?;
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await?;
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes)
            .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
    };
    Ok((status, body))
}

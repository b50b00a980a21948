use std::collections::HashMap;
use std::sync::Arc;

use axum::http::Method;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::routes::RouteTable;
use crate::error::ApiError;
use crate::middleware::{RequestContext, WORKSPACE_HEADER};

/// How the downstream function expects its input
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum InvocationSource {
    /// Payload passed through verbatim
    Direct,
    /// Payload wrapped into a gateway-style request envelope
    #[default]
    ApiGateway,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum InvocationType {
    #[default]
    RequestResponse,
    /// Fire-and-forget; the caller never sees the result
    Event,
}

impl InvocationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            InvocationType::RequestResponse => "RequestResponse",
            InvocationType::Event => "Event",
        }
    }
}

/// Issue one invocation per id, substituting it into `path_parameters[key]`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AllSettledSpec {
    pub ids: Vec<String>,
    pub key: String,
}

/// Gateway-style request envelope sent to a downstream function
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvocationEnvelope {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path_parameters: Option<HashMap<String, String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    pub route_key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub query_string_parameters: Option<HashMap<String, String>>,
    pub headers: HashMap<String, String>,
}

#[derive(Debug, Clone, Default)]
pub struct InvocationOptions {
    pub payload: Option<Value>,
    pub path_parameters: HashMap<String, String>,
    pub query_string_parameters: HashMap<String, String>,
    pub additional_headers: HashMap<String, String>,
    pub http_method: Option<Method>,
    pub all_settled: Option<AllSettledSpec>,
    pub invocation_source: InvocationSource,
    pub invocation_type: InvocationType,
    /// Payload is already serialized; place it in `body` without re-encoding
    pub send_raw_body: bool,
}

impl InvocationOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn payload(mut self, payload: Value) -> Self {
        self.payload = Some(payload);
        self
    }

    pub fn path_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.path_parameters.insert(key.into(), value.into());
        self
    }

    pub fn query(mut self, query: HashMap<String, String>) -> Self {
        self.query_string_parameters.extend(query);
        self
    }

    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.additional_headers.insert(key.into(), value.into());
        self
    }

    pub fn method(mut self, method: Method) -> Self {
        self.http_method = Some(method);
        self
    }

    pub fn all_settled(mut self, ids: Vec<String>, key: impl Into<String>) -> Self {
        self.all_settled = Some(AllSettledSpec {
            ids,
            key: key.into(),
        });
        self
    }

    pub fn source(mut self, source: InvocationSource) -> Self {
        self.invocation_source = source;
        self
    }

    pub fn fire_and_forget(mut self) -> Self {
        self.invocation_type = InvocationType::Event;
        self
    }

    pub fn raw_body(mut self) -> Self {
        self.send_raw_body = true;
        self
    }
}

/// A fully resolved call: which function, how, and with what bytes
#[derive(Debug, Clone, PartialEq)]
pub struct PreparedInvocation {
    pub target: String,
    pub invocation_type: InvocationType,
    pub payload: Value,
    /// Fan-out id this invocation was built for
    pub id: Option<String>,
}

/// Turns a logical route name plus options into downstream invocations
#[derive(Clone)]
pub struct EnvelopeBuilder {
    routes: Arc<RouteTable>,
}

impl EnvelopeBuilder {
    pub fn new(routes: Arc<RouteTable>) -> Self {
        Self { routes }
    }

    /// Build the invocations for `route_name`: one, or one per fan-out id
    pub fn build(
        &self,
        route_name: &str,
        options: &InvocationOptions,
        context: &RequestContext,
    ) -> Result<Vec<PreparedInvocation>, ApiError> {
        let descriptor = self.routes.get(route_name)?;
        let target = self.routes.target(descriptor);
        let route_key = descriptor.route_key(options.http_method.as_ref());

        if options.invocation_source == InvocationSource::Direct {
            if options.all_settled.is_some() {
                return Err(ApiError::internal_server_error(format!(
                    "route {route_name}: fan-out requires gateway-style invocation"
                )));
            }
            return Ok(vec![PreparedInvocation {
                target,
                invocation_type: options.invocation_type,
                payload: options.payload.clone().unwrap_or(Value::Null),
                id: None,
            }]);
        }

        let body = encode_body(options)?;
        let headers = headers(options, context);
        let query = non_empty(options.query_string_parameters.clone());

        let envelope = |path_parameters: HashMap<String, String>| InvocationEnvelope {
            path_parameters: non_empty(path_parameters),
            body: body.clone(),
            route_key: route_key.clone(),
            query_string_parameters: query.clone(),
            headers: headers.clone(),
        };

        let prepared = match &options.all_settled {
            Some(spec) => spec
                .ids
                .iter()
                .map(|id| {
                    let mut params = options.path_parameters.clone();
                    params.insert(spec.key.clone(), id.clone());
                    Ok(PreparedInvocation {
                        target: target.clone(),
                        invocation_type: options.invocation_type,
                        payload: serde_json::to_value(envelope(params))?,
                        id: Some(id.clone()),
                    })
                })
                .collect::<Result<Vec<_>, ApiError>>()?,
            None => vec![PreparedInvocation {
                target,
                invocation_type: options.invocation_type,
                payload: serde_json::to_value(envelope(options.path_parameters.clone()))?,
                id: None,
            }],
        };

        tracing::debug!(
            "Built {} invocation(s) for route {} ({})",
            prepared.len(),
            route_name,
            route_key
        );

        Ok(prepared)
    }
}

fn encode_body(options: &InvocationOptions) -> Result<Option<String>, ApiError> {
    match &options.payload {
        None => Ok(None),
        Some(Value::String(raw)) if options.send_raw_body => Ok(Some(raw.clone())),
        Some(payload) => Ok(Some(serde_json::to_string(payload)?)),
    }
}

fn headers(options: &InvocationOptions, context: &RequestContext) -> HashMap<String, String> {
    let mut headers = HashMap::from([
        (
            WORKSPACE_HEADER.to_string(),
            context.workspace_id.clone().unwrap_or_default(),
        ),
        ("authorization".to_string(), context.id_token.clone()),
    ]);
    headers.extend(options.additional_headers.clone());
    headers
}

fn non_empty(map: HashMap<String, String>) -> Option<HashMap<String, String>> {
    if map.is_empty() {
        None
    } else {
        Some(map)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::invoke::routes::RouteDescriptor;
    use serde_json::json;

    fn builder() -> EnvelopeBuilder {
        let mut table = RouteTable::new("test");
        table.insert(
            "getNode",
            RouteDescriptor::parse("getNode", "GET /v1/node/{id}", "node").unwrap(),
        );
        table.insert(
            "updateNode",
            RouteDescriptor::parse("updateNode", "POST /v1/node", "node").unwrap(),
        );
        EnvelopeBuilder::new(Arc::new(table))
    }

    fn context() -> RequestContext {
        RequestContext {
            workspace_id: Some("WORKSPACE_1".to_string()),
            id_token: "Bearer abc".to_string(),
            user_id: "u1".to_string(),
            user_email: "u@example.com".to_string(),
            user_id_raw: "u-1".to_string(),
        }
    }

    fn envelope(p: &PreparedInvocation) -> InvocationEnvelope {
        serde_json::from_value(p.payload.clone()).unwrap()
    }

    #[test]
    fn builds_gateway_envelope() {
        let options = InvocationOptions::new()
            .payload(json!({ "title": "t" }))
            .path_param("id", "NODE_1");
        let out = builder().build("getNode", &options, &context()).unwrap();

        assert_eq!(out.len(), 1);
        assert_eq!(out[0].target, "node-test");
        assert_eq!(out[0].invocation_type, InvocationType::RequestResponse);

        let env = envelope(&out[0]);
        assert_eq!(env.route_key, "GET /v1/node/{id}");
        assert_eq!(env.body.as_deref(), Some(r#"{"title":"t"}"#));
        assert_eq!(env.path_parameters.unwrap()["id"], "NODE_1");
        assert!(env.query_string_parameters.is_none());
        assert_eq!(env.headers["mex-workspace-id"], "WORKSPACE_1");
        assert_eq!(env.headers["authorization"], "Bearer abc");
    }

    #[test]
    fn omits_absent_fields_on_the_wire() {
        let out = builder()
            .build("getNode", &InvocationOptions::new(), &context())
            .unwrap();
        let wire = out[0].payload.as_object().unwrap();
        assert!(!wire.contains_key("body"));
        assert!(!wire.contains_key("pathParameters"));
        assert!(wire.contains_key("routeKey"));
    }

    #[test]
    fn missing_workspace_becomes_empty_header() {
        let mut ctx = context();
        ctx.workspace_id = None;
        let out = builder().build("getNode", &InvocationOptions::new(), &ctx).unwrap();
        assert_eq!(envelope(&out[0]).headers["mex-workspace-id"], "");
    }

    #[test]
    fn additional_headers_override_defaults() {
        let options = InvocationOptions::new()
            .header("mex-workspace-id", "WORKSPACE_2")
            .header("x-trace", "1");
        let out = builder().build("getNode", &options, &context()).unwrap();
        let env = envelope(&out[0]);
        assert_eq!(env.headers["mex-workspace-id"], "WORKSPACE_2");
        assert_eq!(env.headers["x-trace"], "1");
    }

    #[test]
    fn method_override_changes_route_key() {
        let options = InvocationOptions::new().method(Method::DELETE);
        let out = builder().build("getNode", &options, &context()).unwrap();
        assert_eq!(envelope(&out[0]).route_key, "DELETE /v1/node/{id}");
    }

    #[test]
    fn fans_out_one_envelope_per_id() {
        let options = InvocationOptions::new().all_settled(
            vec!["x".to_string(), "y".to_string(), "z".to_string()],
            "id",
        );
        let out = builder().build("getNode", &options, &context()).unwrap();

        let ids: Vec<String> = out
            .iter()
            .map(|p| envelope(p).path_parameters.unwrap()["id"].clone())
            .collect();
        assert_eq!(ids, vec!["x", "y", "z"]);
        assert_eq!(out[1].id.as_deref(), Some("y"));
    }

    #[test]
    fn raw_body_is_not_encoded_twice() {
        let raw = r#"{"already":"json"}"#;
        let options = InvocationOptions::new().payload(json!(raw)).raw_body();
        let out = builder().build("updateNode", &options, &context()).unwrap();
        assert_eq!(envelope(&out[0]).body.as_deref(), Some(raw));

        let encoded = InvocationOptions::new().payload(json!(raw));
        let out = builder().build("updateNode", &encoded, &context()).unwrap();
        assert_eq!(
            envelope(&out[0]).body.as_deref(),
            Some(r#""{\"already\":\"json\"}""#)
        );
    }

    #[test]
    fn direct_source_passes_payload_verbatim() {
        let options = InvocationOptions::new()
            .payload(json!({ "ids": [1, 2] }))
            .source(InvocationSource::Direct)
            .fire_and_forget();
        let out = builder().build("getNode", &options, &context()).unwrap();
        assert_eq!(out[0].payload, json!({ "ids": [1, 2] }));
        assert_eq!(out[0].invocation_type, InvocationType::Event);
    }

    #[test]
    fn unknown_route_is_an_error() {
        let err = builder()
            .build("nope", &InvocationOptions::new(), &context())
            .unwrap_err();
        assert_eq!(err.status_code(), 500);
        assert_eq!(err.message(), "route nope is not registered");
    }
}

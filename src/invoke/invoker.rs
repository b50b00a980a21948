use std::sync::Arc;

use futures::future::join_all;
use serde::Deserialize;
use serde_json::Value;
use tokio::task::JoinHandle;

use super::envelope::PreparedInvocation;
use super::transport::FunctionTransport;
use crate::error::ApiError;

/// Response envelope returned by gateway-style functions
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResponseEnvelope {
    #[serde(default)]
    status_code: Option<u16>,
    #[serde(default)]
    body: Option<Value>,
    #[serde(default)]
    error_message: Option<String>,
}

/// Outcome of a fan-out: every id lands in exactly one of the two lists.
/// Successes stay paired with the id they were requested for.
#[derive(Debug, Default)]
pub struct AllSettled {
    pub successful: Vec<(String, Value)>,
    pub failed: Vec<ApiError>,
}

/// Calls downstream functions and normalizes what comes back
#[derive(Clone)]
pub struct Invoker {
    transport: Arc<dyn FunctionTransport>,
}

impl Invoker {
    pub fn new(transport: Arc<dyn FunctionTransport>) -> Self {
        Self { transport }
    }

    /// Call the function and parse its raw response.
    ///
    /// Non-JSON responses come back as a string value, empty ones as `Null`.
    pub async fn invoke(&self, invocation: &PreparedInvocation) -> Result<Value, ApiError> {
        let payload = serde_json::to_vec(&invocation.payload)?;

        tracing::debug!(
            "Invoking {} ({})",
            invocation.target,
            invocation.invocation_type.as_str()
        );

        let raw = self
            .transport
            .invoke(&invocation.target, invocation.invocation_type, payload)
            .await?;

        Ok(parse_payload(&raw))
    }

    /// Invoke and require a 200/204 `statusCode`; returns the parsed body
    pub async fn invoke_and_check(
        &self,
        invocation: &PreparedInvocation,
    ) -> Result<Option<Value>, ApiError> {
        let response = self.invoke(invocation).await?;
        check_response(response).map_err(|err| {
            tracing::debug!(
                "Downstream {} reported {}: {}",
                invocation.target,
                err.status_code(),
                err.message()
            );
            err
        })
    }

    /// Invoke a Direct-style function. The reply is returned as-is unless it
    /// carries a failure signal: a response envelope with a non-success
    /// status, a top-level `errorMessage`, or a bare string.
    pub async fn invoke_direct(&self, invocation: &PreparedInvocation) -> Result<Value, ApiError> {
        let response = self.invoke(invocation).await?;
        check_direct(response).map_err(|err| {
            tracing::debug!(
                "Direct invocation of {} failed with {}: {}",
                invocation.target,
                err.status_code(),
                err.message()
            );
            err
        })
    }

    /// Run every invocation concurrently; one failure never aborts the others
    pub async fn invoke_all_settled(&self, invocations: &[PreparedInvocation]) -> AllSettled {
        let outcomes = join_all(invocations.iter().map(|inv| self.invoke_and_check(inv))).await;

        let mut settled = AllSettled::default();
        for (invocation, outcome) in invocations.iter().zip(outcomes) {
            match outcome {
                Ok(body) => settled
                    .successful
                    .push((invocation.id.clone().unwrap_or_default(), body.unwrap_or(Value::Null))),
                Err(err) => settled.failed.push(err),
            }
        }

        tracing::debug!(
            "Fan-out settled: {} succeeded, {} failed",
            settled.successful.len(),
            settled.failed.len()
        );

        settled
    }

    /// Fire-and-forget on a background task. Failures are logged, never
    /// returned; dropping the handle does not cancel the call.
    pub fn spawn_detached(&self, invocation: PreparedInvocation) -> JoinHandle<()> {
        let invoker = self.clone();
        tokio::spawn(async move {
            if let Err(err) = invoker.invoke(&invocation).await {
                tracing::warn!(
                    "Detached invocation of {} failed: {}",
                    invocation.target,
                    err.message()
                );
            }
        })
    }
}

fn parse_payload(raw: &[u8]) -> Value {
    if raw.is_empty() {
        return Value::Null;
    }
    serde_json::from_slice(raw)
        .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(raw).into_owned()))
}

fn parse_body(body: Value) -> Option<Value> {
    match body {
        Value::Null => None,
        Value::String(s) if s.is_empty() => None,
        Value::String(s) => Some(serde_json::from_str(&s).unwrap_or(Value::String(s))),
        other => Some(other),
    }
}

fn check_response(response: Value) -> Result<Option<Value>, ApiError> {
    let envelope: ResponseEnvelope = match response {
        Value::Object(_) => serde_json::from_value(response.clone()).unwrap_or_default(),
        _ => ResponseEnvelope::default(),
    };

    let body = envelope.body.and_then(parse_body);

    if matches!(envelope.status_code, Some(200) | Some(204)) {
        return Ok(body);
    }

    let message = match &body {
        Some(Value::Object(map)) if map.get("message").is_some_and(Value::is_string) => {
            map["message"].as_str().unwrap_or_default().to_string()
        }
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
        None => envelope.error_message.unwrap_or_else(|| match &response {
            Value::String(s) => s.clone(),
            _ => "Downstream invocation failed".to_string(),
        }),
    };

    Err(ApiError::downstream(envelope.status_code, message))
}

fn check_direct(response: Value) -> Result<Value, ApiError> {
    match &response {
        Value::String(message) => Err(ApiError::downstream(None, message.clone())),
        Value::Object(map) if map.contains_key("statusCode") || map.contains_key("errorMessage") => {
            check_response(response).map(Option::unwrap_or_default)
        }
        _ => Ok(response),
    }
}

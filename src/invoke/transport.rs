use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use url::Url;

use super::envelope::InvocationType;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("invocation of {0} timed out")]
    Timeout(String),

    #[error("invocation request failed: {0}")]
    Request(String),

    #[error("invocation of {function} rejected with status {status}: {body}")]
    Rejected {
        function: String,
        status: u16,
        body: String,
    },
}

/// Carries serialized payloads to a downstream function and back
#[async_trait]
pub trait FunctionTransport: Send + Sync {
    async fn invoke(
        &self,
        function: &str,
        invocation_type: InvocationType,
        payload: Vec<u8>,
    ) -> Result<Vec<u8>, TransportError>;
}

/// Invokes functions through the HTTP invocation API:
/// `POST <endpoint>/functions/<name>/invocations`
pub struct HttpFunctionTransport {
    client: reqwest::Client,
    endpoint: Url,
    api_key: Option<String>,
}

impl HttpFunctionTransport {
    pub fn new(endpoint: &str, api_key: Option<String>, timeout: Duration) -> Result<Self, TransportError> {
        let endpoint = Url::parse(endpoint)
            .map_err(|e| TransportError::Request(format!("invalid invoke endpoint {endpoint}: {e}")))?;
        if endpoint.cannot_be_a_base() {
            return Err(TransportError::Request(format!(
                "invoke endpoint {endpoint} cannot carry a path"
            )));
        }

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| TransportError::Request(format!("failed to build http client: {e}")))?;

        Ok(Self {
            client,
            endpoint,
            api_key,
        })
    }

    fn function_url(&self, function: &str) -> Url {
        let mut url = self.endpoint.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments
                .pop_if_empty()
                .extend(["functions", function, "invocations"]);
        }
        url
    }
}

#[async_trait]
impl FunctionTransport for HttpFunctionTransport {
    async fn invoke(
        &self,
        function: &str,
        invocation_type: InvocationType,
        payload: Vec<u8>,
    ) -> Result<Vec<u8>, TransportError> {
        let mut request = self
            .client
            .post(self.function_url(function))
            .header("x-invocation-type", invocation_type.as_str())
            .header("content-type", "application/json")
            .body(payload);
        if let Some(key) = &self.api_key {
            request = request.header("x-api-key", key);
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                TransportError::Timeout(function.to_string())
            } else {
                TransportError::Request(e.to_string())
            }
        })?;

        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|e| TransportError::Request(e.to_string()))?;

        if !status.is_success() {
            return Err(TransportError::Rejected {
                function: function.to_string(),
                status: status.as_u16(),
                body: String::from_utf8_lossy(&body).into_owned(),
            });
        }

        Ok(body.to_vec())
    }
}

use async_trait::async_trait;
use jsonwebtoken::jwk::JwkSet;
use reqwest::StatusCode;

use super::verifier::VerifyError;

/// Source of the issuer's public key set
#[async_trait]
pub trait JwksFetcher: Send + Sync {
    async fn fetch(&self) -> Result<JwkSet, VerifyError>;
}

/// Fetches `/.well-known/jwks.json` from the issuer
pub struct HttpJwksFetcher {
    client: reqwest::Client,
    uri: String,
}

impl HttpJwksFetcher {
    pub fn new(client: reqwest::Client, uri: impl Into<String>) -> Self {
        Self {
            client,
            uri: uri.into(),
        }
    }
}

#[async_trait]
impl JwksFetcher for HttpJwksFetcher {
    async fn fetch(&self) -> Result<JwkSet, VerifyError> {
        tracing::info!("Fetching JWKS from {}", self.uri);

        let response = self
            .client
            .get(&self.uri)
            .send()
            .await
            .map_err(|e| VerifyError::KeySetUnavailable(format!("jwks fetch error: {e}")))?;

        if response.status() != StatusCode::OK {
            return Err(VerifyError::KeySetUnavailable(format!(
                "jwks fetch status: {}",
                response.status()
            )));
        }

        response
            .json::<JwkSet>()
            .await
            .map_err(|e| VerifyError::KeySetUnavailable(format!("jwks decode error: {e}")))
    }
}

/// Fixed key set, used for tests and air-gapped deployments
pub struct StaticJwks(pub JwkSet);

impl StaticJwks {
    pub fn from_json(raw: &str) -> Result<Self, serde_json::Error> {
        Ok(Self(serde_json::from_str(raw)?))
    }
}

#[async_trait]
impl JwksFetcher for StaticJwks {
    async fn fetch(&self) -> Result<JwkSet, VerifyError> {
        Ok(self.0.clone())
    }
}

use std::sync::Arc;

use jsonwebtoken::{decode, decode_header, jwk::JwkSet, Algorithm, DecodingKey, Validation};
use thiserror::Error;
use tokio::sync::OnceCell;

use super::jwks::JwksFetcher;
use super::{IdentityClaim, TokenClaims};

/// Message returned for every rejected token, whatever check failed
pub const INVALID_TOKEN: &str = "Invalid Token";

/// Why a token was rejected. Only ever logged, never returned to callers.
#[derive(Debug, Error)]
pub enum VerifyError {
    #[error("token invalid")]
    Malformed,

    #[error("unknown kid")]
    UnknownKid,

    #[error("key set unavailable: {0}")]
    KeySetUnavailable(String),

    #[error("signature rejected: {0}")]
    Signature(#[from] jsonwebtoken::errors::Error),

    #[error("token expired")]
    Expired,

    #[error("auth_time is in the future")]
    AuthTimeInFuture,

    #[error("issuer mismatch: {0}")]
    IssuerMismatch(String),

    #[error("token_use must be 'id'")]
    NotAnIdToken,
}

/// Outcome of a verification. Never an `Err`: failures are data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verification {
    Valid(IdentityClaim),
    Invalid { error: String },
}

impl Verification {
    pub fn is_valid(&self) -> bool {
        matches!(self, Verification::Valid(_))
    }
}

/// Seconds since the epoch; injectable so expiry checks are testable
pub trait Clock: Send + Sync {
    fn now(&self) -> i64;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> i64 {
        chrono::Utc::now().timestamp()
    }
}

/// Verifies id tokens against the issuer's key set.
///
/// The key set is fetched on first use and kept for the lifetime of the
/// verifier. A failed fetch is not cached, so the next call retries.
pub struct ClaimVerifier {
    issuer: String,
    audience: Option<String>,
    fetcher: Arc<dyn JwksFetcher>,
    clock: Arc<dyn Clock>,
    keys: OnceCell<JwkSet>,
}

impl ClaimVerifier {
    pub fn new(issuer: impl Into<String>, fetcher: Arc<dyn JwksFetcher>) -> Self {
        Self {
            issuer: issuer.into(),
            audience: None,
            fetcher,
            clock: Arc::new(SystemClock),
            keys: OnceCell::new(),
        }
    }

    pub fn with_audience(mut self, audience: Option<String>) -> Self {
        self.audience = audience;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    pub async fn verify(&self, token: &str) -> Verification {
        match self.check(token).await {
            Ok(claim) => Verification::Valid(claim),
            Err(reason) => {
                tracing::debug!("Token rejected: {}", reason);
                Verification::Invalid {
                    error: INVALID_TOKEN.to_string(),
                }
            }
        }
    }

    async fn key_set(&self) -> Result<&JwkSet, VerifyError> {
        self.keys.get_or_try_init(|| self.fetcher.fetch()).await
    }

    async fn check(&self, token: &str) -> Result<IdentityClaim, VerifyError> {
        if token.split('.').count() < 2 {
            return Err(VerifyError::Malformed);
        }

        let header = decode_header(token).map_err(|_| VerifyError::Malformed)?;
        let kid = header.kid.ok_or(VerifyError::UnknownKid)?;

        let jwk = self
            .key_set()
            .await?
            .find(&kid)
            .ok_or(VerifyError::UnknownKid)?;
        let key = DecodingKey::from_jwk(jwk)?;

        // Signature only; time and issuer checks run against the injected clock below
        let mut validation = Validation::new(Algorithm::RS256);
        validation.validate_exp = false;
        validation.validate_nbf = false;
        validation.set_required_spec_claims(&["exp"]);
        match &self.audience {
            Some(aud) => validation.set_audience(&[aud]),
            None => validation.validate_aud = false,
        }

        let claims = decode::<TokenClaims>(token, &key, &validation)?.claims;
        let now = self.clock.now();

        if claims.exp < now {
            return Err(VerifyError::Expired);
        }
        if claims.auth_time.is_some_and(|auth_time| auth_time > now) {
            return Err(VerifyError::AuthTimeInFuture);
        }
        if claims.iss != self.issuer {
            return Err(VerifyError::IssuerMismatch(claims.iss));
        }
        if claims.token_use.as_deref() != Some("id") {
            return Err(VerifyError::NotAnIdToken);
        }

        Ok(IdentityClaim::from(claims))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::StaticJwks;
    use async_trait::async_trait;
    use jsonwebtoken::{encode, EncodingKey, Header};
    use serde_json::{json, Value};
    use std::sync::atomic::{AtomicUsize, Ordering};

    const JWKS: &str = include_str!("../../tests/fixtures/jwks.json");
    const SIGNING_KEY: &[u8] = include_bytes!("../../tests/fixtures/signing_key.pem");
    const FOREIGN_KEY: &[u8] = include_bytes!("../../tests/fixtures/foreign_key.pem");
    const ISSUER: &str = "https://cognito-idp.us-east-1.amazonaws.com/us-east-1_test";
    const NOW: i64 = 1_700_000_000;

    struct FixedClock(i64);

    impl Clock for FixedClock {
        fn now(&self) -> i64 {
            self.0
        }
    }

    struct CountingJwks {
        inner: StaticJwks,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl JwksFetcher for CountingJwks {
        async fn fetch(&self) -> Result<JwkSet, VerifyError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.inner.fetch().await
        }
    }

    fn verifier() -> ClaimVerifier {
        ClaimVerifier::new(ISSUER, Arc::new(StaticJwks::from_json(JWKS).unwrap()))
            .with_clock(Arc::new(FixedClock(NOW)))
    }

    fn claims() -> Value {
        json!({
            "sub": "abc-123-def",
            "iss": ISSUER,
            "exp": NOW + 3600,
            "auth_time": NOW - 60,
            "token_use": "id",
            "email": "user@example.com",
            "event_id": "evt-1",
        })
    }

    fn sign_with(key: &[u8], kid: &str, claims: &Value) -> String {
        let mut header = Header::new(Algorithm::RS256);
        header.kid = Some(kid.to_string());
        encode(&header, claims, &EncodingKey::from_rsa_pem(key).unwrap()).unwrap()
    }

    fn sign(claims: &Value) -> String {
        sign_with(SIGNING_KEY, "test-key-1", claims)
    }

    #[tokio::test]
    async fn accepts_valid_id_token() {
        let result = verifier().verify(&sign(&claims())).await;
        assert_eq!(
            result,
            Verification::Valid(IdentityClaim {
                user_id: "abc-123-def".to_string(),
                user_email: "user@example.com".to_string(),
                event_id: "evt-1".to_string(),
            })
        );
    }

    #[tokio::test]
    async fn rejects_token_with_too_few_sections() {
        let result = verifier().verify("not-a-token").await;
        assert_eq!(
            result,
            Verification::Invalid {
                error: INVALID_TOKEN.to_string()
            }
        );
    }

    #[tokio::test]
    async fn rejects_foreign_signature() {
        let token = sign_with(FOREIGN_KEY, "test-key-1", &claims());
        assert!(!verifier().verify(&token).await.is_valid());
    }

    #[tokio::test]
    async fn rejects_tampered_payload() {
        let forged = sign(&json!({ "sub": "someone-else", "iss": ISSUER, "exp": NOW + 10, "token_use": "id" }));
        let token = sign(&claims());
        let mut parts: Vec<&str> = token.split('.').collect();
        parts[1] = forged.split('.').nth(1).unwrap();
        assert!(!verifier().verify(&parts.join(".")).await.is_valid());
    }

    #[tokio::test]
    async fn rejects_unknown_kid() {
        let token = sign_with(SIGNING_KEY, "rotated-away", &claims());
        assert!(!verifier().verify(&token).await.is_valid());
    }

    #[tokio::test]
    async fn rejects_expired_token() {
        let mut c = claims();
        c["exp"] = json!(NOW - 1);
        assert!(!verifier().verify(&sign(&c)).await.is_valid());
    }

    #[tokio::test]
    async fn rejects_auth_time_in_future() {
        let mut c = claims();
        c["auth_time"] = json!(NOW + 120);
        assert!(!verifier().verify(&sign(&c)).await.is_valid());
    }

    #[tokio::test]
    async fn rejects_wrong_issuer() {
        let mut c = claims();
        c["iss"] = json!(format!("{ISSUER}-other"));
        assert!(!verifier().verify(&sign(&c)).await.is_valid());
    }

    #[tokio::test]
    async fn rejects_access_tokens() {
        let mut c = claims();
        c["token_use"] = json!("access");
        assert!(!verifier().verify(&sign(&c)).await.is_valid());
    }

    #[tokio::test]
    async fn enforces_audience_when_configured() {
        let v = verifier().with_audience(Some("client-a".to_string()));
        let mut c = claims();
        c["aud"] = json!("client-b");
        assert!(!v.verify(&sign(&c)).await.is_valid());
        c["aud"] = json!("client-a");
        assert!(v.verify(&sign(&c)).await.is_valid());
    }

    #[tokio::test]
    async fn fetches_key_set_once() {
        let fetcher = Arc::new(CountingJwks {
            inner: StaticJwks::from_json(JWKS).unwrap(),
            calls: AtomicUsize::new(0),
        });
        let v = ClaimVerifier::new(ISSUER, fetcher.clone()).with_clock(Arc::new(FixedClock(NOW)));

        let token = sign(&claims());
        assert!(v.verify(&token).await.is_valid());
        assert!(v.verify(&token).await.is_valid());
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 1);
    }
}

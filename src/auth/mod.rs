pub mod jwks;
pub mod verifier;

use serde::{Deserialize, Serialize};

pub use jwks::{HttpJwksFetcher, JwksFetcher, StaticJwks};
pub use verifier::{ClaimVerifier, Clock, SystemClock, Verification, VerifyError};

/// Claims carried by an id token, as issued by the user pool
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenClaims {
    pub sub: String,
    pub iss: String,
    pub exp: i64,
    #[serde(default)]
    pub auth_time: Option<i64>,
    #[serde(default)]
    pub token_use: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub event_id: Option<String>,
}

/// Verified identity, lives for a single request
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentityClaim {
    pub user_id: String,
    pub user_email: String,
    pub event_id: String,
}

impl From<TokenClaims> for IdentityClaim {
    fn from(claims: TokenClaims) -> Self {
        Self {
            user_id: claims.sub,
            user_email: claims.email.unwrap_or_default(),
            event_id: claims.event_id.unwrap_or_default(),
        }
    }
}

use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub environment: Environment,
    pub auth: AuthConfig,
    pub downstream: DownstreamConfig,
    pub cache: CacheConfig,
    pub api: ApiConfig,
    pub security: SecurityConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Environment {
    Development,
    Staging,
    Production,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    pub region: String,
    pub user_pool_id: String,
    /// Expected `aud` of id tokens; audience is not checked when unset
    pub client_id: Option<String>,
    pub issuer: Option<String>,
    pub jwks_uri: Option<String>,
}

impl AuthConfig {
    /// Issuer string tokens must carry in `iss`
    pub fn issuer(&self) -> String {
        self.issuer.clone().unwrap_or_else(|| {
            format!(
                "https://cognito-idp.{}.amazonaws.com/{}",
                self.region, self.user_pool_id
            )
        })
    }

    pub fn jwks_uri(&self) -> String {
        self.jwks_uri
            .clone()
            .unwrap_or_else(|| format!("{}/.well-known/jwks.json", self.issuer()))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownstreamConfig {
    /// Suffix appended to every service name to form the function name
    pub stage: String,
    pub invoke_endpoint: String,
    pub api_key: Option<String>,
    pub timeout_secs: u64,
}

impl DownstreamConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CacheBackend {
    Memory,
    Redis,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    pub backend: CacheBackend,
    pub default_ttl_secs: u64,
    pub max_capacity: u64,
    pub sweep_interval_secs: u64,
    pub redis_host: String,
    pub redis_port: u16,
}

impl CacheConfig {
    pub fn default_ttl(&self) -> Duration {
        Duration::from_secs(self.default_ttl_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }

    pub fn redis_url(&self) -> String {
        format!("redis://{}:{}/", self.redis_host, self.redis_port)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    pub port: u16,
    /// Common mount prefix for every resource route
    pub prefix: String,
    /// Path prefixes (relative to `prefix`) that do not need a workspace header
    pub workspace_exempt_prefixes: Vec<String>,
    /// Paths under an exempt prefix that still need the workspace header
    pub workspace_required_overrides: Vec<String>,
    pub routes_file: String,
    pub schemas_dir: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityConfig {
    pub enable_cors: bool,
    pub cors_origins: Vec<String>,
}

fn csv(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

impl AppConfig {
    pub fn from_env() -> Self {
        let environment = match env::var("APP_ENV").as_deref() {
            Ok("production") | Ok("prod") => Environment::Production,
            Ok("staging") | Ok("stage") => Environment::Staging,
            _ => Environment::Development,
        };

        // Set defaults based on environment, then override with specific env vars
        match environment {
            Environment::Production => Self::production(),
            Environment::Staging => Self::staging(),
            Environment::Development => Self::development(),
        }
        .with_env_overrides()
    }

    fn with_env_overrides(mut self) -> Self {
        // Auth overrides
        if let Ok(v) = env::var("COGNITO_REGION") {
            self.auth.region = v;
        }
        if let Ok(v) = env::var("COGNITO_USER_POOL_ID") {
            self.auth.user_pool_id = v;
        }
        if let Ok(v) = env::var("COGNITO_CLIENT_ID") {
            self.auth.client_id = Some(v).filter(|s| !s.is_empty());
        }
        if let Ok(v) = env::var("AUTH_ISSUER") {
            self.auth.issuer = Some(v);
        }
        if let Ok(v) = env::var("AUTH_JWKS_URI") {
            self.auth.jwks_uri = Some(v);
        }

        // Downstream overrides
        if let Ok(v) = env::var("STAGE") {
            self.downstream.stage = v;
        }
        if let Ok(v) = env::var("INVOKE_ENDPOINT") {
            self.downstream.invoke_endpoint = v;
        }
        if let Ok(v) = env::var("INVOKE_API_KEY") {
            self.downstream.api_key = Some(v).filter(|s| !s.is_empty());
        }
        if let Ok(v) = env::var("INVOKE_TIMEOUT_SECS") {
            self.downstream.timeout_secs = v.parse().unwrap_or(self.downstream.timeout_secs);
        }

        // Cache overrides
        if let Ok(v) = env::var("CACHE_BACKEND") {
            self.cache.backend = match v.as_str() {
                "redis" => CacheBackend::Redis,
                _ => CacheBackend::Memory,
            };
        }
        if let Ok(v) = env::var("CACHE_DEFAULT_TTL_SECS") {
            self.cache.default_ttl_secs = v.parse().unwrap_or(self.cache.default_ttl_secs);
        }
        if let Ok(v) = env::var("CACHE_MAX_CAPACITY") {
            self.cache.max_capacity = v.parse().unwrap_or(self.cache.max_capacity);
        }
        if let Ok(v) = env::var("CACHE_SWEEP_INTERVAL_SECS") {
            self.cache.sweep_interval_secs = v.parse().unwrap_or(self.cache.sweep_interval_secs);
        }
        if let Ok(v) = env::var("REDIS_HOST") {
            self.cache.redis_host = v;
        }
        if let Ok(v) = env::var("REDIS_PORT") {
            self.cache.redis_port = v.parse().unwrap_or(self.cache.redis_port);
        }

        // API overrides
        if let Some(port) = env::var("MEX_GATEWAY_PORT")
            .ok()
            .or_else(|| env::var("PORT").ok())
            .and_then(|s| s.parse::<u16>().ok())
        {
            self.api.port = port;
        }
        if let Ok(v) = env::var("API_PREFIX") {
            self.api.prefix = v;
        }
        if let Ok(v) = env::var("API_WORKSPACE_EXEMPT_PREFIXES") {
            self.api.workspace_exempt_prefixes = csv(&v);
        }
        if let Ok(v) = env::var("API_WORKSPACE_REQUIRED_OVERRIDES") {
            self.api.workspace_required_overrides = csv(&v);
        }
        if let Ok(v) = env::var("ROUTES_FILE") {
            self.api.routes_file = v;
        }
        if let Ok(v) = env::var("SCHEMAS_DIR") {
            self.api.schemas_dir = v;
        }

        // Security overrides
        if let Ok(v) = env::var("SECURITY_ENABLE_CORS") {
            self.security.enable_cors = v.parse().unwrap_or(self.security.enable_cors);
        }
        if let Ok(v) = env::var("SECURITY_CORS_ORIGINS") {
            self.security.cors_origins = csv(&v);
        }

        self
    }

    fn base(environment: Environment, stage: &str) -> Self {
        Self {
            environment,
            auth: AuthConfig {
                region: "us-east-1".to_string(),
                user_pool_id: String::new(),
                client_id: None,
                issuer: None,
                jwks_uri: None,
            },
            downstream: DownstreamConfig {
                stage: stage.to_string(),
                invoke_endpoint: "http://localhost:3001/2015-03-31".to_string(),
                api_key: None,
                timeout_secs: 15,
            },
            cache: CacheConfig {
                backend: CacheBackend::Memory,
                default_ttl_secs: 30 * 60,
                max_capacity: 10_000,
                sweep_interval_secs: 60,
                redis_host: "localhost".to_string(),
                redis_port: 6379,
            },
            api: ApiConfig {
                port: 5000,
                prefix: "/api/v1".to_string(),
                workspace_exempt_prefixes: vec![
                    "/user".to_string(),
                    "/public".to_string(),
                    "/oauth".to_string(),
                ],
                workspace_required_overrides: vec![
                    "/user/workspace".to_string(),
                    "/oauth/workspace".to_string(),
                ],
                routes_file: "config/routes.yaml".to_string(),
                schemas_dir: "schemas".to_string(),
            },
            security: SecurityConfig {
                enable_cors: true,
                cors_origins: Vec::new(),
            },
        }
    }

    pub fn development() -> Self {
        let mut config = Self::base(Environment::Development, "local");
        config.security.cors_origins = vec![
            "http://localhost:3000".to_string(),
            "http://localhost:5173".to_string(),
        ];
        config
    }

    fn staging() -> Self {
        let mut config = Self::base(Environment::Staging, "test");
        config.cache.backend = CacheBackend::Redis;
        config.security.cors_origins = vec!["https://staging.workduck.io".to_string()];
        config
    }

    fn production() -> Self {
        let mut config = Self::base(Environment::Production, "prod");
        config.cache.backend = CacheBackend::Redis;
        config.cache.max_capacity = 100_000;
        config.downstream.timeout_secs = 15;
        config.security.cors_origins = vec!["https://app.workduck.io".to_string()];
        config
    }
}

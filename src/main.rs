use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use mex_gateway::auth::{ClaimVerifier, HttpJwksFetcher};
use mex_gateway::cache::{CacheStore, MemoryCache, RedisCache};
use mex_gateway::config::{AppConfig, CacheBackend};
use mex_gateway::invoke::{HttpFunctionTransport, RouteTable};
use mex_gateway::validation::SchemaRegistry;
use mex_gateway::{app, Gateway};

#[derive(Parser, Debug)]
#[command(name = "mex-gateway", version, about = "Authenticating gateway in front of downstream functions")]
struct Args {
    /// Port to listen on
    #[arg(short, long)]
    port: Option<u16>,

    /// Route table (YAML)
    #[arg(long)]
    routes: Option<String>,

    /// Directory of JSON schemas, one per request type
    #[arg(long)]
    schemas: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present so local runs pick up COGNITO_*, INVOKE_ENDPOINT, etc.
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();
    let mut config = AppConfig::from_env();
    if let Some(port) = args.port {
        config.api.port = port;
    }
    if let Some(routes) = args.routes {
        config.api.routes_file = routes;
    }
    if let Some(schemas) = args.schemas {
        config.api.schemas_dir = schemas;
    }

    tracing::info!("Starting mex-gateway in {:?} mode", config.environment);

    let routes = RouteTable::from_file(&config.api.routes_file, config.downstream.stage.clone())
        .with_context(|| format!("loading routes from {}", config.api.routes_file))?;
    let registry = SchemaRegistry::from_dir(&config.api.schemas_dir)
        .with_context(|| format!("loading schemas from {}", config.api.schemas_dir))?;

    let transport = HttpFunctionTransport::new(
        &config.downstream.invoke_endpoint,
        config.downstream.api_key.clone(),
        config.downstream.timeout(),
    )?;

    let cache: Arc<dyn CacheStore> = match config.cache.backend {
        CacheBackend::Memory => {
            let memory = MemoryCache::new(config.cache.max_capacity, config.cache.default_ttl());
            memory.spawn_sweeper(config.cache.sweep_interval());
            Arc::new(memory)
        }
        CacheBackend::Redis => Arc::new(
            RedisCache::connect(&config.cache.redis_url(), config.cache.default_ttl())
                .await
                .context("connecting to redis")?,
        ),
    };

    let http = reqwest::Client::builder()
        .timeout(config.downstream.timeout())
        .build()?;
    let verifier = ClaimVerifier::new(
        config.auth.issuer(),
        Arc::new(HttpJwksFetcher::new(http, config.auth.jwks_uri())),
    )
    .with_audience(config.auth.client_id.clone());

    let bind_addr = format!("0.0.0.0:{}", config.api.port);
    let gateway = Gateway::new(config, routes, registry, Arc::new(transport), cache, verifier);

    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", bind_addr))?;

    tracing::info!("mex-gateway listening on http://{}", bind_addr);

    axum::serve(listener, app(Arc::new(gateway))).await?;
    Ok(())
}

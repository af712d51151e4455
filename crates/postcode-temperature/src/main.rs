//! Postcode temperature service

use std::sync::Arc;

use meteomatics_client::{IdentityClient, RetryPolicy, TokenManager, WeatherClient};
use postcode_temperature::config::{CacheBackendKind, Config};
use postcode_temperature::server::{start_server, ServerState, SharedState};
use postcode_temperature::store::{CacheBackend, CacheStore, MemoryBackend, RedisBackend};
use postcode_temperature::{LookupOrchestrator, Result};
use tracing::{info, warn};
use tracing_subscriber::{prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    let env_filter = EnvFilter::from_default_env()
        .add_directive("postcode_temperature=info".parse()?)
        .add_directive("meteomatics_client=info".parse()?);

    // Use JSON format for GCP Cloud Logging when LOG_FORMAT=json
    if std::env::var("LOG_FORMAT")
        .map(|v| v == "json")
        .unwrap_or(false)
    {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_stackdriver::layer())
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(env_filter).init();
    };

    info!("Starting postcode temperature service...");

    let config = Config::from_env()?;
    info!("Port: {}", config.port);
    info!("Cache backend: {:?}", config.cache_backend);
    info!("Cache TTL: {} seconds", config.cache_ttl.as_secs());

    let backend: Arc<dyn CacheBackend> = match config.cache_backend {
        CacheBackendKind::Redis => {
            info!(
                host = %config.redis_host,
                port = config.redis_port,
                tls = config.redis_tls,
                "Connecting to Redis"
            );
            Arc::new(RedisBackend::connect(&config.redis_url()).await?)
        }
        CacheBackendKind::Memory => {
            warn!("Using in-process cache; entries are lost on restart");
            Arc::new(MemoryBackend::new())
        }
    };
    let cache = CacheStore::with_ttl(backend, config.cache_ttl);

    let identity = IdentityClient::with_login_url(
        &config.login_url,
        &config.api_user,
        &config.api_password,
        config.upstream_timeout,
    );
    let tokens = TokenManager::with_retry_policy(
        Arc::new(identity),
        RetryPolicy {
            max_attempts: config.auth_max_attempts,
            ..RetryPolicy::default()
        },
    );
    let weather = WeatherClient::with_api_url(&config.api_url, config.upstream_timeout);

    let lookups = LookupOrchestrator::new(cache, Arc::new(tokens), Arc::new(weather));
    let state: SharedState = Arc::new(ServerState::new(lookups));

    // Start HTTP server (blocking)
    start_server(state, config.port).await?;

    Ok(())
}

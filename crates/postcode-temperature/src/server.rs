//! HTTP server for temperature lookups
//!
//! Provides /, /health, and /postCode/:postCode endpoints.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::get,
    Router,
};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::{debug, info};

use crate::lookup::LookupOrchestrator;
use crate::types::{HealthResponse, PostCodeResponse};

/// Shared state for the HTTP server
pub struct ServerState {
    pub lookups: LookupOrchestrator,
    pub started_at: DateTime<Utc>,
}

impl ServerState {
    pub fn new(lookups: LookupOrchestrator) -> Self {
        Self {
            lookups,
            started_at: Utc::now(),
        }
    }
}

pub type SharedState = Arc<ServerState>;

/// Create the HTTP router
pub fn create_router(state: SharedState) -> Router {
    Router::new()
        .route("/", get(alive))
        .route("/health", get(health))
        .route("/postCode/{post_code}", get(get_temperature))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Start the HTTP server
pub async fn start_server(state: SharedState, port: u16) -> std::io::Result<()> {
    let router = create_router(state);
    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));
    info!("Starting HTTP server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router).await
}

/// Liveness probe
async fn alive() -> StatusCode {
    debug!("Alive request");
    StatusCode::OK
}

/// Health check endpoint
async fn health(State(state): State<SharedState>) -> Json<HealthResponse> {
    let uptime_secs = (Utc::now() - state.started_at).num_seconds() as u64;

    Json(HealthResponse {
        status: "ok".to_string(),
        uptime_secs,
        cache: state.lookups.cache_stats(),
    })
}

/// Current temperature for a postal code; the lookup status becomes the HTTP status
async fn get_temperature(
    State(state): State<SharedState>,
    Path(post_code): Path<String>,
) -> Response {
    let result = state.lookups.lookup(&post_code).await;
    info!(post_code = %post_code, temp = ?result.temperature, "Lookup answered");

    let status =
        StatusCode::from_u16(result.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (
        status,
        Json(PostCodeResponse {
            post_code,
            temp: result.temperature,
        }),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{CacheStore, MemoryBackend};
    use crate::testing::{FakeTokens, FakeWeather};
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    fn create_test_state(weather: Arc<FakeWeather>) -> SharedState {
        let cache = CacheStore::new(Arc::new(MemoryBackend::new()));
        let lookups = LookupOrchestrator::new(cache, FakeTokens::ok(), weather);
        Arc::new(ServerState::new(lookups))
    }

    async fn send_get(router: Router, uri: &str) -> (StatusCode, Vec<u8>) {
        let response = router
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, body.to_vec())
    }

    #[tokio::test]
    async fn test_alive_endpoint() {
        let router = create_router(create_test_state(FakeWeather::returning(7.5)));

        let (status, body) = send_get(router, "/").await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.is_empty());
    }

    #[tokio::test]
    async fn test_lookup_success() {
        let router = create_router(create_test_state(FakeWeather::returning(7.5)));

        let (status, body) = send_get(router, "/postCode/12345").await;
        assert_eq!(status, StatusCode::OK);

        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["postCode"], "12345");
        assert_eq!(json["temp"], 7.5);
    }

    #[tokio::test]
    async fn test_lookup_malformed_postal_code() {
        let router = create_router(create_test_state(FakeWeather::returning(7.5)));

        let (status, body) = send_get(router, "/postCode/1234").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["postCode"], "1234");
        assert!(json.get("temp").is_none());
    }

    #[tokio::test]
    async fn test_lookup_upstream_error_status() {
        let router = create_router(create_test_state(FakeWeather::failing(429)));

        let (status, body) = send_get(router, "/postCode/12345").await;
        assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);

        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json, serde_json::json!({"postCode": "12345"}));
    }

    #[tokio::test]
    async fn test_health_counts_cache_activity() {
        let state = create_test_state(FakeWeather::returning(7.5));
        let router = create_router(state.clone());

        send_get(router.clone(), "/postCode/12345").await;
        send_get(router.clone(), "/postCode/12345").await;

        let (status, body) = send_get(router, "/health").await;
        assert_eq!(status, StatusCode::OK);

        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["status"], "ok");
        assert!(json["uptime_secs"].as_u64().is_some());
        assert_eq!(json["cache"]["hits"], 1);
        assert_eq!(json["cache"]["misses"], 1);
    }

    #[test]
    fn test_server_state_new() {
        let state = create_test_state(FakeWeather::returning(7.5));

        // started_at should be close to now
        let diff = (Utc::now() - state.started_at).num_seconds();
        assert!(diff >= 0 && diff < 5);
    }
}

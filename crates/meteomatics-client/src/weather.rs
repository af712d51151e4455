//! Temperature queries against the Meteomatics API

use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::token::AccessToken;
use crate::types::{LookupResult, WeatherResponse};

const DEFAULT_API_URL: &str = "https://api.meteomatics.com";
const DEFAULT_TIMEOUT_SECS: u64 = 10;
/// 2 m air temperature in degrees Celsius
const TEMPERATURE_PARAMETER: &str = "t_2m:C";
/// Status reported when a failure carries no upstream status of its own
const UNCLASSIFIED_STATUS: u16 = 500;

/// Anything that can look up the current temperature for a postal code
#[async_trait]
pub trait TemperatureSource: Send + Sync {
    async fn fetch_temperature(&self, postal_code: &str, token: &AccessToken) -> LookupResult;
}

/// HTTP client for the Meteomatics "now" endpoint
pub struct WeatherClient {
    http: reqwest::Client,
    api_url: String,
}

impl WeatherClient {
    pub fn new() -> Self {
        Self::with_api_url(DEFAULT_API_URL, Duration::from_secs(DEFAULT_TIMEOUT_SECS))
    }

    pub fn with_api_url(api_url: &str, timeout: Duration) -> Self {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .expect("Failed to create HTTP client");

        Self {
            http,
            api_url: api_url.trim_end_matches('/').to_string(),
        }
    }

    /// Fetch the current temperature for an already validated German postal code.
    ///
    /// Never fails: every outcome is folded into the returned status.
    pub async fn fetch_temperature(&self, postal_code: &str, token: &AccessToken) -> LookupResult {
        let url = format!(
            "{}/now/{}/postal_DE{}/json",
            self.api_url, TEMPERATURE_PARAMETER, postal_code
        );

        let response = match self
            .http
            .get(&url)
            .query(&[("access_token", token.as_str())])
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                warn!(postal_code, error = %e, "Weather request failed without a response");
                return LookupResult::failure(postal_code, UNCLASSIFIED_STATUS);
            }
        };

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(postal_code, status = %status, body = %body, "Weather API returned an error");
            return LookupResult::failure(postal_code, status.as_u16());
        }

        let data: WeatherResponse = match response.json().await {
            Ok(data) => data,
            Err(e) => {
                warn!(postal_code, error = %e, "Unreadable weather response");
                return LookupResult::failure(postal_code, UNCLASSIFIED_STATUS);
            }
        };

        match data.first_value() {
            Some(temperature) => {
                debug!(postal_code, temperature, "Fetched temperature");
                LookupResult::success(postal_code, temperature)
            }
            None => {
                warn!(postal_code, "Weather response contained no readings");
                LookupResult::failure(postal_code, UNCLASSIFIED_STATUS)
            }
        }
    }
}

impl Default for WeatherClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TemperatureSource for WeatherClient {
    async fn fetch_temperature(&self, postal_code: &str, token: &AccessToken) -> LookupResult {
        WeatherClient::fetch_temperature(self, postal_code, token).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::tests::serve;
    use crate::token::tests::make_token;
    use axum::extract::{Path, Query, State};
    use axum::http::StatusCode;
    use axum::response::{IntoResponse, Response};
    use axum::routing::get;
    use axum::{Json, Router};
    use serde_json::json;
    use std::collections::HashMap;

    fn test_token() -> AccessToken {
        AccessToken::parse(make_token(chrono::Utc::now().timestamp() + 3600)).unwrap()
    }

    async fn now_endpoint(
        State(expected_token): State<String>,
        Path((parameter, location)): Path<(String, String)>,
        Query(params): Query<HashMap<String, String>>,
    ) -> Response {
        if params.get("access_token") != Some(&expected_token) {
            return (
                StatusCode::UNAUTHORIZED,
                Json(json!({"status": "error", "message": "Unauthorized"})),
            )
                .into_response();
        }
        assert_eq!(parameter, "t_2m:C");

        match location.as_str() {
            "postal_DE99999" => (
                StatusCode::NOT_FOUND,
                Json(json!({"status": "error", "message": "Unknown postal code"})),
            )
                .into_response(),
            "postal_DE42424" => (StatusCode::TOO_MANY_REQUESTS, "").into_response(),
            "postal_DE00000" => Json(json!({"data": []})).into_response(),
            "postal_DE11111" => "<html>maintenance</html>".into_response(),
            "postal_DE22222" => {
                tokio::time::sleep(Duration::from_secs(2)).await;
                Json(json!({"data": []})).into_response()
            }
            _ => Json(json!({
                "version": "3.0",
                "status": "OK",
                "data": [{
                    "parameter": "t_2m:C",
                    "coordinates": [{
                        "station_id": location,
                        "dates": [{"date": "2024-01-15T12:00:00Z", "value": 7.5}]
                    }]
                }]
            }))
            .into_response(),
        }
    }

    async fn client_for(token: &AccessToken) -> WeatherClient {
        let router = Router::new()
            .route("/now/{parameter}/{location}/json", get(now_endpoint))
            .with_state(token.as_str().to_string());
        let base = serve(router).await;
        WeatherClient::with_api_url(&base, Duration::from_millis(500))
    }

    #[tokio::test]
    async fn test_fetch_success() {
        let token = test_token();
        let client = client_for(&token).await;

        let result = client.fetch_temperature("12345", &token).await;
        assert_eq!(result, LookupResult::success("12345", 7.5));
    }

    #[tokio::test]
    async fn test_fetch_propagates_upstream_status() {
        let token = test_token();
        let client = client_for(&token).await;

        let result = client.fetch_temperature("99999", &token).await;
        assert_eq!(result, LookupResult::failure("99999", 404));

        let result = client.fetch_temperature("42424", &token).await;
        assert_eq!(result, LookupResult::failure("42424", 429));
    }

    #[tokio::test]
    async fn test_fetch_rejected_token() {
        let token = test_token();
        let client = client_for(&token).await;
        let other = AccessToken::parse(make_token(chrono::Utc::now().timestamp() + 60)).unwrap();

        let result = client.fetch_temperature("12345", &other).await;
        assert_eq!(result.status, 401);
        assert_eq!(result.temperature, None);
    }

    #[tokio::test]
    async fn test_fetch_without_readings_is_unclassified() {
        let token = test_token();
        let client = client_for(&token).await;

        let result = client.fetch_temperature("00000", &token).await;
        assert_eq!(result, LookupResult::failure("00000", 500));

        let result = client.fetch_temperature("11111", &token).await;
        assert_eq!(result, LookupResult::failure("11111", 500));
    }

    #[tokio::test]
    async fn test_fetch_timeout_is_unclassified() {
        let token = test_token();
        let client = client_for(&token).await;

        let result = client.fetch_temperature("22222", &token).await;
        assert_eq!(result, LookupResult::failure("22222", 500));
    }

    #[tokio::test]
    async fn test_fetch_unreachable_is_unclassified() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let client = WeatherClient::with_api_url(&format!("http://{addr}"), Duration::from_secs(1));
        let result = client.fetch_temperature("12345", &test_token()).await;
        assert_eq!(result, LookupResult::failure("12345", 500));
    }
}

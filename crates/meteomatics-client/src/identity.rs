//! Login endpoint client

use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::error::{ClientError, Result};
use crate::token::IdentityProvider;
use crate::types::TokenResponse;

const DEFAULT_LOGIN_URL: &str = "https://login.meteomatics.com/api/v1/token";
const DEFAULT_TIMEOUT_SECS: u64 = 10;

/// Exchanges the account's Basic credentials for a bearer token
pub struct IdentityClient {
    http: reqwest::Client,
    login_url: String,
    username: String,
    password: String,
}

impl IdentityClient {
    pub fn new(username: &str, password: &str) -> Self {
        Self::with_login_url(
            DEFAULT_LOGIN_URL,
            username,
            password,
            Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        )
    }

    pub fn with_login_url(
        login_url: &str,
        username: &str,
        password: &str,
        timeout: Duration,
    ) -> Self {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .expect("Failed to create HTTP client");

        Self {
            http,
            login_url: login_url.to_string(),
            username: username.to_string(),
            password: password.to_string(),
        }
    }
}

#[async_trait]
impl IdentityProvider for IdentityClient {
    async fn authenticate(&self) -> Result<String> {
        debug!(url = %self.login_url, "Authenticating");

        let response = self
            .http
            .get(&self.login_url)
            .basic_auth(&self.username, Some(&self.password))
            .send()
            .await?;

        if !response.status().is_success() {
            warn!(status = %response.status(), "Login endpoint rejected credentials");
            return Err(ClientError::Status(response.status().as_u16()));
        }

        let data: TokenResponse = response.json().await?;
        Ok(data.access_token)
    }
}

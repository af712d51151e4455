//! Bearer token decoding and lifecycle

use std::collections::HashSet;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use jsonwebtoken::{DecodingKey, Validation};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::error::{AuthError, ClientError, Result, TokenError};
use crate::types::TokenClaims;

/// A bearer token together with the expiry read from its `exp` claim
#[derive(Clone, PartialEq)]
pub struct AccessToken {
    value: String,
    expires_at: DateTime<Utc>,
}

impl AccessToken {
    /// Decode the expiry claim embedded in a JWT.
    ///
    /// The signature is not verified; the upstream checks it on every call.
    /// Expiry is judged by [`AccessToken::is_valid_at`], not by the decoder.
    pub fn parse(raw: impl Into<String>) -> std::result::Result<Self, TokenError> {
        let value = raw.into();

        let mut validation = Validation::default();
        validation.insecure_disable_signature_validation();
        validation.validate_exp = false;
        validation.validate_aud = false;
        // `exp` may be fractional, which the decoder's own claim check rejects
        validation.required_spec_claims = HashSet::new();

        let claims =
            jsonwebtoken::decode::<TokenClaims>(&value, &DecodingKey::from_secret(&[]), &validation)?
                .claims;

        let millis = claims.exp * 1000.0;
        if !millis.is_finite() {
            return Err(TokenError::ExpiryOutOfRange(claims.exp));
        }
        let expires_at = DateTime::from_timestamp_millis(millis as i64)
            .ok_or(TokenError::ExpiryOutOfRange(claims.exp))?;

        Ok(Self { value, expires_at })
    }

    pub fn as_str(&self) -> &str {
        &self.value
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    /// Valid only while the expiry lies strictly after `now`
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at > now
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessToken")
            .field("value", &"<redacted>")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Source of fresh raw tokens (the login endpoint)
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn authenticate(&self) -> Result<String>;
}

/// Anything that can hand out a currently valid token
#[async_trait]
pub trait TokenSource: Send + Sync {
    async fn ensure_valid_token(&self) -> std::result::Result<AccessToken, AuthError>;
}

/// Bounded retry with exponential backoff for authentication
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_backoff: Duration::from_millis(500),
        }
    }
}

impl RetryPolicy {
    /// Delay after the given failed attempt (1-based)
    fn backoff(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.initial_backoff.saturating_mul(factor)
    }
}

/// Token slot guarded by the manager's lock
#[derive(Default)]
struct TokenState {
    token: Option<AccessToken>,
    last_failure: Option<AuthError>,
}

/// Holds the single upstream token and refreshes it on demand.
///
/// The check-then-refresh sequence runs under one lock. Callers that queued
/// while a refresh was running take its outcome, the new token or the same
/// terminal error, instead of starting a refresh of their own.
pub struct TokenManager {
    identity: Arc<dyn IdentityProvider>,
    state: Mutex<TokenState>,
    /// Completed refresh loops, successful or not; bumped under `state`
    refreshes: AtomicU64,
    retry: RetryPolicy,
    clock: fn() -> DateTime<Utc>,
}

impl TokenManager {
    pub fn new(identity: Arc<dyn IdentityProvider>) -> Self {
        Self::with_retry_policy(identity, RetryPolicy::default())
    }

    pub fn with_retry_policy(identity: Arc<dyn IdentityProvider>, retry: RetryPolicy) -> Self {
        Self {
            identity,
            state: Mutex::new(TokenState::default()),
            refreshes: AtomicU64::new(0),
            retry,
            clock: Utc::now,
        }
    }

    /// Return the held token if still valid, otherwise authenticate until a
    /// valid one is obtained or the retry budget runs out.
    pub async fn ensure_valid_token(&self) -> std::result::Result<AccessToken, AuthError> {
        let seen = self.refreshes.load(Ordering::SeqCst);
        let mut state = self.state.lock().await;

        match state.token.as_ref() {
            Some(token) if token.is_valid_at((self.clock)()) => {
                debug!(expires_at = %token.expires_at(), "Token is valid");
                return Ok(token.clone());
            }
            Some(token) => info!(expires_at = %token.expires_at(), "Token expired"),
            None => info!("No token held"),
        }

        if self.refreshes.load(Ordering::SeqCst) != seen {
            if let Some(err) = &state.last_failure {
                debug!("Refresh that ran while waiting failed, sharing its error");
                return Err(err.clone());
            }
        }

        let outcome = self.refresh().await;
        self.refreshes.fetch_add(1, Ordering::SeqCst);
        match &outcome {
            Ok(token) => {
                state.token = Some(token.clone());
                state.last_failure = None;
            }
            Err(err) => state.last_failure = Some(err.clone()),
        }
        outcome
    }

    async fn refresh(&self) -> std::result::Result<AccessToken, AuthError> {
        let max_attempts = self.retry.max_attempts.max(1);
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.authenticate_once().await {
                Ok(token) => {
                    info!(attempt, expires_at = %token.expires_at(), "Authenticated");
                    return Ok(token);
                }
                Err(e) if attempt >= max_attempts => {
                    warn!(attempt, error = %e, "Authentication failed, giving up");
                    return Err(AuthError::Exhausted {
                        attempts: attempt,
                        last_error: Arc::new(e),
                    });
                }
                Err(e) => {
                    let delay = self.retry.backoff(attempt);
                    warn!(
                        attempt,
                        max_attempts,
                        error = %e,
                        "Authentication failed, retrying in {:?}",
                        delay
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }

    async fn authenticate_once(&self) -> Result<AccessToken> {
        let raw = self.identity.authenticate().await?;
        let token = AccessToken::parse(raw)?;
        if !token.is_valid_at((self.clock)()) {
            return Err(ClientError::Token(TokenError::Expired));
        }
        Ok(token)
    }

    #[cfg(test)]
    fn with_clock(mut self, clock: fn() -> DateTime<Utc>) -> Self {
        self.clock = clock;
        self
    }

    #[cfg(test)]
    async fn hold(&self, token: AccessToken) {
        self.state.lock().await.token = Some(token);
    }
}

#[async_trait]
impl TokenSource for TokenManager {
    async fn ensure_valid_token(&self) -> std::result::Result<AccessToken, AuthError> {
        TokenManager::ensure_valid_token(self).await
    }
}

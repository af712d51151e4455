//! Fake upstream collaborators with call counters

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use jsonwebtoken::{EncodingKey, Header};
use meteomatics_client::{
    AccessToken, AuthError, ClientError, LookupResult, TemperatureSource, TokenSource,
};

pub fn valid_token() -> AccessToken {
    let claims = serde_json::json!({ "exp": chrono::Utc::now().timestamp() + 3600 });
    let raw = jsonwebtoken::encode(&Header::default(), &claims, &EncodingKey::from_secret(b"test"))
        .unwrap();
    AccessToken::parse(raw).unwrap()
}

pub struct FakeTokens {
    calls: AtomicU32,
    fail: bool,
}

impl FakeTokens {
    pub fn ok() -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicU32::new(0),
            fail: false,
        })
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicU32::new(0),
            fail: true,
        })
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TokenSource for FakeTokens {
    async fn ensure_valid_token(&self) -> Result<AccessToken, AuthError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(AuthError::Exhausted {
                attempts: 5,
                last_error: Arc::new(ClientError::Status(401)),
            });
        }
        Ok(valid_token())
    }
}

pub struct FakeWeather {
    calls: AtomicU32,
    delay: Duration,
    status: u16,
    temperature: f64,
}

impl FakeWeather {
    pub fn returning(temperature: f64) -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicU32::new(0),
            delay: Duration::ZERO,
            status: 200,
            temperature,
        })
    }

    pub fn failing(status: u16) -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicU32::new(0),
            delay: Duration::ZERO,
            status,
            temperature: 0.0,
        })
    }

    pub fn slow(delay: Duration, temperature: f64) -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicU32::new(0),
            delay,
            status: 200,
            temperature,
        })
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TemperatureSource for FakeWeather {
    async fn fetch_temperature(&self, postal_code: &str, _token: &AccessToken) -> LookupResult {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if self.status == 200 {
            LookupResult::success(postal_code, self.temperature)
        } else {
            LookupResult::failure(postal_code, self.status)
        }
    }
}

//! Cache-aside temperature lookup by postal code
//!
//! A lookup validates the postal code, serves a cached result when one exists,
//! and otherwise obtains a token, queries Meteomatics and caches whatever came
//! back (errors included) before returning it. Concurrent misses for the same
//! postal code share one upstream fetch.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures::future::{BoxFuture, FutureExt, Shared};
use meteomatics_client::{LookupResult, TemperatureSource, TokenSource};
use tracing::{debug, error, info, warn};

use crate::store::CacheStore;
use crate::types::CacheStats;

/// Malformed postal code
pub const STATUS_BAD_REQUEST: u16 = 400;
/// No upstream token could be obtained
pub const STATUS_AUTH_UNAVAILABLE: u16 = 503;
const STATUS_INTERNAL_ERROR: u16 = 500;

type PendingLookup = Shared<BoxFuture<'static, LookupResult>>;

/// German postal codes are exactly five ASCII digits
pub fn is_valid_postal_code(postal_code: &str) -> bool {
    postal_code.len() == 5 && postal_code.bytes().all(|b| b.is_ascii_digit())
}

#[derive(Clone)]
pub struct LookupOrchestrator {
    inner: Arc<Inner>,
}

struct Inner {
    cache: CacheStore,
    tokens: Arc<dyn TokenSource>,
    weather: Arc<dyn TemperatureSource>,
    in_flight: Mutex<HashMap<String, PendingLookup>>,
}

impl LookupOrchestrator {
    pub fn new(
        cache: CacheStore,
        tokens: Arc<dyn TokenSource>,
        weather: Arc<dyn TemperatureSource>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                cache,
                tokens,
                weather,
                in_flight: Mutex::new(HashMap::new()),
            }),
        }
    }

    pub async fn lookup(&self, postal_code: &str) -> LookupResult {
        if !is_valid_postal_code(postal_code) {
            debug!(postal_code, "Rejected malformed postal code");
            return LookupResult::failure(postal_code, STATUS_BAD_REQUEST);
        }

        match self.inner.cache.get(postal_code).await {
            Ok(Some(result)) => {
                info!(postal_code, status = result.status, "Cache hit");
                return result;
            }
            Ok(None) => info!(postal_code, "Cache miss"),
            Err(e) => warn!(postal_code, error = %e, "Cache read failed, treating as miss"),
        }

        self.join_or_start_fetch(postal_code).await
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.inner.cache.stats()
    }

    fn join_or_start_fetch(&self, postal_code: &str) -> PendingLookup {
        self.inner
            .lock_in_flight()
            .entry(postal_code.to_string())
            .or_insert_with(|| self.spawn_fetch(postal_code))
            .clone()
    }

    /// Run the miss path on its own task so it completes (and clears its
    /// in-flight entry) even if every waiting caller goes away.
    fn spawn_fetch(&self, postal_code: &str) -> PendingLookup {
        let guard = InFlightGuard {
            inner: self.inner.clone(),
            key: postal_code.to_string(),
        };
        let handle =
            tokio::spawn(async move { guard.inner.fetch_unless_cached(&guard.key).await });

        let key = postal_code.to_string();
        async move {
            handle.await.unwrap_or_else(|e| {
                error!(postal_code = %key, error = %e, "Lookup task failed");
                LookupResult::failure(&key, STATUS_INTERNAL_ERROR)
            })
        }
        .boxed()
        .shared()
    }
}

/// Removes a key's in-flight entry when its fetch task ends, panics included
struct InFlightGuard {
    inner: Arc<Inner>,
    key: String,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.inner.lock_in_flight().remove(&self.key);
    }
}

impl Inner {
    fn lock_in_flight(&self) -> MutexGuard<'_, HashMap<String, PendingLookup>> {
        // Only single map operations run under the lock, so the map is intact
        // even if a holder panicked.
        self.in_flight.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn fetch_unless_cached(&self, postal_code: &str) -> LookupResult {
        // The previous fetch for this key may have been stored after the
        // caller's own cache read missed.
        match self.cache.peek(postal_code).await {
            Ok(Some(result)) => {
                debug!(postal_code, "Result stored by an earlier fetch");
                return result;
            }
            Ok(None) => {}
            Err(e) => warn!(postal_code, error = %e, "Cache re-check failed"),
        }
        self.fetch_and_store(postal_code).await
    }

    async fn fetch_and_store(&self, postal_code: &str) -> LookupResult {
        let token = match self.tokens.ensure_valid_token().await {
            Ok(token) => token,
            Err(e) => {
                error!(postal_code, error = %e, "No valid upstream token");
                return LookupResult::failure(postal_code, STATUS_AUTH_UNAVAILABLE);
            }
        };

        let result = self.weather.fetch_temperature(postal_code, &token).await;
        info!(
            postal_code,
            status = result.status,
            temperature = ?result.temperature,
            "Fetched from upstream"
        );

        if let Err(e) = self.cache.put(postal_code, &result).await {
            warn!(postal_code, error = %e, "Failed to cache lookup result");
        }
        result
    }
}

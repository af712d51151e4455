//! TTL-bounded hash-per-key storage for lookup results

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use meteomatics_client::LookupResult;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::codec::{self, CacheRecord};
use crate::error::StoreError;
use crate::types::CacheStats;

pub const DEFAULT_TTL_SECS: u64 = 3600;

/// Hash-per-key storage with per-key expiry
#[async_trait]
pub trait CacheBackend: Send + Sync {
    async fn exists(&self, key: &str) -> Result<bool, StoreError>;

    /// All fields of the hash; empty when the key does not exist
    async fn read_hash(&self, key: &str) -> Result<HashMap<String, String>, StoreError>;

    /// Write the fields and (re)arm the key's expiry as one operation
    async fn write_hash(
        &self,
        key: &str,
        fields: &[(&'static str, String)],
        ttl: Duration,
    ) -> Result<(), StoreError>;
}

/// Redis hashes with `EXPIRE`, shared through a reconnecting connection
pub struct RedisBackend {
    conn: ConnectionManager,
}

impl RedisBackend {
    pub async fn connect(url: &str) -> Result<Self, StoreError> {
        let client = redis::Client::open(url)?;
        let conn = ConnectionManager::new(client).await?;
        info!("Connected to Redis");
        Ok(Self { conn })
    }
}

#[async_trait]
impl CacheBackend for RedisBackend {
    async fn exists(&self, key: &str) -> Result<bool, StoreError> {
        let mut conn = self.conn.clone();
        let exists: bool = conn.exists(key).await?;
        Ok(exists)
    }

    async fn read_hash(&self, key: &str) -> Result<HashMap<String, String>, StoreError> {
        let mut conn = self.conn.clone();
        let fields: HashMap<String, String> = conn.hgetall(key).await?;
        Ok(fields)
    }

    async fn write_hash(
        &self,
        key: &str,
        fields: &[(&'static str, String)],
        ttl: Duration,
    ) -> Result<(), StoreError> {
        let mut conn = self.conn.clone();
        // EXPIRE rejects zero
        let ttl_secs = ttl.as_secs().max(1) as i64;
        redis::pipe()
            .atomic()
            .hset_multiple(key, fields)
            .ignore()
            .expire(key, ttl_secs)
            .ignore()
            .query_async::<()>(&mut conn)
            .await?;
        Ok(())
    }
}

struct MemoryEntry {
    fields: HashMap<String, String>,
    expires_at: Instant,
}

impl MemoryEntry {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at > now
    }
}

/// In-process backend with the same expiry semantics as Redis.
///
/// Deadlines use `tokio::time::Instant`, so a paused test clock drives expiry.
#[derive(Default)]
pub struct MemoryBackend {
    entries: RwLock<HashMap<String, MemoryEntry>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CacheBackend for MemoryBackend {
    async fn exists(&self, key: &str) -> Result<bool, StoreError> {
        let entries = self.entries.read().await;
        Ok(entries
            .get(key)
            .is_some_and(|entry| entry.is_live(Instant::now())))
    }

    async fn read_hash(&self, key: &str) -> Result<HashMap<String, String>, StoreError> {
        let entries = self.entries.read().await;
        Ok(entries
            .get(key)
            .filter(|entry| entry.is_live(Instant::now()))
            .map(|entry| entry.fields.clone())
            .unwrap_or_default())
    }

    async fn write_hash(
        &self,
        key: &str,
        fields: &[(&'static str, String)],
        ttl: Duration,
    ) -> Result<(), StoreError> {
        let now = Instant::now();
        let mut entries = self.entries.write().await;
        entries.retain(|_, entry| entry.is_live(now));

        let entry = entries
            .entry(key.to_string())
            .or_insert_with(|| MemoryEntry {
                fields: HashMap::new(),
                expires_at: now,
            });
        for (field, value) in fields {
            entry.fields.insert((*field).to_string(), value.clone());
        }
        entry.expires_at = now + ttl;
        Ok(())
    }
}

/// Lookup results keyed by postal code, expiring a fixed time after each write.
///
/// Reads never extend an entry's lifetime.
pub struct CacheStore {
    backend: Arc<dyn CacheBackend>,
    ttl: Duration,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl CacheStore {
    pub fn new(backend: Arc<dyn CacheBackend>) -> Self {
        Self::with_ttl(backend, Duration::from_secs(DEFAULT_TTL_SECS))
    }

    pub fn with_ttl(backend: Arc<dyn CacheBackend>, ttl: Duration) -> Self {
        Self {
            backend,
            ttl,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// `Ok(None)` on a miss. Records that no longer decode count as misses.
    pub async fn get(&self, key: &str) -> Result<Option<LookupResult>, StoreError> {
        let found = self.peek(key).await?;
        let counter = if found.is_some() {
            &self.hits
        } else {
            &self.misses
        };
        counter.fetch_add(1, Ordering::Relaxed);
        Ok(found)
    }

    /// Same as [`CacheStore::get`] without touching the hit and miss counters
    pub async fn peek(&self, key: &str) -> Result<Option<LookupResult>, StoreError> {
        if !self.backend.exists(key).await? {
            return Ok(None);
        }

        let fields = self.backend.read_hash(key).await?;
        // Expired between the probe and the read
        if fields.is_empty() {
            return Ok(None);
        }

        match CacheRecord::from_fields(fields).and_then(|record| codec::decode(key, &record)) {
            Ok(result) => Ok(Some(result)),
            Err(e) => {
                warn!(key, error = %e, "Discarding undecodable cache record");
                Ok(None)
            }
        }
    }

    pub async fn put(&self, key: &str, result: &LookupResult) -> Result<(), StoreError> {
        let record = codec::encode(result);
        self.backend
            .write_hash(key, &record.to_fields(), self.ttl)
            .await?;
        debug!(
            key,
            status = result.status,
            ttl_secs = self.ttl.as_secs(),
            "Cached lookup result"
        );
        Ok(())
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }
}

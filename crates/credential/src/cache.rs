//! Expiring key/value cache for secret bundles and issued tokens
//!
//! [`CacheStore`] is the backend seam; [`MemoryCache`] is the in-process
//! backend built on moka. [`TtlCache`] layers the read path on top: an
//! entry whose `expires_at` has passed is a miss and is evicted, and backend
//! failures are logged and treated as a miss (reads) or ignored (writes).

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use moka::Expiry;
use moka::future::Cache;

use crate::error::CacheError;

/// A cached payload with its absolute expiry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry<T> {
    /// Cache key
    pub key: String,
    /// Cached value
    pub payload: T,
    /// Instant after which the entry must not be served
    pub expires_at: DateTime<Utc>,
}

impl<T> CacheEntry<T> {
    /// Entry expiring `ttl` from now
    pub fn new(key: impl Into<String>, payload: T, ttl: Duration) -> Self {
        let ttl = chrono::Duration::from_std(ttl).unwrap_or(chrono::Duration::MAX);
        let expires_at = Utc::now()
            .checked_add_signed(ttl)
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        Self::expiring_at(key, payload, expires_at)
    }

    /// Entry expiring at `expires_at`
    pub fn expiring_at(key: impl Into<String>, payload: T, expires_at: DateTime<Utc>) -> Self {
        Self {
            key: key.into(),
            payload,
            expires_at,
        }
    }

    /// `true` while `now` is before `expires_at`
    pub fn is_live_at(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at
    }

    /// Time left before expiry, `None` once expired
    pub fn remaining(&self, now: DateTime<Utc>) -> Option<Duration> {
        (self.expires_at - now).to_std().ok().filter(|d| !d.is_zero())
    }
}

/// Cache backend
///
/// Implementations may be remote; every operation is fallible and
/// [`TtlCache`] decides how failures are surfaced.
#[async_trait]
pub trait CacheStore<T>: Send + Sync
where
    T: Clone + Send + Sync + 'static,
{
    /// Look up an entry
    async fn get(&self, key: &str) -> Result<Option<CacheEntry<T>>, CacheError>;

    /// Insert or replace an entry
    async fn put(&self, entry: CacheEntry<T>) -> Result<(), CacheError>;

    /// Remove an entry
    async fn del(&self, key: &str) -> Result<(), CacheError>;
}

struct EntryExpiry;

impl<T> Expiry<String, CacheEntry<T>> for EntryExpiry {
    fn expire_after_create(
        &self,
        _key: &String,
        value: &CacheEntry<T>,
        _created_at: Instant,
    ) -> Option<Duration> {
        Some(value.remaining(Utc::now()).unwrap_or(Duration::ZERO))
    }

    fn expire_after_update(
        &self,
        _key: &String,
        value: &CacheEntry<T>,
        _updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        Some(value.remaining(Utc::now()).unwrap_or(Duration::ZERO))
    }
}

/// In-process backend; moka drops entries at their own `expires_at`
pub struct MemoryCache<T> {
    cache: Cache<String, CacheEntry<T>>,
}

impl<T> MemoryCache<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Backend holding at most `max_capacity` entries
    pub fn new(max_capacity: u64) -> Self {
        Self {
            cache: Cache::builder()
                .max_capacity(max_capacity)
                .expire_after(EntryExpiry)
                .build(),
        }
    }

    /// Approximate number of entries
    pub fn entry_count(&self) -> u64 {
        self.cache.entry_count()
    }
}

#[async_trait]
impl<T> CacheStore<T> for MemoryCache<T>
where
    T: Clone + Send + Sync + 'static,
{
    async fn get(&self, key: &str) -> Result<Option<CacheEntry<T>>, CacheError> {
        Ok(self.cache.get(key).await)
    }

    async fn put(&self, entry: CacheEntry<T>) -> Result<(), CacheError> {
        self.cache.insert(entry.key.clone(), entry).await;
        Ok(())
    }

    async fn del(&self, key: &str) -> Result<(), CacheError> {
        self.cache.invalidate(key).await;
        Ok(())
    }
}

/// Cache hit/miss counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Fresh entries served
    pub hits: u64,
    /// Lookups that fell through to the source
    pub misses: u64,
}

impl CacheStats {
    /// Hits over total lookups, `0.0` before the first lookup
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// Read-through helper over a [`CacheStore`]
pub struct TtlCache<T> {
    store: Arc<dyn CacheStore<T>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl<T> TtlCache<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Wrap a backend
    pub fn new(store: Arc<dyn CacheStore<T>>) -> Self {
        Self {
            store,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// In-memory cache holding at most `max_capacity` entries
    pub fn in_memory(max_capacity: u64) -> Self {
        Self::new(Arc::new(MemoryCache::new(max_capacity)))
    }

    /// Unexpired payload for `key`.
    ///
    /// Expired entries are deleted before reporting a miss.
    pub async fn fresh(&self, key: &str) -> Option<T> {
        let entry = match self.store.get(key).await {
            Ok(entry) => entry,
            Err(err) => {
                tracing::warn!(key, error = %err, "cache read failed, treating as miss");
                None
            }
        };

        match entry {
            Some(entry) if entry.is_live_at(Utc::now()) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                Some(entry.payload)
            }
            Some(_) => {
                tracing::trace!(key, "cache entry expired");
                self.evict(key).await;
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    /// Store `payload` for `ttl`; failures are logged and dropped
    pub async fn store(&self, key: &str, payload: T, ttl: Duration) {
        self.put(CacheEntry::new(key, payload, ttl)).await;
    }

    /// Store `payload` until `expires_at`; failures are logged and dropped
    pub async fn store_until(&self, key: &str, payload: T, expires_at: DateTime<Utc>) {
        self.put(CacheEntry::expiring_at(key, payload, expires_at)).await;
    }

    async fn put(&self, entry: CacheEntry<T>) {
        let key = entry.key.clone();
        if let Err(err) = self.store.put(entry).await {
            tracing::warn!(key = %key, error = %err, "cache write failed");
        }
    }

    /// Remove `key`; failures are logged and dropped
    pub async fn evict(&self, key: &str) {
        if let Err(err) = self.store.del(key).await {
            tracing::warn!(key, error = %err, "cache delete failed");
        }
    }

    /// Current counters
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }
}

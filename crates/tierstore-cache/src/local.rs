//! In-process cache tier with TTL-based expiration.
//!
//! Entries live in a `HashMap` behind a reader/writer lock: lookups share the
//! read lock, writes and deletes take the write lock. Expiration is lazy. An
//! expired entry is reported as a miss but stays in the map until it is
//! overwritten, deleted or removed by [`LocalCache::purge_expired`].

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::RwLock;
use tokio::time::Instant;

use crate::context::CacheContext;
use crate::error::CacheResult;
use crate::traits::Cache;

/// Fallback horizon for TTLs too large to add to the current instant.
const FAR_FUTURE: Duration = Duration::from_secs(100 * 365 * 24 * 60 * 60);

/// Cached value with its absolute expiration time.
#[derive(Debug, Clone)]
struct CacheEntry {
    value: String,
    expires_at: Instant,
}

impl CacheEntry {
    fn new(value: String, ttl: Duration, now: Instant) -> Self {
        let expires_at = now
            .checked_add(ttl)
            .unwrap_or_else(|| now + FAR_FUTURE);
        Self { value, expires_at }
    }

    /// An entry is visible iff `now < expires_at`.
    #[inline]
    fn is_live(&self, now: Instant) -> bool {
        now < self.expires_at
    }
}

/// Local in-memory cache tier.
///
/// Time is read from `tokio::time::Instant`, so tests can drive expiry with a
/// paused runtime clock.
#[derive(Debug)]
pub struct LocalCache {
    name: String,
    entries: RwLock<HashMap<String, CacheEntry>>,
}

impl LocalCache {
    /// Create an empty local cache.
    ///
    /// # Example
    ///
    /// ```
    /// use tierstore_cache::LocalCache;
    ///
    /// let cache = LocalCache::new("local");
    /// assert!(cache.is_empty());
    /// ```
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Number of physically stored entries, expired ones included.
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Remove every expired entry. Returns the number of entries removed.
    ///
    /// Nothing in this crate schedules it; embedders may call it periodically
    /// to reclaim memory.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.entries.write();
        let before = entries.len();
        entries.retain(|_, entry| entry.is_live(now));
        let removed = before - entries.len();

        if removed > 0 {
            tracing::debug!(tier = %self.name, removed, "purged expired entries");
        }
        removed
    }

    /// Drop all entries.
    pub fn clear(&self) {
        self.entries.write().clear();
    }

    fn lookup(&self, key: &str) -> Option<(String, Duration)> {
        let now = Instant::now();
        let entries = self.entries.read();
        entries
            .get(key)
            .filter(|entry| entry.is_live(now))
            .map(|entry| {
                (
                    entry.value.clone(),
                    entry.expires_at.saturating_duration_since(now),
                )
            })
    }
}

#[async_trait]
impl Cache for LocalCache {
    fn name(&self) -> &str {
        &self.name
    }

    async fn get(&self, _ctx: &CacheContext, key: &str) -> CacheResult<Option<String>> {
        Ok(self.lookup(key).map(|(value, _)| value))
    }

    async fn get_with_ttl(
        &self,
        _ctx: &CacheContext,
        key: &str,
    ) -> CacheResult<Option<(String, Option<Duration>)>> {
        Ok(self
            .lookup(key)
            .map(|(value, remaining)| (value, Some(remaining))))
    }

    async fn set(
        &self,
        _ctx: &CacheContext,
        key: &str,
        value: &str,
        ttl: Duration,
    ) -> CacheResult<()> {
        let entry = CacheEntry::new(value.to_owned(), ttl, Instant::now());
        self.entries.write().insert(key.to_owned(), entry);
        Ok(())
    }

    async fn delete(&self, _ctx: &CacheContext, key: &str) -> CacheResult<()> {
        self.entries.write().remove(key);
        Ok(())
    }
}

//! The cache capability contract shared by every tier and by the coordinator.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::context::CacheContext;
use crate::error::CacheResult;

/// A key/value cache tier.
///
/// Keys and values are opaque strings; the cache never interprets the payload.
/// A missing or expired key is `Ok(None)`, never an error. Implementations must
/// be safe for concurrent use.
///
/// A `ttl` of [`Duration::ZERO`] means "expires immediately": the write
/// replaces any previous value but nothing is readable afterwards.
#[async_trait]
pub trait Cache: Send + Sync {
    /// Short name used in logs and metric labels, e.g. `"local"` or `"redis"`.
    fn name(&self) -> &str;

    /// Returns the value for `key` if present and not expired.
    async fn get(&self, ctx: &CacheContext, key: &str) -> CacheResult<Option<String>>;

    /// Like [`Cache::get`], also reporting the remaining time-to-live when the
    /// tier knows it.
    ///
    /// Default implementation delegates to `get` and reports no TTL.
    async fn get_with_ttl(
        &self,
        ctx: &CacheContext,
        key: &str,
    ) -> CacheResult<Option<(String, Option<Duration>)>> {
        Ok(self.get(ctx, key).await?.map(|value| (value, None)))
    }

    /// Stores `value` under `key`, overwriting unconditionally and resetting
    /// the expiration to now + `ttl`.
    async fn set(&self, ctx: &CacheContext, key: &str, value: &str, ttl: Duration)
    -> CacheResult<()>;

    /// Removes `key`. Deleting an absent key is not an error.
    async fn delete(&self, ctx: &CacheContext, key: &str) -> CacheResult<()>;
}

/// Shared, dynamically dispatched cache tier.
pub type DynCache = Arc<dyn Cache>;

/// Converts a signed seconds count into a TTL, clamping negatives to zero.
pub fn ttl_from_secs(secs: i64) -> Duration {
    Duration::from_secs(secs.max(0) as u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ttl_from_secs() {
        assert_eq!(ttl_from_secs(300), Duration::from_secs(300));
        assert_eq!(ttl_from_secs(0), Duration::ZERO);
        assert_eq!(ttl_from_secs(-5), Duration::ZERO);
    }
}

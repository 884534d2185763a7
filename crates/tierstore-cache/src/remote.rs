//! Redis cache tier.
//!
//! Each operation checks a connection out of the `deadpool-redis` pool and
//! performs a single round trip. The whole exchange (checkout included) runs
//! under the caller's [`CacheContext`], so a deadline or cancellation aborts it
//! with a failed outcome instead of blocking the request.

use std::time::Duration;

use async_trait::async_trait;
use deadpool_redis::Pool;
use redis::AsyncCommands;

use crate::context::CacheContext;
use crate::error::{CacheError, CacheResult};
use crate::traits::Cache;

/// Shared, out-of-process cache tier backed by Redis.
///
/// ## TTL handling
///
/// Values are written with `PSETEX`, so sub-second TTLs keep millisecond
/// precision. A zero TTL deletes the key, since Redis rejects a zero expiry and
/// the value would be unreadable anyway.
#[derive(Clone)]
pub struct RedisCache {
    name: String,
    pool: Pool,
}

impl RedisCache {
    /// Create a Redis tier on top of an existing connection pool.
    pub fn new(pool: Pool) -> Self {
        Self::with_name("redis", pool)
    }

    /// Create a Redis tier with a custom name for logs and metrics.
    pub fn with_name(name: impl Into<String>, pool: Pool) -> Self {
        Self {
            name: name.into(),
            pool,
        }
    }

    /// Check if Redis is reachable (for health checks).
    pub async fn is_available(&self) -> bool {
        match self.pool.get().await {
            Ok(mut conn) => {
                let pong: redis::RedisResult<String> =
                    redis::cmd("PING").query_async(&mut conn).await;
                pong.is_ok()
            }
            Err(_) => false,
        }
    }
}

/// Interpret a `PTTL` reply: `-2` means missing, `-1` means no expiry.
fn remaining_from_pttl(pttl: i64) -> Option<Duration> {
    u64::try_from(pttl).ok().map(Duration::from_millis)
}

#[async_trait]
impl Cache for RedisCache {
    fn name(&self) -> &str {
        &self.name
    }

    async fn get(&self, ctx: &CacheContext, key: &str) -> CacheResult<Option<String>> {
        let value = ctx
            .run(async {
                let mut conn = self.pool.get().await?;
                Ok::<_, CacheError>(conn.get::<_, Option<String>>(key).await?)
            })
            .await?;

        tracing::trace!(tier = %self.name, key = %key, hit = value.is_some(), "redis GET");
        Ok(value)
    }

    async fn get_with_ttl(
        &self,
        ctx: &CacheContext,
        key: &str,
    ) -> CacheResult<Option<(String, Option<Duration>)>> {
        ctx.run(async {
            let mut conn = self.pool.get().await?;
            let (value, pttl): (Option<String>, i64) = redis::pipe()
                .get(key)
                .pttl(key)
                .query_async(&mut conn)
                .await?;
            Ok::<_, CacheError>(value.map(|v| (v, remaining_from_pttl(pttl))))
        })
        .await
    }

    async fn set(
        &self,
        ctx: &CacheContext,
        key: &str,
        value: &str,
        ttl: Duration,
    ) -> CacheResult<()> {
        let ttl_ms = u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX);

        ctx.run(async {
            let mut conn = self.pool.get().await?;
            if ttl_ms == 0 {
                conn.del::<_, ()>(key).await?;
            } else {
                conn.pset_ex::<_, _, ()>(key, value, ttl_ms).await?;
            }
            Ok::<_, CacheError>(())
        })
        .await?;

        tracing::trace!(tier = %self.name, key = %key, ttl_ms, "redis PSETEX");
        Ok(())
    }

    async fn delete(&self, ctx: &CacheContext, key: &str) -> CacheResult<()> {
        ctx.run(async {
            let mut conn = self.pool.get().await?;
            conn.del::<_, ()>(key).await?;
            Ok::<_, CacheError>(())
        })
        .await?;

        tracing::trace!(tier = %self.name, key = %key, "redis DEL");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remaining_from_pttl() {
        assert_eq!(remaining_from_pttl(1500), Some(Duration::from_millis(1500)));
        assert_eq!(remaining_from_pttl(-1), None);
        assert_eq!(remaining_from_pttl(-2), None);
    }
}

//! Multi-level cache coordinator.
//!
//! Composes an ordered list of tiers (fastest first) into one logical cache
//! using cache-aside with read-through promotion:
//!
//! - **get**: try tiers in order; the first non-empty hit is written back into
//!   every tier with the promotion TTL and returned.
//! - **set**: write every tier in order; failures follow the [`WritePolicy`].
//! - **delete**: delete from every tier; failures are logged and ignored.
//!
//! A failing tier is never fatal. It is skipped on reads and, under the default
//! [`WritePolicy::BestEffort`], ignored on writes.
//!
//! ## Known limitations
//!
//! An empty string value is indistinguishable from a miss: tiers store it, but
//! the coordinator skips it on reads.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::context::CacheContext;
use crate::error::{CacheError, CacheResult};
use crate::traits::{Cache, DynCache};

/// TTL used when promoting a hit into the tiers.
pub const DEFAULT_PROMOTION_TTL: Duration = Duration::from_secs(300);

/// What a multi-tier `set` reports when some tiers fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WritePolicy {
    /// Write every tier, log failures, always report success.
    #[default]
    BestEffort,
    /// Write every tier, then report [`CacheError::PartialWrite`] naming the
    /// tiers that failed.
    Strict,
}

/// TTL applied to values written back into the tiers after a hit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromotionTtl {
    /// Always use this TTL, whatever the source tier's remaining lifetime.
    Fixed(Duration),
    /// Carry the source tier's remaining TTL forward. Uses `fallback` when the
    /// tier cannot report it (no expiry, or a tier without TTL reporting).
    Inherit { fallback: Duration },
}

impl Default for PromotionTtl {
    fn default() -> Self {
        Self::Fixed(DEFAULT_PROMOTION_TTL)
    }
}

/// Several cache tiers behaving as one.
///
/// Cloning is cheap: the tier list is shared and immutable after construction.
#[derive(Clone)]
pub struct MultiLevelCache {
    tiers: Arc<[DynCache]>,
    write_policy: WritePolicy,
    promotion_ttl: PromotionTtl,
    background_promotion: bool,
}

impl MultiLevelCache {
    /// Create a coordinator with default policies.
    ///
    /// # Errors
    ///
    /// Returns `CacheError::Config` if `tiers` is empty.
    pub fn new(tiers: Vec<DynCache>) -> CacheResult<Self> {
        Self::builder().tiers(tiers).build()
    }

    pub fn builder() -> MultiLevelCacheBuilder {
        MultiLevelCacheBuilder::default()
    }

    /// Tier names in lookup order.
    pub fn tier_names(&self) -> Vec<&str> {
        self.tiers.iter().map(|tier| tier.name()).collect()
    }

    pub fn tier_count(&self) -> usize {
        self.tiers.len()
    }

    pub fn write_policy(&self) -> WritePolicy {
        self.write_policy
    }

    pub fn promotion_ttl(&self) -> PromotionTtl {
        self.promotion_ttl
    }

    async fn lookup(
        &self,
        tier: &DynCache,
        ctx: &CacheContext,
        key: &str,
    ) -> CacheResult<Option<(String, Option<Duration>)>> {
        match self.promotion_ttl {
            PromotionTtl::Fixed(_) => Ok(tier.get(ctx, key).await?.map(|value| (value, None))),
            PromotionTtl::Inherit { .. } => tier.get_with_ttl(ctx, key).await,
        }
    }

    /// Write a hit back into every tier.
    ///
    /// Runs inline by default, so `get` returns only after all tiers were
    /// written. With background promotion the writes are spawned on the tokio
    /// runtime under a fresh context and `get` returns immediately.
    async fn promote(
        &self,
        ctx: &CacheContext,
        key: &str,
        value: &str,
        source: &str,
        remaining: Option<Duration>,
    ) {
        let ttl = match self.promotion_ttl {
            PromotionTtl::Fixed(ttl) => ttl,
            PromotionTtl::Inherit { fallback } => remaining.unwrap_or(fallback),
        };
        crate::metrics::record_promotion(source);

        if self.background_promotion {
            let tiers = Arc::clone(&self.tiers);
            let key = key.to_owned();
            let value = value.to_owned();
            tokio::spawn(async move {
                write_all(&tiers, &CacheContext::background(), &key, &value, ttl).await;
            });
        } else {
            write_all(&self.tiers, ctx, key, value, ttl).await;
        }
    }
}

/// Write `value` into every tier in order. Returns the names of failed tiers.
async fn write_all(
    tiers: &[DynCache],
    ctx: &CacheContext,
    key: &str,
    value: &str,
    ttl: Duration,
) -> Vec<String> {
    let mut failed = Vec::new();
    for tier in tiers {
        if let Err(e) = tier.set(ctx, key, value, ttl).await {
            tracing::warn!(tier = %tier.name(), key = %key, error = %e, "cache tier SET failed");
            crate::metrics::record_tier_error(tier.name(), "set");
            failed.push(tier.name().to_owned());
        }
    }
    failed
}

#[async_trait]
impl Cache for MultiLevelCache {
    fn name(&self) -> &str {
        "multi-level"
    }

    async fn get(&self, ctx: &CacheContext, key: &str) -> CacheResult<Option<String>> {
        for tier in self.tiers.iter() {
            match self.lookup(tier, ctx, key).await {
                Ok(Some((value, _))) if value.is_empty() => {
                    tracing::debug!(tier = %tier.name(), key = %key, "empty cached value treated as miss");
                }
                Ok(Some((value, remaining))) => {
                    tracing::debug!(tier = %tier.name(), key = %key, "cache hit");
                    crate::metrics::record_cache_hit(tier.name());
                    self.promote(ctx, key, &value, tier.name(), remaining).await;
                    return Ok(Some(value));
                }
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!(tier = %tier.name(), key = %key, error = %e, "cache tier GET failed");
                    crate::metrics::record_tier_error(tier.name(), "get");
                }
            }
        }

        tracing::debug!(key = %key, "cache miss");
        crate::metrics::record_cache_miss();
        Ok(None)
    }

    async fn set(
        &self,
        ctx: &CacheContext,
        key: &str,
        value: &str,
        ttl: Duration,
    ) -> CacheResult<()> {
        let failed = write_all(&self.tiers, ctx, key, value, ttl).await;

        match self.write_policy {
            WritePolicy::Strict if !failed.is_empty() => Err(CacheError::partial_write(failed)),
            _ => Ok(()),
        }
    }

    async fn delete(&self, ctx: &CacheContext, key: &str) -> CacheResult<()> {
        for tier in self.tiers.iter() {
            if let Err(e) = tier.delete(ctx, key).await {
                tracing::warn!(tier = %tier.name(), key = %key, error = %e, "cache tier DELETE failed");
                crate::metrics::record_tier_error(tier.name(), "delete");
            }
        }
        Ok(())
    }
}

/// Builder for [`MultiLevelCache`].
#[derive(Default)]
pub struct MultiLevelCacheBuilder {
    tiers: Vec<DynCache>,
    write_policy: WritePolicy,
    promotion_ttl: PromotionTtl,
    background_promotion: bool,
}

impl MultiLevelCacheBuilder {
    /// Append a tier. Tiers are consulted in the order they are added.
    pub fn tier(mut self, tier: DynCache) -> Self {
        self.tiers.push(tier);
        self
    }

    pub fn tiers(mut self, tiers: impl IntoIterator<Item = DynCache>) -> Self {
        self.tiers.extend(tiers);
        self
    }

    pub fn write_policy(mut self, policy: WritePolicy) -> Self {
        self.write_policy = policy;
        self
    }

    pub fn promotion_ttl(mut self, ttl: PromotionTtl) -> Self {
        self.promotion_ttl = ttl;
        self
    }

    /// Promote hits in a spawned task instead of before `get` returns.
    pub fn background_promotion(mut self, enabled: bool) -> Self {
        self.background_promotion = enabled;
        self
    }

    /// # Errors
    ///
    /// Returns `CacheError::Config` if no tier was added.
    pub fn build(self) -> CacheResult<MultiLevelCache> {
        if self.tiers.is_empty() {
            return Err(CacheError::config("multi-level cache needs at least one tier"));
        }

        Ok(MultiLevelCache {
            tiers: Arc::from(self.tiers),
            write_policy: self.write_policy,
            promotion_ttl: self.promotion_ttl,
            background_promotion: self.background_promotion,
        })
    }
}

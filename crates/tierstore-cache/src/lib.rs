//! Multi-level caching for the tierstore data-access layer.
//!
//! ## Architecture
//!
//! - **L1 ([`LocalCache`])**: In-process map behind a reader/writer lock, per-instance
//! - **L2 ([`RedisCache`])**: Network, shared across instances
//! - **[`MultiLevelCache`]**: Composes any ordered list of tiers into one logical cache
//!
//! Every tier, and the coordinator itself, implements the [`Cache`] trait, so a
//! coordinator can be nested inside another or swapped for a single tier.
//!
//! ## Cache Hierarchy
//!
//! ```text
//! get(key) → L1 (local) → L2 (Redis) → miss (caller reads the record store)
//!              ↓ hit          ↓ hit
//!          promote to all tiers with the promotion TTL
//! ```
//!
//! ## Graceful Degradation
//!
//! A tier that errors is skipped on reads and ignored on writes. The cache is a
//! rebuildable view over the record store, so a degraded tier only costs latency.
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//! use tierstore_cache::{Cache, CacheContext, LocalCache, MultiLevelCache};
//!
//! # async fn demo() -> Result<(), tierstore_cache::CacheError> {
//! let cache = MultiLevelCache::builder()
//!     .tier(Arc::new(LocalCache::new("l1")))
//!     .build()?;
//!
//! let ctx = CacheContext::with_timeout(Duration::from_millis(50));
//! cache.set(&ctx, "product:1", r#"{"id":1}"#, Duration::from_secs(300)).await?;
//! assert!(cache.get(&ctx, "product:1").await?.is_some());
//! # Ok(())
//! # }
//! ```

mod context;
mod error;
pub mod local;
pub mod metrics;
pub mod multi_level;
pub mod remote;
mod traits;

pub use context::CacheContext;
pub use error::{CacheError, CacheResult};
pub use local::LocalCache;
pub use multi_level::{
    DEFAULT_PROMOTION_TTL, MultiLevelCache, MultiLevelCacheBuilder, PromotionTtl, WritePolicy,
};
pub use remote::RedisCache;
pub use traits::{Cache, DynCache, ttl_from_secs};

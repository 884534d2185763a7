pub mod config;
pub mod error;
pub mod handlers;
pub mod observability;
pub mod server;
pub mod service;

use std::sync::Arc;
use std::time::Duration;

use tierstore_cache::{CacheResult, DynCache, LocalCache, MultiLevelCache, RedisCache};
use tierstore_storage::{
    DynRepository, MemoryRepository, PostgresStore, Product, StorageResult, User,
};

use crate::config::StorageBackend;

pub use crate::config::{AppConfig, CacheConfig, RedisConfig, StorageConfig};
pub use error::ApiError;
pub use observability::init_tracing;
pub use server::{AppState, ServerBuilder, TierstoreServer, build_app};
pub use service::{CachePolicy, RecordService, ServiceError};

/// The assembled cache plus a handle on its in-process tier.
#[derive(Clone)]
pub struct CacheStack {
    pub cache: MultiLevelCache,
    pub local: Arc<LocalCache>,
}

/// Create the multi-level cache based on configuration.
///
/// ## Cache Modes
///
/// - **Redis disabled**: local tier only
/// - **Redis enabled**: `[local, redis]`, falling back to local only when the
///   pool cannot be created or the first connection fails
pub async fn create_cache(redis: &RedisConfig, cache: &CacheConfig) -> CacheResult<CacheStack> {
    let local = Arc::new(LocalCache::new("local"));
    let mut builder = MultiLevelCache::builder()
        .tier(local.clone() as DynCache)
        .write_policy(cache.write_policy())
        .promotion_ttl(cache.promotion_ttl())
        .background_promotion(cache.background_promotion);

    if let Some(remote) = connect_redis(redis).await {
        builder = builder.tier(Arc::new(remote) as DynCache);
    }

    Ok(CacheStack {
        cache: builder.build()?,
        local,
    })
}

async fn connect_redis(config: &RedisConfig) -> Option<RedisCache> {
    if !config.enabled {
        tracing::info!("Redis disabled, using local cache only");
        return None;
    }

    tracing::info!(url = %config.url, "Connecting to Redis");

    let timeout = Duration::from_millis(config.timeout_ms);
    let mut redis_config = deadpool_redis::Config::from_url(&config.url);
    let pool_config = redis_config
        .pool
        .get_or_insert_with(|| deadpool_redis::PoolConfig::new(config.pool_size));
    pool_config.max_size = config.pool_size;
    pool_config.timeouts.wait = Some(timeout);
    pool_config.timeouts.create = Some(timeout);
    pool_config.timeouts.recycle = Some(timeout);

    let pool = match redis_config.create_pool(Some(deadpool_redis::Runtime::Tokio1)) {
        Ok(pool) => pool,
        Err(e) => {
            tracing::warn!(
                error = %e,
                "Failed to create Redis pool. Falling back to local cache."
            );
            return None;
        }
    };

    match pool.get().await {
        Ok(_) => {
            tracing::info!("Connected to Redis");
            Some(RedisCache::new(pool))
        }
        Err(e) => {
            tracing::warn!(
                error = %e,
                "Failed to connect to Redis. Falling back to local cache."
            );
            None
        }
    }
}

/// Open the product and user repositories for the configured backend.
pub async fn open_repositories(
    config: &StorageConfig,
) -> StorageResult<(DynRepository<Product>, DynRepository<User>)> {
    match config.backend {
        StorageBackend::Memory => {
            tracing::info!("Using in-memory storage");
            let products: DynRepository<Product> = Arc::new(MemoryRepository::new());
            let users: DynRepository<User> = Arc::new(MemoryRepository::new());
            Ok((products, users))
        }
        StorageBackend::Postgres => {
            let pg = config.postgres.clone().unwrap_or_default();
            let store =
                PostgresStore::connect(&pg.connection_url(), pg.pool_size, pg.connect_timeout())
                    .await?;
            store.migrate().await?;
            let products: DynRepository<Product> = Arc::new(store.products());
            let users: DynRepository<User> = Arc::new(store.users());
            Ok((products, users))
        }
    }
}

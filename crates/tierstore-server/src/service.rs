//! Cache-aside record service.
//!
//! Reads go through the multi-level cache and fall back to the repository on a
//! miss; writes go to the repository and then invalidate the affected keys.
//! The cache never fails a request: every cache problem degrades to a store
//! round trip.

use std::marker::PhantomData;
use std::time::Duration;

use tierstore_cache::{Cache, CacheContext, MultiLevelCache};
use tierstore_storage::{DynRepository, Record, StorageError};
use time::OffsetDateTime;
use tracing::{debug, warn};

/// Errors surfaced by the record service.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: i64 },

    #[error(transparent)]
    Storage(StorageError),
}

impl From<StorageError> for ServiceError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound { entity, id } => Self::NotFound { entity, id },
            other => Self::Storage(other),
        }
    }
}

pub type ServiceResult<T> = Result<T, ServiceError>;

/// TTLs applied when the service fills the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CachePolicy {
    pub item_ttl: Duration,
    pub collection_ttl: Duration,
}

impl CachePolicy {
    pub fn new(item_ttl: Duration, collection_ttl: Duration) -> Self {
        Self {
            item_ttl,
            collection_ttl,
        }
    }
}

/// Cache key for a single record, e.g. `product:1`.
pub fn item_key<R: Record>(id: i64) -> String {
    format!("{}:{}", R::ENTITY, id)
}

/// Cache key for the full listing of an entity, e.g. `product:all`.
pub fn collection_key<R: Record>() -> String {
    format!("{}:all", R::ENTITY)
}

/// CRUD over one record type, fronted by the multi-level cache.
pub struct RecordService<R: Record> {
    repo: DynRepository<R>,
    cache: MultiLevelCache,
    policy: CachePolicy,
    _record: PhantomData<fn() -> R>,
}

impl<R: Record> Clone for RecordService<R> {
    fn clone(&self) -> Self {
        Self {
            repo: self.repo.clone(),
            cache: self.cache.clone(),
            policy: self.policy,
            _record: PhantomData,
        }
    }
}

impl<R: Record> RecordService<R> {
    pub fn new(repo: DynRepository<R>, cache: MultiLevelCache, policy: CachePolicy) -> Self {
        Self {
            repo,
            cache,
            policy,
            _record: PhantomData,
        }
    }

    pub async fn find_by_id(&self, ctx: &CacheContext, id: i64) -> ServiceResult<R> {
        let key = item_key::<R>(id);
        if let Some(record) = self.cached::<R>(ctx, &key).await {
            return Ok(record);
        }

        let record = self
            .repo
            .find_by_id(id)
            .await?
            .ok_or(ServiceError::NotFound {
                entity: R::ENTITY,
                id,
            })?;

        self.fill(ctx, &key, &record, self.policy.item_ttl).await;
        Ok(record)
    }

    pub async fn find_all(&self, ctx: &CacheContext) -> ServiceResult<Vec<R>> {
        let key = collection_key::<R>();
        if let Some(records) = self.cached::<Vec<R>>(ctx, &key).await {
            return Ok(records);
        }

        let records = self.repo.find_all().await?;
        self.fill(ctx, &key, &records, self.policy.collection_ttl)
            .await;
        Ok(records)
    }

    pub async fn create(&self, ctx: &CacheContext, mut record: R) -> ServiceResult<R> {
        let now = OffsetDateTime::now_utc();
        record.set_created_at(now);
        record.set_updated_at(now);

        let created = self.repo.create(record).await?;
        self.invalidate(ctx, &[collection_key::<R>()]).await;
        debug!(entity = R::ENTITY, id = created.id(), "Record created");
        Ok(created)
    }

    pub async fn update(&self, ctx: &CacheContext, mut record: R) -> ServiceResult<R> {
        record.set_updated_at(OffsetDateTime::now_utc());

        let updated = self.repo.update(&record).await?;
        self.invalidate(ctx, &[item_key::<R>(updated.id()), collection_key::<R>()])
            .await;
        debug!(entity = R::ENTITY, id = updated.id(), "Record updated");
        Ok(updated)
    }

    pub async fn delete(&self, ctx: &CacheContext, id: i64) -> ServiceResult<()> {
        self.repo.delete(id).await?;
        self.invalidate(ctx, &[item_key::<R>(id), collection_key::<R>()])
            .await;
        debug!(entity = R::ENTITY, id, "Record deleted");
        Ok(())
    }

    /// Looks a key up and decodes it. A value that fails to decode is
    /// dropped from the cache and reported as a miss.
    async fn cached<T: serde::de::DeserializeOwned>(
        &self,
        ctx: &CacheContext,
        key: &str,
    ) -> Option<T> {
        let raw = self.cache.get(ctx, key).await.ok().flatten()?;
        match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(key, error = %e, "Dropping undecodable cache entry");
                self.invalidate(ctx, &[key.to_owned()]).await;
                None
            }
        }
    }

    async fn fill<T: serde::Serialize>(
        &self,
        ctx: &CacheContext,
        key: &str,
        value: &T,
        ttl: Duration,
    ) {
        let json = match serde_json::to_string(value) {
            Ok(json) => json,
            Err(e) => {
                warn!(key, error = %e, "Failed to encode record for cache");
                return;
            }
        };
        if let Err(e) = self.cache.set(ctx, key, &json, ttl).await {
            warn!(key, error = %e, "Cache fill failed");
        }
    }

    async fn invalidate(&self, ctx: &CacheContext, keys: &[String]) {
        for key in keys {
            if let Err(e) = self.cache.delete(ctx, key).await {
                warn!(key = %key, error = %e, "Cache invalidation failed");
            }
        }
    }
}

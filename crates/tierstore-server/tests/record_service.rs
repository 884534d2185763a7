//! Cache-aside behaviour of the record service against the in-memory store.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tierstore_cache::{
    Cache, CacheContext, CacheError, CacheResult, DynCache, LocalCache, MultiLevelCache,
};
use tierstore_server::service::{CachePolicy, RecordService, ServiceError};
use tierstore_storage::{MemoryRepository, Product, Repository, User};

/// A tier whose every call fails, standing in for an unreachable Redis.
struct DownCache;

#[async_trait]
impl Cache for DownCache {
    fn name(&self) -> &str {
        "down"
    }

    async fn get(&self, _ctx: &CacheContext, _key: &str) -> CacheResult<Option<String>> {
        Err(CacheError::DeadlineExceeded)
    }

    async fn set(
        &self,
        _ctx: &CacheContext,
        _key: &str,
        _value: &str,
        _ttl: Duration,
    ) -> CacheResult<()> {
        Err(CacheError::DeadlineExceeded)
    }

    async fn delete(&self, _ctx: &CacheContext, _key: &str) -> CacheResult<()> {
        Err(CacheError::DeadlineExceeded)
    }
}

struct Fixture {
    repo: Arc<MemoryRepository<Product>>,
    local: Arc<LocalCache>,
    service: RecordService<Product>,
}

fn product_fixture() -> Fixture {
    let repo = Arc::new(MemoryRepository::<Product>::new());
    let local = Arc::new(LocalCache::new("local"));
    let cache = MultiLevelCache::builder()
        .tier(local.clone() as DynCache)
        .build()
        .expect("one tier");
    let service = RecordService::new(
        repo.clone(),
        cache,
        CachePolicy::new(Duration::from_secs(300), Duration::from_secs(300)),
    );
    Fixture {
        repo,
        local,
        service,
    }
}

fn ctx() -> CacheContext {
    CacheContext::with_timeout(Duration::from_secs(1))
}

#[tokio::test]
async fn find_by_id_fills_cache_then_serves_from_it() {
    let f = product_fixture();
    let created = f
        .repo
        .create(Product::new("Lamp", "Desk lamp", 15.0))
        .await
        .unwrap();

    let first = f.service.find_by_id(&ctx(), created.id).await.unwrap();
    assert_eq!(first, created);
    assert_eq!(f.repo.read_count(), 1);

    let cached = f.local.get(&ctx(), "product:1").await.unwrap();
    assert!(cached.is_some_and(|json| json.contains("\"Lamp\"")));

    let second = f.service.find_by_id(&ctx(), created.id).await.unwrap();
    assert_eq!(second, created);
    assert_eq!(f.repo.read_count(), 1, "second read must be a cache hit");
}

#[tokio::test]
async fn missing_record_is_not_found_and_not_cached() {
    let f = product_fixture();

    let err = f.service.find_by_id(&ctx(), 42).await.unwrap_err();
    assert!(matches!(
        err,
        ServiceError::NotFound {
            entity: "product",
            id: 42
        }
    ));
    assert!(f.local.is_empty());
}

#[tokio::test]
async fn create_invalidates_collection() {
    let f = product_fixture();
    f.service
        .create(&ctx(), Product::new("A", "", 1.0))
        .await
        .unwrap();

    let all = f.service.find_all(&ctx()).await.unwrap();
    assert_eq!(all.len(), 1);
    assert!(f.local.get(&ctx(), "product:all").await.unwrap().is_some());

    let created = f
        .service
        .create(&ctx(), Product::new("B", "", 2.0))
        .await
        .unwrap();
    assert_eq!(created.id, 2);
    assert!(f.local.get(&ctx(), "product:all").await.unwrap().is_none());

    let all = f.service.find_all(&ctx()).await.unwrap();
    assert_eq!(all.len(), 2);
}

#[tokio::test]
async fn create_stamps_timestamps() {
    let f = product_fixture();
    let created = f
        .service
        .create(&ctx(), Product::new("A", "", 1.0))
        .await
        .unwrap();

    assert_ne!(created.created_at, time::OffsetDateTime::UNIX_EPOCH);
    assert_eq!(created.created_at, created.updated_at);
}

#[tokio::test]
async fn update_invalidates_item_and_collection() {
    let f = product_fixture();
    let created = f
        .service
        .create(&ctx(), Product::new("Chair", "", 80.0))
        .await
        .unwrap();
    f.service.find_by_id(&ctx(), created.id).await.unwrap();
    f.service.find_all(&ctx()).await.unwrap();
    assert_eq!(f.local.len(), 2);

    let mut changed = created.clone();
    changed.price = 70.0;
    let updated = f.service.update(&ctx(), changed).await.unwrap();
    assert_eq!(updated.price, 70.0);
    assert_eq!(updated.created_at, created.created_at);
    assert!(f.local.is_empty());

    let fresh = f.service.find_by_id(&ctx(), created.id).await.unwrap();
    assert_eq!(fresh.price, 70.0);
}

#[tokio::test]
async fn delete_invalidates_and_second_delete_is_not_found() {
    let f = product_fixture();
    let created = f
        .service
        .create(&ctx(), Product::new("Chair", "", 80.0))
        .await
        .unwrap();
    f.service.find_by_id(&ctx(), created.id).await.unwrap();

    f.service.delete(&ctx(), created.id).await.unwrap();
    assert!(f.local.get(&ctx(), "product:1").await.unwrap().is_none());

    let err = f.service.find_by_id(&ctx(), created.id).await.unwrap_err();
    assert!(matches!(err, ServiceError::NotFound { .. }));

    let err = f.service.delete(&ctx(), created.id).await.unwrap_err();
    assert!(matches!(err, ServiceError::NotFound { .. }));
}

#[tokio::test]
async fn undecodable_entry_is_dropped_and_refetched() {
    let f = product_fixture();
    let created = f
        .repo
        .create(Product::new("Desk", "", 120.0))
        .await
        .unwrap();
    f.local
        .set(&ctx(), "product:1", "{not json", Duration::from_secs(300))
        .await
        .unwrap();

    let found = f.service.find_by_id(&ctx(), created.id).await.unwrap();
    assert_eq!(found, created);
    assert_eq!(f.repo.read_count(), 1);

    let cached = f.local.get(&ctx(), "product:1").await.unwrap();
    assert!(cached.is_some_and(|json| json.contains("\"Desk\"")));
}

#[tokio::test]
async fn undecodable_entry_is_dropped_even_when_a_tier_is_down() {
    let repo = Arc::new(MemoryRepository::<Product>::new());
    let local = Arc::new(LocalCache::new("local"));
    let cache = MultiLevelCache::builder()
        .tier(local.clone() as DynCache)
        .tier(Arc::new(DownCache) as DynCache)
        .build()
        .expect("two tiers");
    let service = RecordService::new(
        repo.clone(),
        cache,
        CachePolicy::new(Duration::from_secs(300), Duration::from_secs(300)),
    );
    let created = repo
        .create(Product::new("Shelf", "", 45.0))
        .await
        .unwrap();
    local
        .set(&ctx(), "product:1", "[1, 2", Duration::from_secs(300))
        .await
        .unwrap();

    let found = service.find_by_id(&ctx(), created.id).await.unwrap();
    assert_eq!(found, created);
    assert_eq!(repo.read_count(), 1);

    let cached = local.get(&ctx(), "product:1").await.unwrap();
    assert!(cached.is_some_and(|json| json.contains("\"Shelf\"")));
}

#[tokio::test]
async fn invalid_input_surfaces_as_storage_error() {
    let f = product_fixture();
    let err = f
        .service
        .create(&ctx(), Product::new("", "", 1.0))
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::Storage(_)));
}

#[tokio::test]
async fn unavailable_cache_never_fails_requests() {
    let repo = Arc::new(MemoryRepository::<User>::new());
    let cache = MultiLevelCache::builder()
        .tier(Arc::new(DownCache) as DynCache)
        .build()
        .expect("one tier");
    let service = RecordService::new(
        repo.clone(),
        cache,
        CachePolicy::new(Duration::from_secs(60), Duration::from_secs(300)),
    );

    let created = service
        .create(&ctx(), User::new("Ann", "ann@example.com"))
        .await
        .unwrap();
    assert_eq!(service.find_by_id(&ctx(), created.id).await.unwrap(), created);
    assert_eq!(service.find_all(&ctx()).await.unwrap().len(), 1);
    service.delete(&ctx(), created.id).await.unwrap();

    // every read went to the store
    assert_eq!(repo.read_count(), 2);
}

#[tokio::test]
async fn users_are_cached_without_password() {
    let repo = Arc::new(MemoryRepository::<User>::new());
    let local = Arc::new(LocalCache::new("local"));
    let cache = MultiLevelCache::builder()
        .tier(local.clone() as DynCache)
        .build()
        .expect("one tier");
    let service = RecordService::new(
        repo,
        cache,
        CachePolicy::new(Duration::from_secs(60), Duration::from_secs(300)),
    );

    let mut user = User::new("Ann", "ann@example.com");
    user.password = "hunter2".into();
    let created = service.create(&ctx(), user).await.unwrap();
    service.find_by_id(&ctx(), created.id).await.unwrap();

    let (json, ttl) = local
        .get_with_ttl(&ctx(), "user:1")
        .await
        .unwrap()
        .expect("user cached");
    assert!(!json.contains("hunter2"));
    assert!(ttl.is_some_and(|ttl| ttl <= Duration::from_secs(60)));
}

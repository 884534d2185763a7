use std::time::Duration;

use tierstore_cache::{PromotionTtl, WritePolicy};
use tierstore_server::config::{CacheConfig, PromotionMode, RedisConfig, WritePolicyMode};
use tierstore_server::create_cache;

#[tokio::test]
async fn redis_disabled_gives_local_only() {
    let stack = create_cache(&RedisConfig::default(), &CacheConfig::default())
        .await
        .unwrap();

    assert_eq!(stack.cache.tier_names(), vec!["local"]);
    assert_eq!(stack.cache.write_policy(), WritePolicy::BestEffort);
}

#[tokio::test]
async fn unreachable_redis_falls_back_to_local() {
    let redis = RedisConfig {
        enabled: true,
        url: "redis://127.0.0.1:1".to_string(),
        timeout_ms: 200,
        ..Default::default()
    };
    let cache = CacheConfig {
        promotion: PromotionMode::Inherit,
        promotion_ttl_secs: 45,
        write_policy: WritePolicyMode::Strict,
        ..Default::default()
    };

    let stack = create_cache(&redis, &cache).await.unwrap();

    assert_eq!(stack.cache.tier_count(), 1);
    assert_eq!(
        stack.cache.promotion_ttl(),
        PromotionTtl::Inherit {
            fallback: Duration::from_secs(45)
        }
    );
    assert_eq!(stack.cache.write_policy(), WritePolicy::Strict);
}

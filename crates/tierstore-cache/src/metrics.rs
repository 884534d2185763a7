//! Cache metrics emitted through the `metrics` facade.
//!
//! Nothing is recorded unless the embedding process installs a recorder
//! (e.g. a Prometheus exporter).

use metrics::counter;

/// Metric names as constants for consistency.
pub mod names {
    pub const CACHE_HITS_TOTAL: &str = "cache_hits_total";
    pub const CACHE_MISSES_TOTAL: &str = "cache_misses_total";
    pub const CACHE_PROMOTIONS_TOTAL: &str = "cache_promotions_total";
    pub const CACHE_TIER_ERRORS_TOTAL: &str = "cache_tier_errors_total";
}

/// Record a cache hit on the named tier.
pub fn record_cache_hit(tier: &str) {
    counter!(names::CACHE_HITS_TOTAL, "tier" => tier.to_owned()).increment(1);
}

/// Record a miss across all tiers.
pub fn record_cache_miss() {
    counter!(names::CACHE_MISSES_TOTAL).increment(1);
}

/// Record a promotion of a value found on the named tier.
pub fn record_promotion(source_tier: &str) {
    counter!(names::CACHE_PROMOTIONS_TOTAL, "source" => source_tier.to_owned()).increment(1);
}

/// Record a failed tier operation (`op` is `get`, `set` or `delete`).
pub fn record_tier_error(tier: &str, op: &'static str) {
    counter!(
        names::CACHE_TIER_ERRORS_TOTAL,
        "tier" => tier.to_owned(),
        "op" => op
    )
    .increment(1);
}

//! Cache error types.
//!
//! A cache miss is never an error: tiers report it as `Ok(None)`. Errors are
//! reserved for tier failures, which the coordinator treats as soft.

/// Errors that can occur during cache operations.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    /// The Redis server returned an error or the connection broke mid-command.
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    /// No connection could be checked out of the Redis pool.
    #[error("Redis pool error: {0}")]
    Pool(#[from] deadpool_redis::PoolError),

    /// The call context deadline passed before the tier answered.
    #[error("Deadline exceeded")]
    DeadlineExceeded,

    /// The call context was cancelled before the tier answered.
    #[error("Operation cancelled")]
    Cancelled,

    /// A strict multi-tier write failed on at least one tier.
    #[error("Write failed on tier(s): {}", .failed.join(", "))]
    PartialWrite {
        /// Names of the tiers whose write failed.
        failed: Vec<String>,
    },

    /// The cache was configured incorrectly.
    #[error("Invalid cache configuration: {0}")]
    Config(String),
}

impl CacheError {
    /// Creates a new `PartialWrite` error.
    #[must_use]
    pub fn partial_write(failed: Vec<String>) -> Self {
        Self::PartialWrite { failed }
    }

    /// Creates a new `Config` error.
    #[must_use]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Returns `true` if the call was aborted by its context (deadline or cancellation).
    #[must_use]
    pub fn is_aborted(&self) -> bool {
        matches!(self, Self::DeadlineExceeded | Self::Cancelled)
    }
}

/// Type alias for a cache result.
pub type CacheResult<T> = Result<T, CacheError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = CacheError::partial_write(vec!["redis".into(), "memcached".into()]);
        assert_eq!(err.to_string(), "Write failed on tier(s): redis, memcached");

        assert_eq!(CacheError::DeadlineExceeded.to_string(), "Deadline exceeded");
        assert_eq!(
            CacheError::config("no tiers").to_string(),
            "Invalid cache configuration: no tiers"
        );
    }

    #[test]
    fn test_is_aborted() {
        assert!(CacheError::DeadlineExceeded.is_aborted());
        assert!(CacheError::Cancelled.is_aborted());
        assert!(!CacheError::partial_write(vec![]).is_aborted());
    }
}

//! Per-call context carrying a deadline and a cancellation token.
//!
//! The context is created by whoever calls the cache (usually a request
//! handler) and passed unchanged through the coordinator into every tier.
//! Tiers that do I/O wrap their round trip in [`CacheContext::run`]; purely
//! in-memory tiers may ignore it.

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::error::{CacheError, CacheResult};

/// Deadline and cancellation for a single cache call.
///
/// The default context has neither, so calls run until the tier answers.
#[derive(Debug, Clone, Default)]
pub struct CacheContext {
    deadline: Option<Instant>,
    cancel: Option<CancellationToken>,
}

impl CacheContext {
    /// A context with no deadline and no cancellation.
    pub fn background() -> Self {
        Self::default()
    }

    /// A context whose deadline is `timeout` from now.
    pub fn with_timeout(timeout: Duration) -> Self {
        Self::background().deadline_at(Instant::now() + timeout)
    }

    /// Sets an absolute deadline.
    #[must_use]
    pub fn deadline_at(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Attaches a cancellation token.
    #[must_use]
    pub fn cancelled_by(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// Time left before the deadline, `None` when there is no deadline.
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|d| d.saturating_duration_since(Instant::now()))
    }

    /// Returns `true` if the deadline has passed or the token was cancelled.
    pub fn is_done(&self) -> bool {
        let expired = self.deadline.is_some_and(|d| Instant::now() >= d);
        let cancelled = self.cancel.as_ref().is_some_and(|t| t.is_cancelled());
        expired || cancelled
    }

    /// Drives `fut` to completion unless the context ends first.
    ///
    /// Cancellation wins over the deadline, and both win over a future that
    /// is ready at the same poll, so an already-ended context never starts
    /// the round trip.
    pub async fn run<F, T>(&self, fut: F) -> CacheResult<T>
    where
        F: Future<Output = CacheResult<T>>,
    {
        let cancelled = async {
            match &self.cancel {
                Some(token) => token.cancelled().await,
                None => std::future::pending().await,
            }
        };
        let expired = async {
            match self.deadline {
                Some(deadline) => tokio::time::sleep_until(deadline).await,
                None => std::future::pending().await,
            }
        };

        tokio::select! {
            biased;
            _ = cancelled => Err(CacheError::Cancelled),
            _ = expired => Err(CacheError::DeadlineExceeded),
            result = fut => result,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_run_completes_before_deadline() {
        let ctx = CacheContext::with_timeout(Duration::from_secs(1));
        let result = ctx.run(async { Ok::<_, CacheError>(7) }).await;
        assert_eq!(result.unwrap(), 7);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_times_out() {
        let ctx = CacheContext::with_timeout(Duration::from_millis(50));
        let result = ctx
            .run(async {
                tokio::time::sleep(Duration::from_secs(10)).await;
                Ok::<_, CacheError>(())
            })
            .await;
        assert!(matches!(result, Err(CacheError::DeadlineExceeded)));
    }

    #[tokio::test]
    async fn test_run_cancelled() {
        let token = CancellationToken::new();
        let ctx = CacheContext::background().cancelled_by(token.clone());
        token.cancel();

        assert!(ctx.is_done());
        let result = ctx.run(async { Ok::<_, CacheError>(()) }).await;
        assert!(matches!(result, Err(CacheError::Cancelled)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_remaining() {
        let ctx = CacheContext::with_timeout(Duration::from_secs(2));
        tokio::time::advance(Duration::from_millis(500)).await;
        assert_eq!(ctx.remaining(), Some(Duration::from_millis(1500)));

        tokio::time::advance(Duration::from_secs(5)).await;
        assert_eq!(ctx.remaining(), Some(Duration::ZERO));
        assert!(ctx.is_done());

        assert_eq!(CacheContext::background().remaining(), None);
        assert!(!CacheContext::background().is_done());
    }
}

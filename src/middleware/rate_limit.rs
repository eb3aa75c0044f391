//! Sliding-window rate limiter.
//!
//! Keeps a per-user list of recent invocation timestamps in a TTL-capable
//! counter store. Denial is a silent drop: no reply, a debug log only.

use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use futures::future::BoxFuture;
use tracing::{debug, warn};

/// Storage boundary for the limiter: an atomic prune + check + record per
/// key with the key's TTL refreshed to the window on every record.
pub trait CounterStore: Send + Sync {
    /// Prune entries older than `window`, then either record a new entry and
    /// return true (allowed), or - if `limit` entries remain - record
    /// nothing and return false (denied).
    fn check_and_record(
        &self,
        key: u64,
        limit: usize,
        window: Duration,
    ) -> BoxFuture<'_, anyhow::Result<bool>>;
}

/// In-process counter store: a map of pruned timestamp lists.
///
/// Each key holds at most `limit` timestamps; stale keys are swept when the
/// map grows past its capacity bound, so the store stays TTL-shaped without
/// a background task.
pub struct MemoryCounterStore {
    entries: DashMap<u64, Vec<Instant>>,
    max_keys: usize,
}

impl MemoryCounterStore {
    pub fn new() -> Self {
        Self::with_capacity(50_000)
    }

    pub fn with_capacity(max_keys: usize) -> Self {
        Self {
            entries: DashMap::new(),
            max_keys,
        }
    }

    fn sweep(&self, window: Duration) {
        let now = Instant::now();
        self.entries
            .retain(|_, stamps| stamps.iter().any(|t| now.duration_since(*t) < window));
    }
}

impl Default for MemoryCounterStore {
    fn default() -> Self {
        Self::new()
    }
}

impl CounterStore for MemoryCounterStore {
    fn check_and_record(
        &self,
        key: u64,
        limit: usize,
        window: Duration,
    ) -> BoxFuture<'_, anyhow::Result<bool>> {
        let allowed = {
            let now = Instant::now();
            let mut entry = self.entries.entry(key).or_default();
            entry.retain(|t| now.duration_since(*t) < window);

            if entry.len() >= limit {
                false
            } else {
                entry.push(now);
                entry.truncate(limit);
                true
            }
        };

        if self.entries.len() > self.max_keys {
            self.sweep(window);
        }

        Box::pin(async move { Ok(allowed) })
    }
}

/// The limiter the dispatch pipeline runs before anything else.
#[derive(Clone)]
pub struct RateLimiter {
    store: Arc<dyn CounterStore>,
    limit: usize,
    window: Duration,
}

impl RateLimiter {
    /// Default command budget: 40 invocations per 60 seconds per user.
    pub fn new(store: Arc<dyn CounterStore>) -> Self {
        Self::with_limits(store, 40, Duration::from_secs(60))
    }

    pub fn with_limits(store: Arc<dyn CounterStore>, limit: usize, window: Duration) -> Self {
        Self {
            store,
            limit,
            window,
        }
    }

    /// Is this invocation within `limit` per `window` for the user?
    ///
    /// A store failure fails closed and denies.
    pub async fn allow(&self, user_id: u64, limit: usize, window: Duration) -> bool {
        match self.store.check_and_record(user_id, limit, window).await {
            Ok(true) => true,
            Ok(false) => {
                debug!(
                    "Rate limit exceeded for user {}: allowed {} in {}s",
                    user_id,
                    limit,
                    window.as_secs()
                );
                false
            }
            Err(e) => {
                warn!("Counter store unavailable, denying user {}: {}", user_id, e);
                false
            }
        }
    }

    /// `allow` with the limiter's configured budget.
    pub async fn check(&self, user_id: u64) -> bool {
        self.allow(user_id, self.limit, self.window).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct BrokenStore;

    impl CounterStore for BrokenStore {
        fn check_and_record(
            &self,
            _key: u64,
            _limit: usize,
            _window: Duration,
        ) -> BoxFuture<'_, anyhow::Result<bool>> {
            Box::pin(async { Err(anyhow::anyhow!("store down")) })
        }
    }

    #[tokio::test]
    async fn test_limit_then_deny() {
        let limiter = RateLimiter::new(Arc::new(MemoryCounterStore::new()));
        let window = Duration::from_secs(60);

        for _ in 0..5 {
            assert!(limiter.allow(1, 5, window).await);
        }
        // The limit+1-th call inside the window is denied.
        assert!(!limiter.allow(1, 5, window).await);
        // Other users are unaffected.
        assert!(limiter.allow(2, 5, window).await);
    }

    #[tokio::test]
    async fn test_window_expiry_allows_again() {
        let limiter = RateLimiter::new(Arc::new(MemoryCounterStore::new()));
        let window = Duration::from_millis(40);

        for _ in 0..3 {
            assert!(limiter.allow(1, 3, window).await);
        }
        assert!(!limiter.allow(1, 3, window).await);

        tokio::time::sleep(Duration::from_millis(60)).await;
        assert!(limiter.allow(1, 3, window).await);
    }

    #[tokio::test]
    async fn test_store_failure_fails_closed() {
        let limiter = RateLimiter::new(Arc::new(BrokenStore));
        assert!(!limiter.check(1).await);
    }
}

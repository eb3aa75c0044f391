//! Named one-shot timers with cancellation.
//!
//! Raid auto-disable and verification deadlines are deferred work that must
//! be cancellable (re-enabling a raid replaces the previous timer) and must
//! re-check current state when they fire, since the world can change over a
//! 120-second or multi-hour delay. The re-checking is the callback's job;
//! this table owns scheduling, replacement and cancellation.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tracing::debug;

struct TimerEntry {
    generation: u64,
    handle: tokio::task::AbortHandle,
}

/// Table of named one-shot timers. Scheduling under an existing key cancels
/// the previous timer, so at most one timer per key is ever pending.
#[derive(Clone)]
pub struct Timers {
    entries: Arc<DashMap<String, TimerEntry>>,
    generation: Arc<AtomicU64>,
}

impl Timers {
    pub fn new() -> Self {
        Self {
            entries: Arc::new(DashMap::new()),
            generation: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Schedule `task` to run after `delay`, cancelling any timer already
    /// pending under the same key.
    pub fn schedule<F>(&self, key: impl Into<String>, delay: Duration, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let key = key.into();
        let generation = self.generation.fetch_add(1, Ordering::Relaxed) + 1;
        let entries = Arc::clone(&self.entries);

        let task_key = key.clone();
        let join = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            // Unregister before running so the callback can schedule a
            // replacement under the same key.
            let still_current = entries
                .remove_if(&task_key, |_, entry| entry.generation == generation)
                .is_some();
            if still_current {
                task.await;
            }
        });

        if let Some(previous) = self.entries.insert(
            key.clone(),
            TimerEntry {
                generation,
                handle: join.abort_handle(),
            },
        ) {
            previous.handle.abort();
            debug!("Replaced pending timer '{}'", key);
        }
    }

    /// Cancel the timer pending under `key`. Returns true if one existed.
    pub fn cancel(&self, key: &str) -> bool {
        match self.entries.remove(key) {
            Some((_, entry)) => {
                entry.handle.abort();
                debug!("Cancelled timer '{}'", key);
                true
            }
            None => false,
        }
    }

    /// Whether a timer is currently pending under `key`.
    pub fn is_pending(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }
}

impl Default for Timers {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicU32;

    #[tokio::test]
    async fn test_timer_fires_once() {
        let timers = Timers::new();
        let fired = Arc::new(AtomicU32::new(0));

        let f = Arc::clone(&fired);
        timers.schedule("t", Duration::from_millis(10), async move {
            f.fetch_add(1, Ordering::SeqCst);
        });

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert!(!timers.is_pending("t"));
    }

    #[tokio::test]
    async fn test_reschedule_replaces_previous() {
        let timers = Timers::new();
        let fired = Arc::new(AtomicU32::new(0));

        let f1 = Arc::clone(&fired);
        timers.schedule("raid:1", Duration::from_millis(30), async move {
            f1.fetch_add(1, Ordering::SeqCst);
        });
        let f2 = Arc::clone(&fired);
        timers.schedule("raid:1", Duration::from_millis(10), async move {
            f2.fetch_add(1, Ordering::SeqCst);
        });

        tokio::time::sleep(Duration::from_millis(80)).await;
        // Only the replacement fired; the first was cancelled.
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_cancel_prevents_firing() {
        let timers = Timers::new();
        let fired = Arc::new(AtomicU32::new(0));

        let f = Arc::clone(&fired);
        timers.schedule("t", Duration::from_millis(10), async move {
            f.fetch_add(1, Ordering::SeqCst);
        });
        assert!(timers.cancel("t"));

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);
        assert!(!timers.cancel("t"));
    }
}

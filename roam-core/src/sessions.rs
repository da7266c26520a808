//! Keyed async locks.
//!
//! Two uses in the pipeline, same primitive:
//! - one registry serializes turns per session id, so the read-modify-write
//!   on session state never interleaves for a single session;
//! - one registry single-flights cache misses per cache key, so concurrent
//!   misses on the same coordinate don't both hit the provider.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// A map of independent async mutexes, one per key.
///
/// Locks for different keys never contend. Entries stay in the map for the
/// life of the process; keys are session ids and rounded coordinates, both
/// low-cardinality.
#[derive(Default)]
pub struct KeyedLocks {
    inner: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl KeyedLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire the lock for `key`, waiting if another holder has it.
    pub async fn acquire(&self, key: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut map = self.inner.lock().await;
            map.entry(key.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .clone()
        };
        lock.lock_owned().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn same_key_serializes() {
        let locks = Arc::new(KeyedLocks::new());
        let running = Arc::new(AtomicUsize::new(0));
        let max_seen = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let locks = locks.clone();
            let running = running.clone();
            let max_seen = max_seen.clone();
            handles.push(tokio::spawn(async move {
                let _guard = locks.acquire("session-1").await;
                let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                max_seen.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(5)).await;
                running.fetch_sub(1, Ordering::SeqCst);
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(max_seen.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn different_keys_run_in_parallel() {
        let locks = Arc::new(KeyedLocks::new());

        let guard_a = locks.acquire("a").await;
        // A second key must not block even while "a" is held.
        let acquired_b =
            tokio::time::timeout(Duration::from_millis(50), locks.acquire("b")).await;
        assert!(acquired_b.is_ok());
        drop(guard_a);
    }

    #[tokio::test]
    async fn released_lock_can_be_reacquired() {
        let locks = KeyedLocks::new();
        drop(locks.acquire("k").await);
        let reacquired =
            tokio::time::timeout(Duration::from_millis(50), locks.acquire("k")).await;
        assert!(reacquired.is_ok());
    }
}

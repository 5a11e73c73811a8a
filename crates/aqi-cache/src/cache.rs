//! Generic TTL cache with single-flight coalescing.
//!
//! Single-flight is implemented on top of [`tokio::sync::OnceCell`]: all
//! concurrent callers for a missing key race to insert the same
//! `Arc<OnceCell<_>>` into the in-flight map, then every caller — including
//! the one that inserted it — awaits `get_or_try_init` on that shared
//! cell. The first caller runs the compute future; every other caller
//! simply waits on the same result. This gives "at most one concurrent
//! producer per key" without a coarse lock around the whole map.

use dashmap::DashMap;
use std::future::Future;
use std::hash::Hash;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::OnceCell;

#[derive(Debug, Clone)]
pub struct CacheEntry<V> {
    pub value: V,
    pub inserted_at: Instant,
}

type Inflight<V, E> = Arc<OnceCell<Result<V, E>>>;

pub struct Cache<K, V, E> {
    ttl: Duration,
    entries: DashMap<K, CacheEntry<V>>,
    inflight: DashMap<K, Inflight<V, E>>,
}

impl<K, V, E> Cache<K, V, E>
where
    K: Eq + Hash + Clone,
    V: Clone,
    E: Clone,
{
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: DashMap::new(),
            inflight: DashMap::new(),
        }
    }

    /// Returns a value only if present and not expired. Never triggers a
    /// fetch.
    pub fn get(&self, key: &K) -> Option<V> {
        let entry = self.entries.get(key)?;
        if entry.inserted_at.elapsed() > self.ttl {
            drop(entry);
            self.entries.remove(key);
            return None;
        }
        Some(entry.value.clone())
    }

    /// Returns the cached value if fresh, otherwise runs `compute` with
    /// single-flight coalescing: a second caller for the same key while a
    /// compute is already in flight waits on that compute's result rather
    /// than starting a parallel fetch.
    ///
    /// Errors are never negative-cached — only `Ok` results are inserted.
    /// The deterministic mock fallback is itself a valid `Ok` value (the
    /// `ErrFallbackMock` marker travels as a flag on the payload, not as an
    /// `Err`), so a successful mock fetch is cached exactly like a live one.
    pub async fn get_or_compute<F, Fut>(&self, key: K, compute: F) -> Result<V, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>>,
    {
        if let Some(value) = self.get(&key) {
            return Ok(value);
        }

        let slot = self
            .inflight
            .entry(key.clone())
            .or_insert_with(|| Arc::new(OnceCell::new()))
            .clone();

        let result = slot
            .get_or_init(|| async { compute().await })
            .await
            .clone();

        // Only the caller that actually ran the init races to clean up;
        // losing races are harmless no-ops since inflight is keyed and
        // re-inserted fresh on the next miss.
        self.inflight.remove_if(&key, |_, v| Arc::ptr_eq(v, &slot));

        if let Ok(value) = &result {
            self.entries.insert(
                key,
                CacheEntry {
                    value: value.clone(),
                    inserted_at: Instant::now(),
                },
            );
        }

        result
    }

    /// Removes expired entries. Safe to call periodically (scheduler tick)
    /// or lazily on access.
    pub fn sweep(&self) {
        let ttl = self.ttl;
        self.entries.retain(|_, entry| entry.inserted_at.elapsed() <= ttl);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration as StdDuration;

    #[derive(Debug, Clone, PartialEq)]
    struct TestError(String);

    #[tokio::test]
    async fn single_flight_coalesces_concurrent_misses() {
        let cache: Arc<Cache<&'static str, i32, TestError>> =
            Arc::new(Cache::new(StdDuration::from_secs(60)));
        let calls = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..16 {
            let cache = cache.clone();
            let calls = calls.clone();
            handles.push(tokio::spawn(async move {
                cache
                    .get_or_compute("k", || {
                        let calls = calls.clone();
                        async move {
                            calls.fetch_add(1, Ordering::SeqCst);
                            tokio::time::sleep(StdDuration::from_millis(20)).await;
                            Ok::<i32, TestError>(42)
                        }
                    })
                    .await
            }));
        }

        for h in handles {
            assert_eq!(h.await.unwrap(), Ok(42));
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn expired_entries_are_recomputed() {
        let cache: Cache<&'static str, i32, TestError> = Cache::new(StdDuration::from_millis(10));
        let calls = Arc::new(AtomicUsize::new(0));

        let compute = |calls: Arc<AtomicUsize>| async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok::<i32, TestError>(7)
        };

        cache.get_or_compute("k", || compute(calls.clone())).await.unwrap();
        tokio::time::sleep(StdDuration::from_millis(25)).await;
        cache.get_or_compute("k", || compute(calls.clone())).await.unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn sweep_removes_expired() {
        let cache: Cache<&'static str, i32, TestError> = Cache::new(StdDuration::from_millis(5));
        cache
            .get_or_compute("k", || async { Ok::<i32, TestError>(1) })
            .await
            .unwrap();
        assert_eq!(cache.len(), 1);
        tokio::time::sleep(StdDuration::from_millis(15)).await;
        cache.sweep();
        assert_eq!(cache.len(), 0);
    }

    #[tokio::test]
    async fn errors_are_not_cached() {
        let cache: Cache<&'static str, i32, TestError> = Cache::new(StdDuration::from_secs(60));
        let calls = Arc::new(AtomicUsize::new(0));
        for _ in 0..2 {
            let calls = calls.clone();
            let _ = cache
                .get_or_compute("k", || async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Err::<i32, TestError>(TestError("boom".to_string()))
                })
                .await;
        }
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}

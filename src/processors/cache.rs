//! Single-flight memoization of pipeline results.
//!
//! Each key owns a slot guarded by its own mutex. The first caller for a key
//! runs the computation while holding the slot; concurrent callers for the
//! same key block on that slot and then read the stored result, so a key is
//! computed at most once until it is invalidated. Callers with different keys
//! never wait on each other.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Identifies one cached computation (content hash plus configuration).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CacheKey(u64);

impl From<u64> for CacheKey {
    fn from(value: u64) -> Self {
        CacheKey(value)
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

type Slot<V, E> = Arc<Mutex<Option<Result<Arc<V>, E>>>>;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Memoizes one result (value or error) per key.
pub struct SingleFlightCache<V, E> {
    slots: Mutex<HashMap<CacheKey, Slot<V, E>>>,
}

impl<V, E: Clone> SingleFlightCache<V, E> {
    pub fn new() -> Self {
        Self {
            slots: Mutex::new(HashMap::new()),
        }
    }

    /// Return the stored result for `key`, running `compute` if there is none.
    pub fn get_or_compute<F>(&self, key: CacheKey, compute: F) -> Result<Arc<V>, E>
    where
        F: FnOnce() -> Result<V, E>,
    {
        let slot = lock(&self.slots).entry(key).or_default().clone();

        let mut guard = lock(&slot);
        if let Some(result) = guard.as_ref() {
            log::debug!("cache hit for {}", key);
            return result.clone();
        }

        log::debug!("cache miss for {}, computing", key);
        let result = compute().map(Arc::new);
        *guard = Some(result.clone());
        result
    }

    /// Stored result for `key`, if computed. Blocks while it is being computed.
    pub fn get(&self, key: CacheKey) -> Option<Result<Arc<V>, E>> {
        let slot = lock(&self.slots).get(&key).cloned()?;
        let guard = lock(&slot);
        (*guard).clone()
    }

    /// Drop the result for `key`. Returns true if a slot existed.
    pub fn invalidate(&self, key: CacheKey) -> bool {
        lock(&self.slots).remove(&key).is_some()
    }

    pub fn clear(&self) {
        lock(&self.slots).clear();
    }

    /// Number of keys with a slot (computed or in flight).
    pub fn len(&self) -> usize {
        lock(&self.slots).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<V, E: Clone> Default for SingleFlightCache<V, E> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_computes_once_per_key() {
        let cache: SingleFlightCache<u32, String> = SingleFlightCache::new();
        let calls = AtomicUsize::new(0);
        let compute = || {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok(7)
        };

        let a = cache.get_or_compute(CacheKey::from(1), compute).unwrap();
        let b = cache.get_or_compute(CacheKey::from(1), compute).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        cache.get_or_compute(CacheKey::from(2), compute).unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_concurrent_requests_share_one_computation() {
        let cache: SingleFlightCache<u64, String> = SingleFlightCache::new();
        let calls = AtomicUsize::new(0);
        let key = CacheKey::from(42);

        let results: Vec<u64> = thread::scope(|s| {
            let handles: Vec<_> = (0..8)
                .map(|_| {
                    s.spawn(|| {
                        cache
                            .get_or_compute(key, || {
                                calls.fetch_add(1, Ordering::SeqCst);
                                thread::sleep(Duration::from_millis(50));
                                Ok(99)
                            })
                            .map(|v| *v)
                    })
                })
                .collect();
            handles
                .into_iter()
                .map(|h| h.join().unwrap().unwrap())
                .collect()
        });

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(results.iter().all(|&v| v == 99));
    }

    #[test]
    fn test_errors_are_retained() {
        let cache: SingleFlightCache<u32, String> = SingleFlightCache::new();
        let calls = AtomicUsize::new(0);
        let failing = || {
            calls.fetch_add(1, Ordering::SeqCst);
            Err("bad input".to_string())
        };

        assert_eq!(cache.get_or_compute(CacheKey::from(3), failing), Err("bad input".to_string()));
        assert_eq!(cache.get_or_compute(CacheKey::from(3), failing), Err("bad input".to_string()));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_invalidate_and_clear() {
        let cache: SingleFlightCache<u32, String> = SingleFlightCache::new();
        let calls = AtomicUsize::new(0);
        let compute = || {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok(1)
        };
        let key = CacheKey::from(5);

        assert!(cache.get(key).is_none());
        cache.get_or_compute(key, compute).unwrap();
        assert!(cache.get(key).is_some());

        assert!(cache.invalidate(key));
        assert!(!cache.invalidate(key));
        cache.get_or_compute(key, compute).unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);

        cache.clear();
        assert!(cache.is_empty());
    }
}

//! Memoizing identity cache
//!
//! Discovery and execution are separate host calls, yet the host correlates
//! them by object: the case published during discovery must be the very case
//! reported during execution. The cache binds each identifier to one `Arc`
//! for the lifetime of the adapter. Entries are never evicted.

use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError};

type Slot<V> = Arc<OnceLock<Arc<V>>>;

/// Thread-safe key to value memoizer with one factory invocation per key
pub struct IdentityCache<K, V> {
    slots: Mutex<HashMap<K, Slot<V>>>,
}

impl<K, V> IdentityCache<K, V>
where
    K: Eq + Hash,
{
    pub fn new() -> Self {
        Self {
            slots: Mutex::new(HashMap::new()),
        }
    }

    fn slots(&self) -> MutexGuard<'_, HashMap<K, Slot<V>>> {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn slot(&self, key: K) -> Slot<V> {
        Arc::clone(self.slots().entry(key).or_default())
    }

    /// Return the value bound to `key`, building and binding it first if needed.
    ///
    /// `factory` is not called when `key` is already bound. Concurrent callers
    /// with the same unbound key block on a per-key cell; exactly one of them
    /// runs its factory and all observe that value. The map lock is not held
    /// while a factory runs.
    pub fn memoize<F>(&self, key: K, factory: F) -> Arc<V>
    where
        F: FnOnce() -> V,
    {
        let slot = self.slot(key);
        Arc::clone(slot.get_or_init(|| Arc::new(factory())))
    }

    /// Bind each of `values` under `key_fn(value)` as if by its own `memoize` call.
    ///
    /// Existing bindings win. Returns how many values were newly bound.
    pub fn memoize_all<I, F>(&self, values: I, key_fn: F) -> usize
    where
        I: IntoIterator<Item = Arc<V>>,
        F: Fn(&V) -> K,
    {
        let mut bound = 0;
        for value in values {
            let slot = self.slot(key_fn(&value));
            let mut inserted = false;
            slot.get_or_init(|| {
                inserted = true;
                value
            });
            if inserted {
                bound += 1;
            }
        }
        bound
    }

    /// Value bound to `key`, without building one
    pub fn get(&self, key: &K) -> Option<Arc<V>> {
        let slot = self.slots().get(key).map(Arc::clone)?;
        slot.get().map(Arc::clone)
    }

    /// Number of bound keys
    pub fn len(&self) -> usize {
        self.slots().values().filter(|s| s.get().is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<K, V> Default for IdentityCache<K, V>
where
    K: Eq + Hash,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> fmt::Debug for IdentityCache<K, V>
where
    K: Eq + Hash,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IdentityCache")
            .field("len", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Barrier;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_second_factory_not_invoked() {
        let cache: IdentityCache<String, String> = IdentityCache::new();
        let first = cache.memoize("k".to_string(), || "one".to_string());
        let second = cache.memoize("k".to_string(), || panic!("factory must not run"));

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(*second, "one");
    }

    #[test]
    fn test_distinct_keys_get_distinct_values() {
        let cache: IdentityCache<u32, String> = IdentityCache::new();
        let a = cache.memoize(1, || "a".to_string());
        let b = cache.memoize(2, || "a".to_string());

        assert!(!Arc::ptr_eq(&a, &b));
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_concurrent_memoize_runs_factory_once() {
        const THREADS: usize = 16;
        let cache: Arc<IdentityCache<String, usize>> = Arc::new(IdentityCache::new());
        let calls = Arc::new(AtomicUsize::new(0));
        let barrier = Arc::new(Barrier::new(THREADS));

        let handles: Vec<_> = (0..THREADS)
            .map(|i| {
                let cache = Arc::clone(&cache);
                let calls = Arc::clone(&calls);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    cache.memoize("shared".to_string(), || {
                        calls.fetch_add(1, Ordering::SeqCst);
                        thread::sleep(Duration::from_millis(20));
                        i
                    })
                })
            })
            .collect();

        let results: Vec<Arc<usize>> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(results.iter().all(|r| Arc::ptr_eq(r, &results[0])));
    }

    #[test]
    fn test_memoize_all_binds_supplied_objects() {
        let cache: IdentityCache<String, String> = IdentityCache::new();
        let supplied = vec![Arc::new("alpha".to_string()), Arc::new("beta".to_string())];

        let bound = cache.memoize_all(supplied.clone(), |v| v.clone());
        assert_eq!(bound, 2);

        let alpha = cache.memoize("alpha".to_string(), || panic!("already bound"));
        assert!(Arc::ptr_eq(&alpha, &supplied[0]));
    }

    #[test]
    fn test_memoize_all_keeps_existing_binding() {
        let cache: IdentityCache<String, String> = IdentityCache::new();
        let original = cache.memoize("alpha".to_string(), || "alpha".to_string());

        let bound = cache.memoize_all(vec![Arc::new("alpha".to_string())], |v| v.clone());
        assert_eq!(bound, 0);

        let current = cache.get(&"alpha".to_string()).unwrap();
        assert!(Arc::ptr_eq(&current, &original));
    }

    #[test]
    fn test_get_does_not_build() {
        let cache: IdentityCache<String, String> = IdentityCache::new();
        assert!(cache.get(&"missing".to_string()).is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn test_panicking_factory_leaves_key_unbound() {
        let cache: IdentityCache<String, String> = IdentityCache::new();
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            cache.memoize("k".to_string(), || panic!("boom"))
        }));
        assert!(result.is_err());

        let value = cache.memoize("k".to_string(), || "recovered".to_string());
        assert_eq!(*value, "recovered");
    }
}

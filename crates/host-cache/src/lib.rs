//! Cache backend contract for Extension Host.
//!
//! The dispatch layer persists hook discovery results between execution
//! contexts through this interface. A backend only needs atomic single-key
//! get/set/delete semantics; no cross-key transactions are assumed. Readers
//! verify whatever they load, so concurrent writers and readers coordinate
//! through verification rather than locking.
//!
//! [`MemoryCache`] is the in-process reference backend. Hosts that persist
//! across processes provide their own implementation.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use serde_json::Value;

/// A persistent key/value store for cached dispatch state.
///
/// Methods take `&self` so a backend can be shared between contexts behind
/// an [`Rc`]; implementations use interior mutability as needed.
pub trait CacheBackend {
    /// Fetch the entry stored under `key`, if any.
    fn get(&self, key: &str) -> Option<Value>;

    /// Store `value` under `key`, replacing any previous entry.
    fn set(&self, key: &str, value: Value);

    /// Remove the entry under `key`. Removing an absent key is a no-op.
    fn delete(&self, key: &str);
}

impl<B: CacheBackend + ?Sized> CacheBackend for Rc<B> {
    fn get(&self, key: &str) -> Option<Value> {
        (**self).get(key)
    }

    fn set(&self, key: &str, value: Value) {
        (**self).set(key, value)
    }

    fn delete(&self, key: &str) {
        (**self).delete(key)
    }
}

/// In-memory cache backend.
///
/// Lives only as long as the process; useful as the default backend and for
/// simulating cross-context persistence in tests by sharing one instance
/// between several contexts.
#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: RefCell<HashMap<String, Value>>,
}

impl MemoryCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entries.
    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    /// Whether the cache holds no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }

    /// Whether an entry exists under `key`.
    pub fn contains(&self, key: &str) -> bool {
        self.entries.borrow().contains_key(key)
    }
}

impl CacheBackend for MemoryCache {
    fn get(&self, key: &str) -> Option<Value> {
        self.entries.borrow().get(key).cloned()
    }

    fn set(&self, key: &str, value: Value) {
        self.entries.borrow_mut().insert(key.to_string(), value);
    }

    fn delete(&self, key: &str) {
        self.entries.borrow_mut().remove(key);
    }
}

/// A backend that stores nothing.
///
/// Every `get` misses, so callers rebuild from live state on each context.
/// Useful for hosts that want discovery without persistence.
#[derive(Debug, Default)]
pub struct NullCache;

impl NullCache {
    /// Create the no-op backend.
    pub fn new() -> Self {
        Self
    }
}

impl CacheBackend for NullCache {
    fn get(&self, _key: &str) -> Option<Value> {
        None
    }

    fn set(&self, _key: &str, _value: Value) {}

    fn delete(&self, _key: &str) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_memory_cache_set_and_get() {
        let cache = MemoryCache::new();
        cache.set("key", json!({"a": 1}));
        assert_eq!(cache.get("key"), Some(json!({"a": 1})));
    }

    #[test]
    fn test_memory_cache_miss_returns_none() {
        let cache = MemoryCache::new();
        assert_eq!(cache.get("missing"), None);
    }

    #[test]
    fn test_memory_cache_set_replaces() {
        let cache = MemoryCache::new();
        cache.set("key", json!(1));
        cache.set("key", json!(2));
        assert_eq!(cache.get("key"), Some(json!(2)));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_memory_cache_delete() {
        let cache = MemoryCache::new();
        cache.set("key", json!(true));
        cache.delete("key");
        assert_eq!(cache.get("key"), None);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_memory_cache_delete_absent_is_noop() {
        let cache = MemoryCache::new();
        cache.delete("never-set");
        assert!(cache.is_empty());
    }

    #[test]
    fn test_shared_backend_sees_writes() {
        let cache = Rc::new(MemoryCache::new());
        let reader = Rc::clone(&cache);
        cache.set("shared", json!("value"));
        assert_eq!(reader.get("shared"), Some(json!("value")));
    }

    #[test]
    fn test_null_cache_never_stores() {
        let cache = NullCache::new();
        cache.set("key", json!(1));
        assert_eq!(cache.get("key"), None);
    }
}

//! Cache pool traits and usage statistics.
//!
//! [`CacheItemPool`] is the item-based contract; [`SimpleCache`] is the plain
//! key/value surface built on top of it. Every pool gets the simple surface
//! for free through the blanket implementation.

use std::collections::HashMap;

use tablecache_core::{CacheEntry, CacheItem, CacheResult, Ttl, Value};

/// Item-based cache pool.
///
/// # Error policy
///
/// - Invalid keys are rejected with `InvalidArgument` before any store call.
/// - Store failures propagate from reads.
/// - Store failures during writes and deletes are reported as `Ok(false)`.
pub trait CacheItemPool {
    /// A blank (miss) item for `key`, ready to be filled and saved.
    fn new_item(&self, key: &str) -> CacheResult<CacheItem>;

    /// Load one item. Missing records come back as misses.
    fn get_item(&self, key: &str) -> CacheResult<CacheItem>;

    /// Load many items: exactly one item per distinct key.
    fn get_items<K: AsRef<str>>(&self, keys: &[K]) -> CacheResult<Vec<CacheItem>>;

    /// True if `key` currently holds a hit.
    fn has_item(&self, key: &str) -> CacheResult<bool> {
        Ok(self.get_item(key)?.is_hit())
    }

    /// Wiping the whole pool is not supported; always returns `false`.
    fn clear(&self) -> bool;

    /// Delete one item. Returns `true` only if a record existed.
    fn delete_item(&self, key: &str) -> CacheResult<bool>;

    /// Delete many items. Returns `true` if the call completed.
    fn delete_items<K: AsRef<str>>(&self, keys: &[K]) -> CacheResult<bool>;

    /// Persist an item immediately.
    fn save(&self, item: &dyn CacheEntry) -> CacheResult<bool>;

    /// Queue an item for the next [`CacheItemPool::commit`].
    fn save_deferred(&mut self, item: &dyn CacheEntry) -> CacheResult<bool>;

    /// Persist every queued item, keeping the ones that failed.
    fn commit(&mut self) -> CacheResult<bool>;
}

/// Plain key/value surface over a [`CacheItemPool`].
pub trait SimpleCache: CacheItemPool {
    /// The value for `key`, or `default` on a miss.
    fn get(&self, key: &str, default: Value) -> CacheResult<Value> {
        let item = self.get_item(key)?;
        if item.is_hit() {
            item.get()
        } else {
            Ok(default)
        }
    }

    /// Store `value` under `key` with an optional relative expiration.
    fn set(&self, key: &str, value: Value, ttl: impl Into<Ttl>) -> CacheResult<bool> {
        let mut item = self.new_item(key)?;
        item.set(value);
        item.expires_after(ttl)?;
        self.save(&item)
    }

    /// Delete `key`.
    fn delete(&self, key: &str) -> CacheResult<bool> {
        self.delete_item(key)
    }

    /// Values for many keys; misses map to `default`.
    fn get_multiple<K: AsRef<str>>(
        &self,
        keys: &[K],
        default: Value,
    ) -> CacheResult<HashMap<String, Value>> {
        let items = self.get_items(keys)?;
        let mut values = HashMap::with_capacity(items.len());
        for item in items {
            let value = if item.is_hit() {
                item.get()?
            } else {
                default.clone()
            };
            values.insert(item.key().to_string(), value);
        }
        Ok(values)
    }

    /// Store many values through the deferred buffer and commit.
    ///
    /// Anything already queued is committed along with them.
    fn set_multiple<K, I>(&mut self, values: I, ttl: impl Into<Ttl>) -> CacheResult<bool>
    where
        K: AsRef<str>,
        I: IntoIterator<Item = (K, Value)>,
    {
        let ttl = ttl.into();
        for (key, value) in values {
            let mut item = self.new_item(key.as_ref())?;
            item.set(value);
            item.expires_after(ttl)?;
            self.save_deferred(&item)?;
        }
        self.commit()
    }

    /// Delete many keys.
    fn delete_multiple<K: AsRef<str>>(&self, keys: &[K]) -> CacheResult<bool> {
        self.delete_items(keys)
    }

    /// True if `key` currently holds a hit.
    fn has(&self, key: &str) -> CacheResult<bool> {
        self.has_item(key)
    }
}

impl<P: CacheItemPool> SimpleCache for P {}

/// Statistics about cache usage.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Number of loaded items that were hits.
    pub hits: u64,
    /// Number of loaded items that were misses.
    pub misses: u64,
    /// Number of acknowledged writes.
    pub writes: u64,
    /// Number of writes that failed or were not acknowledged.
    pub write_failures: u64,
    /// Number of delete requests that completed.
    pub deletes: u64,
}

impl CacheStats {
    /// Calculate the hit rate (0.0 to 1.0).
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

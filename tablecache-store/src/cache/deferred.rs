//! Buffer of items queued for a later commit.

use std::collections::BTreeMap;

use tablecache_core::{CacheItem, CacheResult};

/// Insertion-ordered buffer of deferred writes.
///
/// Each pushed item gets a monotonically increasing slot. A commit walks the
/// slots in order and drops each entry as soon as its write succeeds, so a
/// failed commit leaves exactly the failed entries behind for the next one.
///
/// The buffer is plain mutable state; sharing it between threads needs
/// external locking.
#[derive(Debug, Default)]
pub struct DeferredBuffer {
    next_slot: u64,
    entries: BTreeMap<u64, CacheItem>,
}

impl DeferredBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue an item and return its slot.
    pub fn push(&mut self, item: CacheItem) -> u64 {
        let slot = self.next_slot;
        self.next_slot += 1;
        self.entries.insert(slot, item);
        slot
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Queued items in insertion order.
    pub fn items(&self) -> impl Iterator<Item = &CacheItem> {
        self.entries.values()
    }

    /// Write every queued item in insertion order.
    ///
    /// `write` returns whether the item was persisted. Persisted entries are
    /// removed immediately; the rest stay queued. Returns `Ok(true)` only if
    /// every entry in this pass was persisted. An error from `write` stops the
    /// pass; entries persisted before it are already gone.
    pub fn commit<F>(&mut self, mut write: F) -> CacheResult<bool>
    where
        F: FnMut(&CacheItem) -> CacheResult<bool>,
    {
        let slots: Vec<u64> = self.entries.keys().copied().collect();
        let mut all_persisted = true;

        for slot in slots {
            let Some(item) = self.entries.get(&slot) else {
                continue;
            };
            if write(item)? {
                self.entries.remove(&slot);
            } else {
                all_persisted = false;
            }
        }

        Ok(all_persisted)
    }
}

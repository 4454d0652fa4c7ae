//! tablecache store - cache pool over a remote key-value table
//!
//! Defines the table client contract the cache talks to, an in-memory table
//! client for tests, and the cache pool itself (see [`cache`]). The network
//! client for the real table lives outside this crate and only has to
//! implement [`TableClient`].

pub mod attribute;
pub mod cache;

pub use attribute::{key_record, primary_key, AttributeValue, Record};

// Re-export cache types for callers wiring a pool
pub use cache::{
    reconcile_batch, BatchOutcome, CacheItemPool, CacheStats, ConverterRegistry,
    DefaultItemConverter, DeferredBuffer, ItemConverter, SimpleCache, TableCache,
    TableCacheBuilder,
};

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, RwLock};

use tablecache_core::{CacheResult, StoreError};

// ============================================================================
// REQUEST / RESPONSE TYPES
// ============================================================================

/// Single-item read by primary key.
#[derive(Debug, Clone, PartialEq)]
pub struct GetItemRequest {
    pub table_name: String,
    pub key: Record,
    pub consistent_read: bool,
}

/// Result of a single-item read. `item` is `None` when no record exists.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GetItemOutput {
    pub item: Option<Record>,
}

/// Batched read by a list of primary keys.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchGetItemRequest {
    pub table_name: String,
    pub keys: Vec<Record>,
}

/// Result of a batched read.
///
/// Records that were served land in `responses`; keys the table declined to
/// serve in this round (for example when throttled) come back in
/// `unprocessed_keys`. Keys in neither set do not exist.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchGetItemOutput {
    pub responses: Vec<Record>,
    pub unprocessed_keys: Vec<Record>,
}

/// Single-item write of a full record.
#[derive(Debug, Clone, PartialEq)]
pub struct PutItemRequest {
    pub table_name: String,
    pub item: Record,
}

/// Single-item delete.
#[derive(Debug, Clone, PartialEq)]
pub struct DeleteItemRequest {
    pub table_name: String,
    pub key: Record,
    /// Ask the table to return the record as it was before the delete.
    pub return_old_values: bool,
}

/// Result of a single-item delete. `attributes` holds the old record when
/// requested and when one existed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DeleteItemOutput {
    pub attributes: Option<Record>,
}

/// One entry of a batched write.
#[derive(Debug, Clone, PartialEq)]
pub enum WriteRequest {
    Put { item: Record },
    Delete { key: Record },
}

/// Batched write (puts and/or deletes) against one table.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchWriteItemRequest {
    pub table_name: String,
    pub requests: Vec<WriteRequest>,
}

/// Result of a batched write; `unprocessed` lists requests the table did not
/// apply in this round.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchWriteItemOutput {
    pub unprocessed: Vec<WriteRequest>,
}

// ============================================================================
// TABLE CLIENT TRAIT
// ============================================================================

/// Client for the remote key-value table.
///
/// Implementations perform one request/response round trip per call and
/// report transport or service failures as [`StoreError`]. Timeouts and
/// retries are the implementation's own business.
pub trait TableClient: Send + Sync {
    /// Read one record.
    fn get_item(&self, request: GetItemRequest) -> CacheResult<GetItemOutput>;

    /// Read many records in one request.
    fn batch_get_item(&self, request: BatchGetItemRequest) -> CacheResult<BatchGetItemOutput>;

    /// Write one record. Returns whether the table acknowledged the write.
    fn put_item(&self, request: PutItemRequest) -> CacheResult<bool>;

    /// Delete one record.
    fn delete_item(&self, request: DeleteItemRequest) -> CacheResult<DeleteItemOutput>;

    /// Apply many writes in one request.
    fn batch_write_item(
        &self,
        request: BatchWriteItemRequest,
    ) -> CacheResult<BatchWriteItemOutput>;
}

// ============================================================================
// MOCK TABLE CLIENT
// ============================================================================

/// Per-operation call counters of a [`MockTableClient`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CallCounts {
    pub get_item: usize,
    pub batch_get_item: usize,
    pub put_item: usize,
    pub delete_item: usize,
    pub batch_write_item: usize,
}

impl CallCounts {
    /// Total number of round trips.
    pub fn total(&self) -> usize {
        self.get_item
            + self.batch_get_item
            + self.put_item
            + self.delete_item
            + self.batch_write_item
    }
}

#[derive(Debug, Default)]
struct Faults {
    throttle_all: bool,
    fail_reads: bool,
    fail_deletes: bool,
    fail_put_keys: HashSet<String>,
    fail_next_puts: usize,
    nack_put_keys: HashSet<String>,
    unprocessed_get_keys: HashSet<String>,
    unprocessed_write_keys: HashSet<String>,
}

#[derive(Debug, Default)]
struct Counters {
    get_item: AtomicUsize,
    batch_get_item: AtomicUsize,
    put_item: AtomicUsize,
    delete_item: AtomicUsize,
    batch_write_item: AtomicUsize,
}

/// In-memory table client for testing.
///
/// Holds a single table keyed by a string primary key and supports fault
/// injection so tests can exercise partial failures.
#[derive(Debug)]
pub struct MockTableClient {
    table_name: String,
    primary_field: String,
    rows: RwLock<BTreeMap<String, Record>>,
    faults: Mutex<Faults>,
    counters: Counters,
}

fn lock_poisoned() -> StoreError {
    StoreError::Unavailable {
        reason: "mock table lock poisoned".to_string(),
    }
}

impl MockTableClient {
    /// Create an empty table.
    pub fn new(table_name: impl Into<String>, primary_field: impl Into<String>) -> Self {
        Self {
            table_name: table_name.into(),
            primary_field: primary_field.into(),
            rows: RwLock::new(BTreeMap::new()),
            faults: Mutex::new(Faults::default()),
            counters: Counters::default(),
        }
    }

    /// Insert a record directly, bypassing counters and faults.
    pub fn insert_record(&self, record: Record) {
        if let Some(key) = primary_key(&record, &self.primary_field) {
            let key = key.to_string();
            self.rows
                .write()
                .unwrap_or_else(|e| e.into_inner())
                .insert(key, record);
        }
    }

    /// Look at a stored record.
    pub fn record(&self, key: &str) -> Option<Record> {
        self.rows
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(key)
            .cloned()
    }

    /// Number of stored records.
    pub fn len(&self) -> usize {
        self.rows.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// True if no records are stored.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of the per-operation call counters.
    pub fn calls(&self) -> CallCounts {
        CallCounts {
            get_item: self.counters.get_item.load(Ordering::Relaxed),
            batch_get_item: self.counters.batch_get_item.load(Ordering::Relaxed),
            put_item: self.counters.put_item.load(Ordering::Relaxed),
            delete_item: self.counters.delete_item.load(Ordering::Relaxed),
            batch_write_item: self.counters.batch_write_item.load(Ordering::Relaxed),
        }
    }

    /// Reject every request with [`StoreError::Throttled`].
    pub fn throttle_all(&self, throttle: bool) {
        self.with_faults(|f| f.throttle_all = throttle);
    }

    /// Make every read fail with [`StoreError::Unavailable`].
    pub fn fail_reads(&self, fail: bool) {
        self.with_faults(|f| f.fail_reads = fail);
    }

    /// Make every delete (single and batched) fail.
    pub fn fail_deletes(&self, fail: bool) {
        self.with_faults(|f| f.fail_deletes = fail);
    }

    /// Make puts for `key` fail until [`MockTableClient::heal`] is called.
    pub fn fail_puts_for(&self, key: impl Into<String>) {
        let key = key.into();
        self.with_faults(|f| {
            f.fail_put_keys.insert(key);
        });
    }

    /// Make the next `n` puts fail regardless of key.
    pub fn fail_next_puts(&self, n: usize) {
        self.with_faults(|f| f.fail_next_puts = n);
    }

    /// Make puts for `key` come back unacknowledged (`false`) without storing.
    pub fn reject_puts_for(&self, key: impl Into<String>) {
        let key = key.into();
        self.with_faults(|f| {
            f.nack_put_keys.insert(key);
        });
    }

    /// Report `key` as unprocessed in batched reads.
    pub fn throttle_batch_get(&self, key: impl Into<String>) {
        let key = key.into();
        self.with_faults(|f| {
            f.unprocessed_get_keys.insert(key);
        });
    }

    /// Report deletes of `key` as unprocessed in batched writes.
    pub fn throttle_batch_write(&self, key: impl Into<String>) {
        let key = key.into();
        self.with_faults(|f| {
            f.unprocessed_write_keys.insert(key);
        });
    }

    /// Clear every injected fault.
    pub fn heal(&self) {
        self.with_faults(|f| *f = Faults::default());
    }

    fn with_faults(&self, apply: impl FnOnce(&mut Faults)) {
        apply(&mut self.faults.lock().unwrap_or_else(|e| e.into_inner()));
    }

    fn check_table(&self, table_name: &str) -> CacheResult<()> {
        if table_name != self.table_name {
            return Err(StoreError::TableNotFound {
                table: table_name.to_string(),
            }
            .into());
        }
        if self.faults.lock().map_err(|_| lock_poisoned())?.throttle_all {
            return Err(StoreError::Throttled {
                table: self.table_name.clone(),
            }
            .into());
        }
        Ok(())
    }

    fn key_of(&self, record: &Record) -> CacheResult<String> {
        primary_key(record, &self.primary_field)
            .map(str::to_string)
            .ok_or_else(|| {
                StoreError::MalformedRecord {
                    key: String::new(),
                    reason: format!("missing string attribute '{}'", self.primary_field),
                }
                .into()
            })
    }

    fn unavailable(op: &str) -> StoreError {
        StoreError::Unavailable {
            reason: format!("injected {op} failure"),
        }
    }
}

impl TableClient for MockTableClient {
    fn get_item(&self, request: GetItemRequest) -> CacheResult<GetItemOutput> {
        self.counters.get_item.fetch_add(1, Ordering::Relaxed);
        self.check_table(&request.table_name)?;
        if self.faults.lock().map_err(|_| lock_poisoned())?.fail_reads {
            return Err(Self::unavailable("read").into());
        }

        let key = self.key_of(&request.key)?;
        let rows = self.rows.read().map_err(|_| lock_poisoned())?;
        Ok(GetItemOutput {
            item: rows.get(&key).cloned(),
        })
    }

    fn batch_get_item(&self, request: BatchGetItemRequest) -> CacheResult<BatchGetItemOutput> {
        self.counters.batch_get_item.fetch_add(1, Ordering::Relaxed);
        self.check_table(&request.table_name)?;
        let faults = self.faults.lock().map_err(|_| lock_poisoned())?;
        if faults.fail_reads {
            return Err(Self::unavailable("read").into());
        }

        let rows = self.rows.read().map_err(|_| lock_poisoned())?;
        let mut output = BatchGetItemOutput::default();
        for key_record in request.keys {
            let key = self.key_of(&key_record)?;
            if faults.unprocessed_get_keys.contains(&key) {
                output.unprocessed_keys.push(key_record);
            } else if let Some(record) = rows.get(&key) {
                output.responses.push(record.clone());
            }
        }
        Ok(output)
    }

    fn put_item(&self, request: PutItemRequest) -> CacheResult<bool> {
        self.counters.put_item.fetch_add(1, Ordering::Relaxed);
        self.check_table(&request.table_name)?;
        let key = self.key_of(&request.item)?;

        let mut faults = self.faults.lock().map_err(|_| lock_poisoned())?;
        if faults.fail_next_puts > 0 {
            faults.fail_next_puts -= 1;
            return Err(Self::unavailable("put").into());
        }
        if faults.fail_put_keys.contains(&key) {
            return Err(Self::unavailable("put").into());
        }
        if faults.nack_put_keys.contains(&key) {
            return Ok(false);
        }
        drop(faults);

        self.rows
            .write()
            .map_err(|_| lock_poisoned())?
            .insert(key, request.item);
        Ok(true)
    }

    fn delete_item(&self, request: DeleteItemRequest) -> CacheResult<DeleteItemOutput> {
        self.counters.delete_item.fetch_add(1, Ordering::Relaxed);
        self.check_table(&request.table_name)?;
        if self.faults.lock().map_err(|_| lock_poisoned())?.fail_deletes {
            return Err(Self::unavailable("delete").into());
        }

        let key = self.key_of(&request.key)?;
        let old = self.rows.write().map_err(|_| lock_poisoned())?.remove(&key);
        Ok(DeleteItemOutput {
            attributes: if request.return_old_values { old } else { None },
        })
    }

    fn batch_write_item(
        &self,
        request: BatchWriteItemRequest,
    ) -> CacheResult<BatchWriteItemOutput> {
        self.counters.batch_write_item.fetch_add(1, Ordering::Relaxed);
        self.check_table(&request.table_name)?;
        let faults = self.faults.lock().map_err(|_| lock_poisoned())?;
        if faults.fail_deletes {
            return Err(Self::unavailable("batch write").into());
        }

        let mut seen = HashSet::new();
        let mut pending: HashMap<String, WriteRequest> = HashMap::new();
        let mut order = Vec::with_capacity(request.requests.len());
        for write in request.requests {
            let key = match &write {
                WriteRequest::Put { item } => self.key_of(item)?,
                WriteRequest::Delete { key } => self.key_of(key)?,
            };
            if !seen.insert(key.clone()) {
                return Err(StoreError::MalformedRecord {
                    key,
                    reason: "duplicate key in batch write".to_string(),
                }
                .into());
            }
            order.push(key.clone());
            pending.insert(key, write);
        }

        let mut rows = self.rows.write().map_err(|_| lock_poisoned())?;
        let mut output = BatchWriteItemOutput::default();
        for key in order {
            let Some(write) = pending.remove(&key) else {
                continue;
            };
            if faults.unprocessed_write_keys.contains(&key) {
                output.unprocessed.push(write);
                continue;
            }
            match write {
                WriteRequest::Put { item } => {
                    rows.insert(key, item);
                }
                WriteRequest::Delete { .. } => {
                    rows.remove(&key);
                }
            }
        }
        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tablecache_core::CacheError;

    fn record(key: &str, value: &str) -> Record {
        let mut r = key_record("id", key);
        r.insert("value".to_string(), AttributeValue::S(value.to_string()));
        r
    }

    fn put(table: &MockTableClient, key: &str, value: &str) -> CacheResult<bool> {
        table.put_item(PutItemRequest {
            table_name: "cache".to_string(),
            item: record(key, value),
        })
    }

    #[test]
    fn test_put_and_get() {
        let table = MockTableClient::new("cache", "id");
        assert!(put(&table, "a", "1").unwrap());

        let out = table
            .get_item(GetItemRequest {
                table_name: "cache".to_string(),
                key: key_record("id", "a"),
                consistent_read: true,
            })
            .unwrap();
        assert_eq!(out.item, Some(record("a", "1")));
        assert_eq!(table.calls().put_item, 1);
        assert_eq!(table.calls().get_item, 1);
        assert_eq!(table.calls().total(), 2);
    }

    #[test]
    fn test_unknown_table() {
        let table = MockTableClient::new("cache", "id");
        let err = table
            .put_item(PutItemRequest {
                table_name: "other".to_string(),
                item: record("a", "1"),
            })
            .unwrap_err();
        assert!(err.is_store());
        assert!(table.is_empty());
    }

    #[test]
    fn test_batch_get_partitions_results() {
        let table = MockTableClient::new("cache", "id");
        table.insert_record(record("a", "1"));
        table.insert_record(record("b", "2"));
        table.throttle_batch_get("b");

        let out = table
            .batch_get_item(BatchGetItemRequest {
                table_name: "cache".to_string(),
                keys: vec![key_record("id", "a"), key_record("id", "b"), key_record("id", "c")],
            })
            .unwrap();
        assert_eq!(out.responses, vec![record("a", "1")]);
        assert_eq!(out.unprocessed_keys, vec![key_record("id", "b")]);
    }

    #[test]
    fn test_delete_returns_old_values() {
        let table = MockTableClient::new("cache", "id");
        table.insert_record(record("a", "1"));

        let request = DeleteItemRequest {
            table_name: "cache".to_string(),
            key: key_record("id", "a"),
            return_old_values: true,
        };
        let first = table.delete_item(request.clone()).unwrap();
        assert_eq!(first.attributes, Some(record("a", "1")));
        let second = table.delete_item(request).unwrap();
        assert_eq!(second.attributes, None);
    }

    #[test]
    fn test_put_faults() {
        let table = MockTableClient::new("cache", "id");
        table.fail_next_puts(1);
        assert!(put(&table, "a", "1").is_err());
        assert!(put(&table, "a", "1").unwrap());

        table.fail_puts_for("b");
        assert!(put(&table, "b", "1").is_err());
        table.reject_puts_for("c");
        assert!(!put(&table, "c", "1").unwrap());
        assert!(table.record("c").is_none());

        table.heal();
        assert!(put(&table, "b", "1").unwrap());
        assert!(put(&table, "c", "1").unwrap());
        assert_eq!(table.len(), 3);
    }

    #[test]
    fn test_batch_write_unprocessed_and_duplicates() {
        let table = MockTableClient::new("cache", "id");
        table.insert_record(record("a", "1"));
        table.insert_record(record("b", "2"));
        table.throttle_batch_write("b");

        let out = table
            .batch_write_item(BatchWriteItemRequest {
                table_name: "cache".to_string(),
                requests: vec![
                    WriteRequest::Delete { key: key_record("id", "a") },
                    WriteRequest::Delete { key: key_record("id", "b") },
                ],
            })
            .unwrap();
        assert_eq!(out.unprocessed.len(), 1);
        assert!(table.record("a").is_none());
        assert!(table.record("b").is_some());

        let err = table
            .batch_write_item(BatchWriteItemRequest {
                table_name: "cache".to_string(),
                requests: vec![
                    WriteRequest::Delete { key: key_record("id", "b") },
                    WriteRequest::Delete { key: key_record("id", "b") },
                ],
            })
            .unwrap_err();
        assert!(err.is_store());
    }

    #[test]
    fn test_read_failures() {
        let table = MockTableClient::new("cache", "id");
        table.fail_reads(true);
        let err = table
            .get_item(GetItemRequest {
                table_name: "cache".to_string(),
                key: key_record("id", "a"),
                consistent_read: true,
            })
            .unwrap_err();
        assert!(err.is_store());
    }

    #[test]
    fn test_throttle_all_rejects_every_request() {
        let table = MockTableClient::new("cache", "id");
        table.insert_record(record("a", "1"));
        table.throttle_all(true);

        let err = put(&table, "b", "2").unwrap_err();
        assert_eq!(
            err,
            CacheError::Store(StoreError::Throttled {
                table: "cache".to_string(),
            })
        );
        let err = table
            .batch_get_item(BatchGetItemRequest {
                table_name: "cache".to_string(),
                keys: vec![key_record("id", "a")],
            })
            .unwrap_err();
        assert!(matches!(err, CacheError::Store(StoreError::Throttled { .. })));
        assert!(table.record("b").is_none());

        table.heal();
        assert!(put(&table, "b", "2").unwrap());
    }
}

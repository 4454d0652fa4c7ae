//! Cache pool backed by a remote key-value table.
//!
//! Each record is one row with three columns: primary key, encoded value and
//! an optional TTL (Unix seconds). The table's own TTL mechanism handles
//! eviction; this layer only interprets the TTL column when deciding hit or
//! miss. Every read is a round trip, nothing is cached locally.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tablecache_core::{
    validate_key, CacheEntry, CacheError, CacheItem, CacheResult, Clock, JsonCodec, StoreError,
    SystemClock, TableCacheConfig, ValueCodec,
};
use tracing::{debug, warn};

use super::converter::ConverterRegistry;
use super::deferred::DeferredBuffer;
use super::reconcile::{reconcile_batch, BatchOutcome};
use super::traits::{CacheItemPool, CacheStats};
use crate::attribute::{key_record, primary_key, AttributeValue, Record};
use crate::{
    BatchGetItemRequest, BatchWriteItemRequest, DeleteItemRequest, GetItemRequest,
    PutItemRequest, TableClient, WriteRequest,
};

#[derive(Debug, Default)]
struct StatsCounters {
    hits: AtomicU64,
    misses: AtomicU64,
    writes: AtomicU64,
    write_failures: AtomicU64,
    deletes: AtomicU64,
}

impl StatsCounters {
    fn record_load(&self, item: &CacheItem) {
        if item.is_hit() {
            self.hits.fetch_add(1, Ordering::Relaxed);
        } else {
            self.misses.fetch_add(1, Ordering::Relaxed);
        }
    }

    fn record_write(&self, acknowledged: bool) {
        if acknowledged {
            self.writes.fetch_add(1, Ordering::Relaxed);
        } else {
            self.write_failures.fetch_add(1, Ordering::Relaxed);
        }
    }

    fn snapshot(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            writes: self.writes.load(Ordering::Relaxed),
            write_failures: self.write_failures.load(Ordering::Relaxed),
            deletes: self.deletes.load(Ordering::Relaxed),
        }
    }
}

/// Builder for [`TableCache`].
///
/// Defaults: [`JsonCodec`], [`SystemClock`] and a converter registry holding
/// a default converter bound to the chosen codec and clock.
pub struct TableCacheBuilder<C: TableClient> {
    client: Arc<C>,
    config: TableCacheConfig,
    codec: Arc<dyn ValueCodec>,
    clock: Arc<dyn Clock>,
    converters: Option<ConverterRegistry>,
}

impl<C: TableClient> TableCacheBuilder<C> {
    /// Use a different value codec.
    pub fn with_codec(mut self, codec: Arc<dyn ValueCodec>) -> Self {
        self.codec = codec;
        self
    }

    /// Use a different clock for expiration checks.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Use a custom converter registry.
    pub fn with_converters(mut self, converters: ConverterRegistry) -> Self {
        self.converters = Some(converters);
        self
    }

    /// Validate the configuration and build the cache.
    pub fn build(self) -> CacheResult<TableCache<C>> {
        self.config.validate()?;
        let converters = self.converters.unwrap_or_else(|| {
            ConverterRegistry::with_default(Arc::clone(&self.codec), Arc::clone(&self.clock))
        });
        Ok(TableCache {
            client: self.client,
            config: self.config,
            codec: self.codec,
            clock: self.clock,
            converters,
            deferred: DeferredBuffer::new(),
            stats: StatsCounters::default(),
        })
    }
}

/// Cache pool over a remote key-value table.
///
/// # Example
///
/// ```ignore
/// let cache = TableCache::new(client, TableCacheConfig::new("cache"))?;
///
/// let mut item = cache.new_item("user.42")?;
/// item.set(json!({"name": "a"}));
/// item.expires_after(Duration::from_secs(60))?;
/// cache.save(&item)?;
///
/// assert!(cache.get_item("user.42")?.is_hit());
/// ```
pub struct TableCache<C: TableClient> {
    client: Arc<C>,
    config: TableCacheConfig,
    codec: Arc<dyn ValueCodec>,
    clock: Arc<dyn Clock>,
    converters: ConverterRegistry,
    deferred: DeferredBuffer,
    stats: StatsCounters,
}

impl<C: TableClient> TableCache<C> {
    /// Create a cache with the default codec, clock and converters.
    pub fn new(client: Arc<C>, config: TableCacheConfig) -> CacheResult<Self> {
        Self::builder(client, config).build()
    }

    /// Start building a cache.
    pub fn builder(client: Arc<C>, config: TableCacheConfig) -> TableCacheBuilder<C> {
        TableCacheBuilder {
            client,
            config,
            codec: Arc::new(JsonCodec),
            clock: Arc::new(SystemClock),
            converters: None,
        }
    }

    pub fn config(&self) -> &TableCacheConfig {
        &self.config
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    /// Number of items waiting for the next commit.
    pub fn deferred_len(&self) -> usize {
        self.deferred.len()
    }

    /// Snapshot of usage counters.
    pub fn stats(&self) -> CacheStats {
        self.stats.snapshot()
    }

    /// Delete the record behind an item taken from any cache.
    pub fn delete_entry(&self, entry: &dyn CacheEntry) -> CacheResult<bool> {
        self.delete_item(entry.key())
    }

    /// Validate a caller key and turn it into the key stored in the table.
    fn table_key(&self, key: &str) -> CacheResult<String> {
        validate_key(key)?;
        Ok(self.config.prefixed(key))
    }

    /// Validate and prefix every key, dropping duplicates.
    fn table_keys<K: AsRef<str>>(&self, keys: &[K]) -> CacheResult<Vec<String>> {
        let mut seen = HashSet::with_capacity(keys.len());
        let mut table_keys = Vec::with_capacity(keys.len());
        for key in keys {
            let table_key = self.table_key(key.as_ref())?;
            if seen.insert(table_key.clone()) {
                table_keys.push(table_key);
            }
        }
        Ok(table_keys)
    }

    fn ttl_from(&self, table_key: &str, record: &Record) -> CacheResult<Option<DateTime<Utc>>> {
        let Some(raw) = record.get(&self.config.ttl_field).and_then(AttributeValue::as_n) else {
            return Ok(None);
        };
        let malformed = |reason: String| StoreError::MalformedRecord {
            key: table_key.to_string(),
            reason,
        };
        let secs = match raw.parse::<i64>() {
            Ok(secs) => secs,
            Err(_) => raw
                .parse::<f64>()
                .map(|secs| secs.trunc() as i64)
                .map_err(|e| malformed(format!("ttl '{raw}' is not a number: {e}")))?,
        };
        DateTime::from_timestamp(secs, 0)
            .map(Some)
            .ok_or_else(|| malformed(format!("ttl {secs} is out of range")).into())
    }

    fn value_from(&self, table_key: &str, record: &Record) -> CacheResult<Option<String>> {
        let raw = match record.get(&self.config.value_field) {
            Some(AttributeValue::S(s)) => s.clone(),
            Some(AttributeValue::B(bytes)) => {
                String::from_utf8(bytes.clone()).map_err(|e| StoreError::MalformedRecord {
                    key: table_key.to_string(),
                    reason: format!("value is not valid UTF-8: {e}"),
                })?
            }
            _ => return Ok(None),
        };
        Ok(Some(raw).filter(|raw| !raw.is_empty()))
    }

    /// Build an item from a loaded record; a missing value column is a miss.
    fn item_from_record(
        &self,
        key: &str,
        table_key: &str,
        record: Option<&Record>,
    ) -> CacheResult<CacheItem> {
        let Some(record) = record else {
            return Ok(self.miss(key));
        };
        let expires_at = self.ttl_from(table_key, record)?;
        let item = match self.value_from(table_key, record)? {
            Some(raw) => CacheItem::from_raw(
                key,
                true,
                raw,
                expires_at,
                Arc::clone(&self.codec),
                Arc::clone(&self.clock),
            ),
            None => {
                let mut item = self.miss(key);
                item.expires_at(expires_at);
                item
            }
        };
        Ok(item)
    }

    fn miss(&self, key: &str) -> CacheItem {
        CacheItem::miss(key, Arc::clone(&self.codec), Arc::clone(&self.clock))
    }

    fn record_for(&self, table_key: &str, item: &CacheItem) -> Record {
        let mut record = key_record(&self.config.primary_field, table_key);
        record.insert(
            self.config.value_field.clone(),
            AttributeValue::S(item.raw_value().to_string()),
        );
        if let Some(expires_at) = item.expiration() {
            record.insert(
                self.config.ttl_field.clone(),
                AttributeValue::number(expires_at.timestamp()),
            );
        }
        record
    }

    /// Write a canonical item. Store failures become `Ok(false)`.
    fn put(&self, item: &CacheItem) -> CacheResult<bool> {
        let table_key = self.table_key(item.key())?;
        debug!(table = %self.config.table_name, key = %table_key, "put_item");

        let request = PutItemRequest {
            table_name: self.config.table_name.clone(),
            item: self.record_for(&table_key, item),
        };
        let acknowledged = match self.client.put_item(request) {
            Ok(acknowledged) => acknowledged,
            Err(CacheError::Store(e)) => {
                warn!(
                    table = %self.config.table_name,
                    key = %table_key,
                    error = %e,
                    "put_item failed"
                );
                false
            }
            Err(e) => return Err(e),
        };
        self.stats.record_write(acknowledged);
        Ok(acknowledged)
    }
}

impl<C: TableClient> CacheItemPool for TableCache<C> {
    fn new_item(&self, key: &str) -> CacheResult<CacheItem> {
        self.table_key(key)?;
        Ok(self.miss(key))
    }

    fn get_item(&self, key: &str) -> CacheResult<CacheItem> {
        let table_key = self.table_key(key)?;
        debug!(table = %self.config.table_name, key = %table_key, "get_item");

        let output = self.client.get_item(GetItemRequest {
            table_name: self.config.table_name.clone(),
            key: key_record(&self.config.primary_field, &table_key),
            consistent_read: self.config.consistent_read,
        })?;

        let item = self.item_from_record(key, &table_key, output.item.as_ref())?;
        self.stats.record_load(&item);
        Ok(item)
    }

    fn get_items<K: AsRef<str>>(&self, keys: &[K]) -> CacheResult<Vec<CacheItem>> {
        let table_keys = self.table_keys(keys)?;
        if table_keys.is_empty() {
            return Ok(Vec::new());
        }
        debug!(table = %self.config.table_name, count = table_keys.len(), "batch_get_item");

        let primary_field = &self.config.primary_field;
        let output = self.client.batch_get_item(BatchGetItemRequest {
            table_name: self.config.table_name.clone(),
            keys: table_keys
                .iter()
                .map(|k| key_record(primary_field, k))
                .collect(),
        })?;

        let mut served = HashMap::with_capacity(output.responses.len());
        for record in output.responses {
            let Some(key) = primary_key(&record, primary_field).map(str::to_string) else {
                warn!(
                    table = %self.config.table_name,
                    "batch_get_item returned a record without a primary key"
                );
                continue;
            };
            served.insert(key, record);
        }
        let unprocessed: HashSet<String> = output
            .unprocessed_keys
            .iter()
            .filter_map(|r| primary_key(r, primary_field))
            .map(str::to_string)
            .collect();
        if !unprocessed.is_empty() {
            warn!(
                table = %self.config.table_name,
                unprocessed = unprocessed.len(),
                "batch_get_item left keys unprocessed; reporting them as misses"
            );
        }

        let mut items = Vec::with_capacity(table_keys.len());
        for outcome in reconcile_batch(&table_keys, served, &unprocessed) {
            let item = match outcome {
                BatchOutcome::Served { key, record } => {
                    self.item_from_record(self.config.unprefixed(&key), &key, Some(&record))?
                }
                BatchOutcome::Unprocessed { key } | BatchOutcome::NotFound { key } => {
                    self.miss(self.config.unprefixed(&key))
                }
            };
            self.stats.record_load(&item);
            items.push(item);
        }
        Ok(items)
    }

    fn clear(&self) -> bool {
        debug!(table = %self.config.table_name, "clear is not supported by table caches");
        false
    }

    fn delete_item(&self, key: &str) -> CacheResult<bool> {
        let table_key = self.table_key(key)?;
        debug!(table = %self.config.table_name, key = %table_key, "delete_item");

        let result = self.client.delete_item(DeleteItemRequest {
            table_name: self.config.table_name.clone(),
            key: key_record(&self.config.primary_field, &table_key),
            return_old_values: true,
        });
        match result {
            Ok(output) => {
                self.stats.deletes.fetch_add(1, Ordering::Relaxed);
                Ok(output.attributes.is_some_and(|old| !old.is_empty()))
            }
            Err(CacheError::Store(e)) => {
                warn!(
                    table = %self.config.table_name,
                    key = %table_key,
                    error = %e,
                    "delete_item failed"
                );
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }

    fn delete_items<K: AsRef<str>>(&self, keys: &[K]) -> CacheResult<bool> {
        let table_keys = self.table_keys(keys)?;
        if table_keys.is_empty() {
            return Ok(true);
        }
        debug!(table = %self.config.table_name, count = table_keys.len(), "batch_write_item");

        let result = self.client.batch_write_item(BatchWriteItemRequest {
            table_name: self.config.table_name.clone(),
            requests: table_keys
                .iter()
                .map(|k| WriteRequest::Delete {
                    key: key_record(&self.config.primary_field, k),
                })
                .collect(),
        });
        match result {
            Ok(output) => {
                if !output.unprocessed.is_empty() {
                    warn!(
                        table = %self.config.table_name,
                        unprocessed = output.unprocessed.len(),
                        "batch_write_item left deletes unprocessed"
                    );
                }
                self.stats.deletes.fetch_add(1, Ordering::Relaxed);
                Ok(true)
            }
            Err(CacheError::Store(e)) => {
                warn!(table = %self.config.table_name, error = %e, "batch_write_item failed");
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }

    fn save(&self, item: &dyn CacheEntry) -> CacheResult<bool> {
        let item = self.converters.convert(item)?;
        self.put(&item)
    }

    fn save_deferred(&mut self, item: &dyn CacheEntry) -> CacheResult<bool> {
        self.table_key(item.key())?;
        let item = self.converters.convert(item)?.into_owned();
        self.deferred.push(item);
        Ok(true)
    }

    fn commit(&mut self) -> CacheResult<bool> {
        if self.deferred.is_empty() {
            return Ok(true);
        }

        let mut buffer = std::mem::take(&mut self.deferred);
        let result = buffer.commit(|item| self.put(item));
        self.deferred = buffer;

        if let Ok(false) = result {
            warn!(
                table = %self.config.table_name,
                remaining = self.deferred.len(),
                "commit left items buffered"
            );
        }
        result
    }
}

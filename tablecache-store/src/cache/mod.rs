//! Cache pool over a remote key-value table.
//!
//! # Layers
//!
//! - [`converter`]: normalizes any [`CacheEntry`](tablecache_core::CacheEntry)
//!   into the canonical [`CacheItem`](tablecache_core::CacheItem).
//! - [`reconcile`]: folds a batched read's served and unprocessed sets into
//!   one outcome per requested key. Pure, no store access.
//! - [`deferred`]: insertion-ordered buffer behind `save_deferred`/`commit`.
//! - [`table_cache`]: the [`TableCache`] pool that ties the above to a
//!   [`TableClient`](crate::TableClient).
//!
//! # Partial failure
//!
//! Batched reads never fail because some keys were not served: unserved keys
//! come back as misses and the caller decides whether to retry. A commit that
//! only partly succeeds returns `false` and keeps the failed items queued, so
//! calling `commit` again retries exactly those.
//!
//! # Example
//!
//! ```ignore
//! let mut cache = TableCache::new(client, TableCacheConfig::new("cache"))?;
//!
//! cache.set("user.42", json!({"name": "a"}), Duration::from_secs(60))?;
//! let values = cache.get_multiple(&["user.42", "user.43"], Value::Null)?;
//!
//! let mut item = cache.new_item("user.44")?;
//! item.set(json!(44));
//! cache.save_deferred(&item)?;
//! if !cache.commit()? {
//!     tracing::warn!("some writes are still buffered");
//! }
//! ```

pub mod converter;
pub mod deferred;
pub mod reconcile;
pub mod table_cache;
pub mod traits;

pub use converter::{ConverterRegistry, DefaultItemConverter, ItemConverter};
pub use deferred::DeferredBuffer;
pub use reconcile::{reconcile_batch, BatchOutcome};
pub use table_cache::{TableCache, TableCacheBuilder};
pub use traits::{CacheItemPool, CacheStats, SimpleCache};

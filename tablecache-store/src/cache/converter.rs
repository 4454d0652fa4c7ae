//! Normalization of cache-item-shaped values into [`CacheItem`].

use std::borrow::Cow;
use std::sync::Arc;

use tablecache_core::{CacheEntry, CacheItem, CacheResult, Clock, ConfigError, ValueCodec};

/// Turns some family of [`CacheEntry`] implementations into canonical items.
pub trait ItemConverter: Send + Sync {
    /// Whether this converter can handle `entry`.
    fn supports(&self, entry: &dyn CacheEntry) -> bool;

    /// Convert `entry`. Canonical items should be borrowed, not copied.
    fn convert<'a>(&self, entry: &'a dyn CacheEntry) -> CacheResult<Cow<'a, CacheItem>>;
}

/// Converter that accepts any entry.
///
/// Canonical items pass through untouched. Anything else is rebuilt from its
/// key, hit flag and decoded value, re-encoded with this converter's codec.
/// The foreign item's expiration is not reachable through [`CacheEntry`], so
/// the rebuilt item never carries one.
#[derive(Debug, Clone)]
pub struct DefaultItemConverter {
    codec: Arc<dyn ValueCodec>,
    clock: Arc<dyn Clock>,
}

impl DefaultItemConverter {
    pub fn new(codec: Arc<dyn ValueCodec>, clock: Arc<dyn Clock>) -> Self {
        Self { codec, clock }
    }
}

impl ItemConverter for DefaultItemConverter {
    fn supports(&self, _entry: &dyn CacheEntry) -> bool {
        true
    }

    fn convert<'a>(&self, entry: &'a dyn CacheEntry) -> CacheResult<Cow<'a, CacheItem>> {
        if let Some(item) = entry.as_cache_item() {
            return Ok(Cow::Borrowed(item));
        }

        Ok(Cow::Owned(CacheItem::new(
            entry.key(),
            entry.is_hit(),
            entry.value()?,
            None,
            Arc::clone(&self.codec),
            Arc::clone(&self.clock),
        )))
    }
}

/// Ordered list of converters; the first that supports an entry wins.
#[derive(Clone, Default)]
pub struct ConverterRegistry {
    converters: Vec<Arc<dyn ItemConverter>>,
}

impl std::fmt::Debug for ConverterRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConverterRegistry")
            .field("converters", &self.converters.len())
            .finish()
    }
}

impl ConverterRegistry {
    /// A registry with the given converters, tried in order.
    pub fn new(converters: Vec<Arc<dyn ItemConverter>>) -> Self {
        Self { converters }
    }

    /// A registry holding only a [`DefaultItemConverter`].
    pub fn with_default(codec: Arc<dyn ValueCodec>, clock: Arc<dyn Clock>) -> Self {
        Self::new(vec![Arc::new(DefaultItemConverter::new(codec, clock))])
    }

    /// Append a converter, tried after the existing ones.
    pub fn push(&mut self, converter: Arc<dyn ItemConverter>) {
        self.converters.push(converter);
    }

    pub fn len(&self) -> usize {
        self.converters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.converters.is_empty()
    }

    /// Convert with the first converter that supports `entry`.
    ///
    /// No supporting converter is a configuration error.
    pub fn convert<'a>(&self, entry: &'a dyn CacheEntry) -> CacheResult<Cow<'a, CacheItem>> {
        self.converters
            .iter()
            .find(|c| c.supports(entry))
            .ok_or_else(|| ConfigError::NoConverter {
                key: entry.key().to_string(),
            })?
            .convert(entry)
    }
}

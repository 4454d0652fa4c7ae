//! The canonical cache item.
//!
//! A [`CacheItem`] holds one key, its codec-encoded payload, a hit flag fixed
//! at construction and an optional absolute expiration. Whether the item is a
//! hit is evaluated lazily against the item's [`Clock`] every time
//! [`CacheItem::is_hit`] is called.
//!
//! Items from other cache implementations interoperate through the
//! [`CacheEntry`] capability trait and are normalized by a converter before
//! they reach the store.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;

use crate::clock::Clock;
use crate::codec::ValueCodec;
use crate::error::{CacheResult, CodecError, InvalidArgumentError};

/// Relative expiration accepted by [`CacheItem::expires_after`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ttl {
    /// Clear any expiration.
    Never,
    /// Expire after the given duration.
    After(Duration),
    /// Expire after a whole number of seconds. Negative values are rejected.
    Seconds(i64),
}

impl From<Duration> for Ttl {
    fn from(d: Duration) -> Self {
        Ttl::After(d)
    }
}

impl From<i64> for Ttl {
    fn from(secs: i64) -> Self {
        Ttl::Seconds(secs)
    }
}

impl From<i32> for Ttl {
    fn from(secs: i32) -> Self {
        Ttl::Seconds(i64::from(secs))
    }
}

impl<T: Into<Ttl>> From<Option<T>> for Ttl {
    fn from(ttl: Option<T>) -> Self {
        ttl.map_or(Ttl::Never, Into::into)
    }
}

/// Capability interface for anything shaped like a cache item.
///
/// This is all a foreign item has to offer; its expiration is not reachable
/// through it.
pub trait CacheEntry {
    /// The item's (un-prefixed) key.
    fn key(&self) -> &str;

    /// The item's current decoded value.
    fn value(&self) -> CacheResult<Value>;

    /// Whether the item currently represents a hit.
    fn is_hit(&self) -> bool;

    /// Returns the canonical item when this entry already is one.
    fn as_cache_item(&self) -> Option<&CacheItem> {
        None
    }
}

/// One cache entry: key, encoded value, hit flag and expiration.
#[derive(Debug, Clone)]
pub struct CacheItem {
    key: String,
    hit: bool,
    raw: String,
    expires_at: Option<DateTime<Utc>>,
    codec: Arc<dyn ValueCodec>,
    clock: Arc<dyn Clock>,
}

impl CacheItem {
    /// Build an item from a decoded value.
    pub fn new(
        key: impl Into<String>,
        hit: bool,
        value: Value,
        expires_at: Option<DateTime<Utc>>,
        codec: Arc<dyn ValueCodec>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let raw = codec.encode(&value);
        Self {
            key: key.into(),
            hit,
            raw,
            expires_at,
            codec,
            clock,
        }
    }

    /// Build an item around a payload that is already codec-encoded.
    ///
    /// Used when loading records from the table; the payload is decoded only
    /// when [`CacheItem::get`] is called.
    pub fn from_raw(
        key: impl Into<String>,
        hit: bool,
        raw: impl Into<String>,
        expires_at: Option<DateTime<Utc>>,
        codec: Arc<dyn ValueCodec>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            key: key.into(),
            hit,
            raw: raw.into(),
            expires_at,
            codec,
            clock,
        }
    }

    /// A miss for `key`: no value, no expiration.
    pub fn miss(key: impl Into<String>, codec: Arc<dyn ValueCodec>, clock: Arc<dyn Clock>) -> Self {
        Self::new(key, false, Value::Null, None, codec, clock)
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Decode the current value.
    ///
    /// Defined for misses too: a miss yields `null` unless a value was set.
    pub fn get(&self) -> CacheResult<Value> {
        self.codec.decode(&self.raw)
    }

    /// Decode the current value into a concrete type.
    pub fn get_as<T: DeserializeOwned>(&self) -> CacheResult<T> {
        let value = self.get()?;
        serde_json::from_value(value).map_err(|e| {
            CodecError::Decode {
                codec: self.codec.name().to_string(),
                reason: e.to_string(),
            }
            .into()
        })
    }

    /// True if the item was found and has not expired yet.
    pub fn is_hit(&self) -> bool {
        self.hit && self.expires_at.map_or(true, |at| self.clock.now() < at)
    }

    /// Replace the value.
    pub fn set(&mut self, value: impl Into<Value>) -> &mut Self {
        self.raw = self.codec.encode(&value.into());
        self
    }

    /// Replace the value with anything serde can serialize.
    pub fn set_serialized<T: Serialize + ?Sized>(&mut self, value: &T) -> CacheResult<&mut Self> {
        let value = serde_json::to_value(value).map_err(|e| CodecError::Encode {
            codec: self.codec.name().to_string(),
            reason: e.to_string(),
        })?;
        Ok(self.set(value))
    }

    /// Set an absolute expiration, or clear it with `None`.
    pub fn expires_at(&mut self, at: Option<DateTime<Utc>>) -> &mut Self {
        self.expires_at = at;
        self
    }

    /// Set an absolute expiration from Unix seconds.
    pub fn expires_at_timestamp(&mut self, secs: i64) -> CacheResult<&mut Self> {
        let at = DateTime::from_timestamp(secs, 0)
            .ok_or(InvalidArgumentError::TimestampOutOfRange { timestamp: secs })?;
        Ok(self.expires_at(Some(at)))
    }

    /// Set an expiration relative to now.
    pub fn expires_after(&mut self, ttl: impl Into<Ttl>) -> CacheResult<&mut Self> {
        let delta = match ttl.into() {
            Ttl::Never => {
                self.expires_at = None;
                return Ok(self);
            }
            Ttl::Seconds(secs) if secs < 0 => {
                return Err(InvalidArgumentError::NegativeTtl { seconds: secs }.into());
            }
            Ttl::Seconds(secs) => chrono::Duration::try_seconds(secs),
            Ttl::After(d) => chrono::Duration::from_std(d).ok(),
        };
        let now = self.clock.now();
        let at = delta
            .and_then(|d| now.checked_add_signed(d))
            .ok_or(InvalidArgumentError::TimestampOutOfRange {
                timestamp: now.timestamp(),
            })?;
        self.expires_at = Some(at);
        Ok(self)
    }

    /// The codec-encoded payload, as written to the value column.
    ///
    /// Serves the store crate when it builds records.
    #[doc(hidden)]
    pub fn raw_value(&self) -> &str {
        &self.raw
    }

    /// The absolute expiration, as written to the TTL column.
    ///
    /// Serves the store crate when it builds records.
    #[doc(hidden)]
    pub fn expiration(&self) -> Option<DateTime<Utc>> {
        self.expires_at
    }

    /// The hit flag fixed at construction, ignoring expiration.
    #[doc(hidden)]
    pub fn was_found(&self) -> bool {
        self.hit
    }
}

impl CacheEntry for CacheItem {
    fn key(&self) -> &str {
        CacheItem::key(self)
    }

    fn value(&self) -> CacheResult<Value> {
        self.get()
    }

    fn is_hit(&self) -> bool {
        CacheItem::is_hit(self)
    }

    fn as_cache_item(&self) -> Option<&CacheItem> {
        Some(self)
    }
}


#[cfg(test)]
mod prop_tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::codec::JsonCodec;
    use proptest::prelude::*;

    proptest! {
        /// Property: with an expiration in the past, a found item is never a hit.
        #[test]
        fn prop_expired_is_never_hit(now in 1_000i64..2_000_000_000, back in 0i64..1_000) {
            let clock = ManualClock::at_timestamp(now);
            let mut item =
                CacheItem::new("k", true, Value::Null, None, Arc::new(JsonCodec), Arc::new(clock));
            item.expires_at_timestamp(now - back).unwrap();
            prop_assert!(!item.is_hit());
        }

        /// Property: without expiration, a found item is a hit at any time.
        #[test]
        fn prop_no_expiration_always_hit(now in 0i64..4_000_000_000) {
            let clock = ManualClock::at_timestamp(now);
            let item =
                CacheItem::new("k", true, Value::Null, None, Arc::new(JsonCodec), Arc::new(clock));
            prop_assert!(item.is_hit());
        }
    }
}

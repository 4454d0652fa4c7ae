//! tablecache core - item model and shared types
//!
//! The cache item, value codecs, clock abstraction, key rules, configuration
//! and error types. The store access layer lives in `tablecache-store`.

pub mod clock;
pub mod codec;
pub mod config;
pub mod error;
pub mod item;
pub mod key;

pub use clock::{Clock, ManualClock, SystemClock};
pub use codec::{HexCodec, JsonCodec, ValueCodec};
pub use config::TableCacheConfig;
pub use error::{
    CacheError, CacheResult, CodecError, ConfigError, InvalidArgumentError, StoreError,
};
pub use item::{CacheEntry, CacheItem, Ttl};
pub use key::{contains_reserved, validate_key, RESERVED_CHARACTERS};

/// Re-exported so callers can build values without a direct dependency.
pub use serde_json::Value;

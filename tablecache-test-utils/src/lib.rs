//! tablecache Test Utilities
//!
//! Centralized test infrastructure for the tablecache workspace:
//! - Proptest generators for keys and values
//! - Fixtures wiring a cache to an in-memory table and a manual clock
//! - Record builders for seeding the table directly

// Re-export the mock table client from its source crate
pub use tablecache_store::{CallCounts, MockTableClient};

// Re-export core types for convenience
pub use tablecache_core::{
    CacheError, CacheItem, CacheResult, JsonCodec, ManualClock, TableCacheConfig, Value,
    RESERVED_CHARACTERS,
};
pub use tablecache_store::{AttributeValue, CacheItemPool, Record, SimpleCache, TableCache};

use std::sync::Arc;

use proptest::prelude::*;

// ============================================================================
// FIXTURES
// ============================================================================

/// Unix timestamp every fixture clock starts at.
pub const FIXTURE_NOW: i64 = 1_700_000_000;

/// Table name used by fixtures.
pub const FIXTURE_TABLE: &str = "cache";

/// A cache over an in-memory table, plus handles to drive it.
pub struct CacheFixture {
    pub cache: TableCache<MockTableClient>,
    pub client: Arc<MockTableClient>,
    pub clock: ManualClock,
}

impl CacheFixture {
    /// Fixture with the default column layout.
    pub fn new() -> Self {
        Self::with_config(TableCacheConfig::new(FIXTURE_TABLE))
    }

    /// Fixture with a custom layout. Panics on an invalid config.
    pub fn with_config(config: TableCacheConfig) -> Self {
        let client = Arc::new(MockTableClient::new(
            config.table_name.clone(),
            config.primary_field.clone(),
        ));
        let clock = ManualClock::at_timestamp(FIXTURE_NOW);
        let cache = TableCache::builder(Arc::clone(&client), config)
            .with_clock(Arc::new(clock.clone()))
            .build()
            .expect("fixture config must be valid");
        Self {
            cache,
            client,
            clock,
        }
    }

    /// Seed a record with the default column names.
    pub fn seed(&self, key: &str, encoded: &str, ttl: Option<i64>) {
        self.client.insert_record(record(key, encoded, ttl));
    }
}

impl Default for CacheFixture {
    fn default() -> Self {
        Self::new()
    }
}

/// Build a record with the default column names.
pub fn record(key: &str, encoded: &str, ttl: Option<i64>) -> Record {
    let mut record = Record::new();
    record.insert("id".to_string(), AttributeValue::S(key.to_string()));
    record.insert("value".to_string(), AttributeValue::S(encoded.to_string()));
    if let Some(ttl) = ttl {
        record.insert("ttl".to_string(), AttributeValue::number(ttl));
    }
    record
}

// ============================================================================
// GENERATORS
// ============================================================================

/// Keys free of reserved characters.
pub fn valid_key_strategy() -> impl Strategy<Value = String> {
    "[a-zA-Z0-9._-]{1,24}"
}

/// Keys containing at least one reserved character.
pub fn reserved_key_strategy() -> impl Strategy<Value = String> {
    let reserved: Vec<char> = RESERVED_CHARACTERS.chars().collect();
    (
        "[a-z0-9]{0,8}",
        prop::sample::select(reserved),
        "[a-z0-9]{0,8}",
    )
        .prop_map(|(head, c, tail)| format!("{head}{c}{tail}"))
}

/// Finite floats drawn from the whole bit space, subnormals included.
pub fn finite_f64_strategy() -> impl Strategy<Value = f64> {
    any::<u64>()
        .prop_map(f64::from_bits)
        .prop_filter("finite", |f| f.is_finite())
}

/// Arbitrary JSON values.
pub fn json_value_strategy() -> impl Strategy<Value = Value> {
    let leaf = prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        any::<i64>().prop_map(Value::from),
        any::<u64>().prop_map(Value::from),
        finite_f64_strategy().prop_map(Value::from),
        ".{0,16}".prop_map(Value::String),
    ];
    leaf.prop_recursive(3, 32, 4, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..4).prop_map(Value::Array),
            prop::collection::btree_map("[a-z]{1,6}", inner, 0..4)
                .prop_map(|m| Value::Object(m.into_iter().collect())),
        ]
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::strategy::ValueTree;
    use proptest::test_runner::TestRunner;
    use tablecache_core::{contains_reserved, validate_key, Clock};

    #[test]
    fn test_fixture_starts_empty() {
        let fixture = CacheFixture::new();
        assert!(fixture.client.is_empty());
        assert_eq!(fixture.cache.deferred_len(), 0);
        assert_eq!(fixture.clock.now().timestamp(), FIXTURE_NOW);
    }

    #[test]
    fn test_seed_is_readable() {
        let fixture = CacheFixture::new();
        fixture.seed("k", "42", None);
        assert_eq!(fixture.cache.get("k", Value::Null).unwrap(), Value::from(42));
    }

    #[test]
    fn test_generators_respect_their_contract() {
        let mut runner = TestRunner::default();
        for _ in 0..100 {
            let valid = valid_key_strategy().new_tree(&mut runner).unwrap().current();
            assert!(validate_key(&valid).is_ok());
            let reserved = reserved_key_strategy().new_tree(&mut runner).unwrap().current();
            assert!(contains_reserved(&reserved));
        }
    }
}

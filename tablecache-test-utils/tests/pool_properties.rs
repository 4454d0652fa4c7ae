//! Property tests for the table-backed cache pool
//!
//! Tests verify:
//! - Reserved-character keys never reach the table
//! - Batched reads return exactly one item per distinct key
//! - Saved values, floats included, read back unchanged
//! - Deferred commits retry only what failed

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use proptest::prelude::*;
use tablecache_test_utils::{
    finite_f64_strategy, json_value_strategy, reserved_key_strategy, valid_key_strategy,
    CacheFixture, CacheItem, CacheItemPool, JsonCodec, SimpleCache, Value,
};

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Property: every key-accepting operation rejects reserved keys without a store call.
    #[test]
    fn prop_reserved_keys_never_reach_the_table(key in reserved_key_strategy()) {
        let mut fixture = CacheFixture::new();
        let item = CacheItem::new(
            key.clone(),
            true,
            Value::Null,
            None,
            Arc::new(JsonCodec),
            Arc::new(fixture.clock.clone()),
        );
        let keys = [key.as_str()];
        let cache = &mut fixture.cache;

        // item surface
        prop_assert!(cache.new_item(&key).unwrap_err().is_invalid_argument());
        prop_assert!(cache.get_item(&key).unwrap_err().is_invalid_argument());
        prop_assert!(cache.get_items(&keys).unwrap_err().is_invalid_argument());
        prop_assert!(cache.has_item(&key).unwrap_err().is_invalid_argument());
        prop_assert!(cache.delete_item(&key).unwrap_err().is_invalid_argument());
        prop_assert!(cache.delete_items(&keys).unwrap_err().is_invalid_argument());
        prop_assert!(cache.delete_entry(&item).unwrap_err().is_invalid_argument());
        prop_assert!(cache.save(&item).unwrap_err().is_invalid_argument());
        prop_assert!(cache.save_deferred(&item).unwrap_err().is_invalid_argument());
        prop_assert_eq!(cache.deferred_len(), 0);

        // simple surface
        prop_assert!(cache.get(&key, Value::Null).unwrap_err().is_invalid_argument());
        prop_assert!(cache
            .set(&key, Value::Null, None::<Duration>)
            .unwrap_err()
            .is_invalid_argument());
        prop_assert!(cache.has(&key).unwrap_err().is_invalid_argument());
        prop_assert!(cache.delete(&key).unwrap_err().is_invalid_argument());
        prop_assert!(cache
            .get_multiple(&keys, Value::Null)
            .unwrap_err()
            .is_invalid_argument());
        prop_assert!(cache
            .set_multiple(vec![(key.clone(), Value::Null)], None::<Duration>)
            .unwrap_err()
            .is_invalid_argument());
        prop_assert!(cache.delete_multiple(&keys).unwrap_err().is_invalid_argument());

        prop_assert_eq!(fixture.client.calls().total(), 0);
    }

    /// Property: finite floats survive a trip through the table bit for bit.
    #[test]
    fn prop_floats_survive_the_table(key in valid_key_strategy(), f in finite_f64_strategy()) {
        let fixture = CacheFixture::new();
        prop_assert!(fixture.cache.set(&key, Value::from(f), None::<Duration>).unwrap());

        let value = fixture.cache.get(&key, Value::Null).unwrap();
        prop_assert_eq!(value.as_f64().map(f64::to_bits), Some(f.to_bits()));
    }

    /// Property: one item per distinct requested key, hit exactly when served.
    #[test]
    fn prop_batch_get_is_complete(
        requested in prop::collection::vec(valid_key_strategy(), 1..12),
        stored_mask in prop::collection::vec(any::<bool>(), 12),
        throttled_mask in prop::collection::vec(any::<bool>(), 12),
    ) {
        let fixture = CacheFixture::new();
        let mut stored = HashSet::new();
        let mut throttled = HashSet::new();
        for (i, key) in requested.iter().enumerate() {
            if stored_mask[i] {
                fixture.seed(key, "1", None);
                stored.insert(key.as_str());
            }
            if throttled_mask[i] {
                fixture.client.throttle_batch_get(key.clone());
                throttled.insert(key.as_str());
            }
        }
        let served: HashSet<&str> = stored.difference(&throttled).copied().collect();

        let items = fixture.cache.get_items(&requested).unwrap();
        let distinct: HashSet<&str> = requested.iter().map(String::as_str).collect();
        let keys: Vec<&str> = items.iter().map(|i| i.key()).collect();
        let key_set: HashSet<&str> = keys.iter().copied().collect();

        prop_assert_eq!(keys.len(), distinct.len());
        prop_assert_eq!(key_set, distinct);
        for item in &items {
            prop_assert_eq!(item.is_hit(), served.contains(item.key()));
        }
        prop_assert_eq!(fixture.client.calls().batch_get_item, 1);
    }

    /// Property: a saved value reads back unchanged.
    #[test]
    fn prop_save_then_get_roundtrip(key in valid_key_strategy(), value in json_value_strategy()) {
        let fixture = CacheFixture::new();
        prop_assert!(fixture.cache.set(&key, value.clone(), 60i64).unwrap());

        let item = fixture.cache.get_item(&key).unwrap();
        prop_assert!(item.is_hit());
        prop_assert_eq!(item.get().unwrap(), value);
    }

    /// Property: after a partly failed commit, the next commit writes only the failures.
    #[test]
    fn prop_commit_retries_only_failures(
        keys in prop::collection::hash_set(valid_key_strategy(), 1..8),
        fail_mask in prop::collection::vec(any::<bool>(), 8),
    ) {
        let mut fixture = CacheFixture::new();
        let keys: Vec<String> = keys.into_iter().collect();
        let mut failing = 0;
        for (i, key) in keys.iter().enumerate() {
            let mut item = fixture.cache.new_item(key).unwrap();
            item.set(i as i64);
            prop_assert!(fixture.cache.save_deferred(&item).unwrap());
            if fail_mask[i] {
                fixture.client.fail_puts_for(key.clone());
                failing += 1;
            }
        }

        let first = fixture.cache.commit().unwrap();
        prop_assert_eq!(first, failing == 0);
        prop_assert_eq!(fixture.cache.deferred_len(), failing);
        prop_assert_eq!(fixture.client.calls().put_item, keys.len());

        fixture.client.heal();
        prop_assert!(fixture.cache.commit().unwrap());
        prop_assert_eq!(fixture.cache.deferred_len(), 0);
        prop_assert_eq!(fixture.client.calls().put_item, keys.len() + failing);
        prop_assert_eq!(fixture.client.len(), keys.len());
    }
}

//! Property-based test generators using proptest.
//!
//! Ids are drawn from a small pool so that generated replicas overlap often
//! enough to exercise conflict resolution.

use hoard_core::Record;
use proptest::prelude::*;
use serde_json::{Map, Value};

/// Strategy for ids from a pool of eight.
pub fn entity_id_strategy() -> impl Strategy<Value = String> {
    (0u8..8).prop_map(|n| format!("e{n}"))
}

/// Strategy for timestamps, including the "never stamped" 0.
pub fn timestamp_strategy() -> impl Strategy<Value = u64> {
    prop_oneof![
        1 => Just(0u64),
        6 => 1u64..20,
    ]
}

/// Strategy for short display names.
pub fn name_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[A-Z][a-z]{2,8}").expect("Invalid regex")
}

fn build(id: Option<String>, last_modified: u64, deleted: bool, name: String) -> Record {
    let mut map = Map::new();
    if let Some(id) = id {
        map.insert("id".into(), Value::from(id));
    }
    map.insert("lastModified".into(), Value::from(last_modified));
    if deleted {
        map.insert("deleted".into(), Value::Bool(true));
    }
    map.insert("name".into(), Value::from(name));
    Record::from_map(map)
}

/// Strategy for a keyed record, tombstoned about one time in five.
pub fn record_strategy() -> impl Strategy<Value = Record> {
    (
        entity_id_strategy(),
        timestamp_strategy(),
        prop::bool::weighted(0.2),
        name_strategy(),
    )
        .prop_map(|(id, lm, deleted, name)| build(Some(id), lm, deleted, name))
}

/// Strategy for a live (never tombstoned) keyed record.
pub fn live_record_strategy() -> impl Strategy<Value = Record> {
    (entity_id_strategy(), timestamp_strategy(), name_strategy())
        .prop_map(|(id, lm, name)| build(Some(id), lm, false, name))
}

/// Strategy for a record without any id.
pub fn unkeyed_record_strategy() -> impl Strategy<Value = Record> {
    (timestamp_strategy(), name_strategy()).prop_map(|(lm, name)| build(None, lm, false, name))
}

/// Strategy for a replica: at most one record per id.
pub fn replica_strategy() -> impl Strategy<Value = Vec<Record>> {
    prop::collection::btree_map(
        entity_id_strategy(),
        (timestamp_strategy(), prop::bool::weighted(0.2), name_strategy()),
        0..8,
    )
    .prop_map(|entries| {
        entries
            .into_iter()
            .map(|(id, (lm, deleted, name))| build(Some(id), lm, deleted, name))
            .collect()
    })
}

/// Strategy for a list that may repeat ids.
pub fn noisy_collection_strategy() -> impl Strategy<Value = Vec<Record>> {
    prop::collection::vec(record_strategy(), 0..16)
}

/// Strategy for two replicas whose ids never overlap.
pub fn disjoint_replicas_strategy() -> impl Strategy<Value = (Vec<Record>, Vec<Record>)> {
    (
        prop::collection::btree_map(0u8..8, (timestamp_strategy(), name_strategy()), 0..8),
        prop::collection::btree_map(8u8..16, (timestamp_strategy(), name_strategy()), 0..8),
    )
        .prop_map(|(left, right)| {
            let to_records = |entries: std::collections::BTreeMap<u8, (u64, String)>| {
                entries
                    .into_iter()
                    .map(|(n, (lm, name))| build(Some(format!("e{n}")), lm, false, name))
                    .collect::<Vec<_>>()
            };
            (to_records(left), to_records(right))
        })
}

//! Merge engine: reconciles a local and a remote collection.
//!
//! # Algorithm
//!
//! 1. Accumulate `local` by key (tombstones skipped when excluding deletes)
//! 2. Fold `remote` in: unknown keys are inserted, known keys are replaced
//!    only when the remote version is strictly newer (LWW)
//! 3. Return the accumulation
//!
//! Entities without a usable key are dropped. The whole engine is O(n),
//! stateless and infallible.

use crate::entity::Entity;
use crate::types::Replica;
use std::collections::{HashMap, HashSet};
use tracing::trace;

/// Options for [`reconcile`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MergeOptions {
    /// Drop tombstoned entities from both replicas before merging.
    pub exclude_deleted: bool,
    /// Resolve key collisions by `lastModified`. When false, local always wins.
    pub use_lww: bool,
}

impl MergeOptions {
    /// Creates the default options (exclude deleted, LWW).
    #[must_use]
    pub const fn new() -> Self {
        Self {
            exclude_deleted: true,
            use_lww: true,
        }
    }

    /// Keeps tombstones in the result so they can be persisted and propagated.
    #[must_use]
    pub const fn keep_deleted(mut self) -> Self {
        self.exclude_deleted = false;
        self
    }

    /// Disables LWW: local wins every collision.
    #[must_use]
    pub const fn without_lww(mut self) -> Self {
        self.use_lww = false;
        self
    }
}

impl Default for MergeOptions {
    fn default() -> Self {
        Self::new()
    }
}

/// Result of [`reconcile_with_report`].
#[derive(Debug, Clone, PartialEq)]
pub struct MergeReport<E> {
    /// The converged collection, in first-insertion order.
    pub merged: Vec<E>,
    /// Keys whose remote version ended up in `merged` (created or replaced).
    pub accepted_remote: Vec<String>,
    /// Keys present in both replicas where the local version was kept.
    pub kept_local: Vec<String>,
    /// Number of tombstones filtered out of either replica.
    pub tombstones_skipped: usize,
    /// Number of entities dropped for lacking a key.
    pub unkeyed_dropped: usize,
}

impl<E> MergeReport<E> {
    /// Returns true if the remote contributed nothing.
    pub fn is_local_unchanged(&self) -> bool {
        self.accepted_remote.is_empty()
    }
}

/// Accumulation keyed by entity key, remembering insertion order and origin.
struct Accumulator<E> {
    slots: Vec<(E, Replica)>,
    index: HashMap<String, usize>,
    kept_local: Vec<String>,
    kept_seen: HashSet<String>,
    tombstones_skipped: usize,
    unkeyed_dropped: usize,
    options: MergeOptions,
}

impl<E: Entity> Accumulator<E> {
    fn new(options: MergeOptions) -> Self {
        Self {
            slots: Vec::new(),
            index: HashMap::new(),
            kept_local: Vec::new(),
            kept_seen: HashSet::new(),
            tombstones_skipped: 0,
            unkeyed_dropped: 0,
            options,
        }
    }

    /// Applies the tombstone and key filters. Returns the key if `entity`
    /// takes part in the merge.
    fn admit(&mut self, entity: &E) -> Option<String> {
        if self.options.exclude_deleted && entity.is_deleted() {
            self.tombstones_skipped += 1;
            return None;
        }
        match entity.key() {
            Some(key) => Some(key.into_owned()),
            None => {
                trace!("dropping entity without a usable id");
                self.unkeyed_dropped += 1;
                None
            }
        }
    }

    fn push_local(&mut self, entity: E) {
        let Some(key) = self.admit(&entity) else {
            return;
        };
        match self.index.get(&key) {
            // A repeated local key overwrites in place.
            Some(&slot) => self.slots[slot] = (entity, Replica::Local),
            None => {
                self.index.insert(key, self.slots.len());
                self.slots.push((entity, Replica::Local));
            }
        }
    }

    fn push_remote(&mut self, entity: E) {
        let Some(key) = self.admit(&entity) else {
            return;
        };
        let Some(&slot) = self.index.get(&key) else {
            self.index.insert(key, self.slots.len());
            self.slots.push((entity, Replica::Remote));
            return;
        };

        let (existing, origin) = &self.slots[slot];
        let origin = *origin;
        let remote_wins =
            self.options.use_lww && entity.last_modified() > existing.last_modified();

        if remote_wins {
            self.slots[slot] = (entity, Replica::Remote);
        } else if origin == Replica::Local && self.kept_seen.insert(key.clone()) {
            self.kept_local.push(key);
        }
    }

    fn finish(self) -> MergeReport<E> {
        let mut merged = Vec::with_capacity(self.slots.len());
        let mut accepted_remote = Vec::new();

        for (entity, origin) in self.slots {
            if origin == Replica::Remote {
                if let Some(key) = entity.key() {
                    accepted_remote.push(key.into_owned());
                }
            }
            merged.push(entity);
        }

        // A later remote duplicate may have displaced a kept local version.
        let accepted: HashSet<&String> = accepted_remote.iter().collect();
        let kept_local = self
            .kept_local
            .into_iter()
            .filter(|key| !accepted.contains(key))
            .collect();

        MergeReport {
            merged,
            accepted_remote,
            kept_local,
            tombstones_skipped: self.tombstones_skipped,
            unkeyed_dropped: self.unkeyed_dropped,
        }
    }
}

/// Reconciles two replicas of one entity type into a converged collection.
///
/// No two entities in the result share a key. Order is not significant.
///
/// # Example
///
/// ```rust
/// use hoard_core::{reconcile, MergeOptions, Versioned};
///
/// let local = vec![Versioned::new("a", 5, "Goblin")];
/// let remote = vec![Versioned::new("a", 9, "Goblin King"), Versioned::new("b", 1, "Orc")];
///
/// let merged = reconcile(local, remote, MergeOptions::default());
/// assert_eq!(merged.len(), 2);
/// assert_eq!(merged[0].payload, "Goblin King");
/// ```
pub fn reconcile<E, L, R>(local: L, remote: R, options: MergeOptions) -> Vec<E>
where
    E: Entity,
    L: IntoIterator<Item = E>,
    R: IntoIterator<Item = E>,
{
    reconcile_with_report(local, remote, options).merged
}

/// Like [`reconcile`], also reporting which replica each entity came from.
pub fn reconcile_with_report<E, L, R>(local: L, remote: R, options: MergeOptions) -> MergeReport<E>
where
    E: Entity,
    L: IntoIterator<Item = E>,
    R: IntoIterator<Item = E>,
{
    let mut acc = Accumulator::new(options);
    for entity in local {
        acc.push_local(entity);
    }
    for entity in remote {
        acc.push_remote(entity);
    }
    acc.finish()
}

/// Keeps the first occurrence of each key, in input order.
///
/// Entities without a key are dropped.
pub fn deduplicate<E, I>(items: I) -> Vec<E>
where
    E: Entity,
    I: IntoIterator<Item = E>,
{
    let mut seen = HashSet::new();
    items
        .into_iter()
        .filter(|item| match item.key() {
            Some(key) => seen.insert(key.into_owned()),
            None => false,
        })
        .collect()
}

/// Keeps entities that are not tombstoned.
pub fn filter_deleted<E, I>(items: I) -> Vec<E>
where
    E: Entity,
    I: IntoIterator<Item = E>,
{
    items.into_iter().filter(|item| !item.is_deleted()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Record, Versioned};
    use serde_json::json;

    fn record(value: serde_json::Value) -> Record {
        Record::try_from(value).unwrap()
    }

    fn keys<E: Entity>(items: &[E]) -> Vec<String> {
        items
            .iter()
            .filter_map(|item| item.key().map(|key| key.into_owned()))
            .collect()
    }

    #[test]
    fn goblin_king_scenario() {
        let local = vec![record(json!({"id": "a", "lastModified": 5, "name": "Goblin"}))];
        let remote = vec![
            record(json!({"id": "a", "lastModified": 9, "name": "Goblin King"})),
            record(json!({"id": "b", "lastModified": 1, "name": "Orc"})),
        ];

        let merged = reconcile(local, remote.clone(), MergeOptions::default());
        assert_eq!(merged, remote);
    }

    #[test]
    fn remote_only_tombstone_is_excluded() {
        let remote = vec![record(json!({"id": "c", "deleted": true, "lastModified": 3}))];
        let merged = reconcile(Vec::new(), remote, MergeOptions::default());
        assert!(merged.is_empty());
    }

    #[test]
    fn tombstones_kept_when_not_excluded() {
        let local = vec![record(json!({"id": "a", "deleted": true, "lastModified": 4}))];
        let remote = vec![record(json!({"id": "c", "deleted": true, "lastModified": 3}))];
        let merged = reconcile(local, remote, MergeOptions::default().keep_deleted());
        assert_eq!(keys(&merged), vec!["a", "c"]);
    }

    #[test]
    fn local_tombstone_excluded_lets_remote_in() {
        // Exclusion is a filter applied before merging, not a merge decision.
        let local = vec![record(json!({"id": "a", "deleted": true, "lastModified": 10}))];
        let remote = vec![record(json!({"id": "a", "lastModified": 2, "name": "Orc"}))];
        let merged = reconcile(local, remote, MergeOptions::default());
        assert_eq!(merged.len(), 1);
        assert!(!merged[0].is_deleted());
    }

    #[test]
    fn tie_keeps_local() {
        let local = vec![Versioned::new("a", 5, "local")];
        let remote = vec![Versioned::new("a", 5, "remote")];
        let report = reconcile_with_report(local, remote, MergeOptions::default());
        assert_eq!(report.merged[0].payload, "local");
        assert_eq!(report.kept_local, vec!["a".to_string()]);
        assert!(report.is_local_unchanged());
    }

    #[test]
    fn older_remote_loses() {
        let local = vec![Versioned::new("a", 8, "local")];
        let remote = vec![Versioned::new("a", 3, "remote")];
        let merged = reconcile(local, remote, MergeOptions::default());
        assert_eq!(merged[0].payload, "local");
    }

    #[test]
    fn without_lww_local_always_wins() {
        let local = vec![Versioned::new("a", 1, "local")];
        let remote = vec![Versioned::new("a", 100, "remote"), Versioned::new("b", 1, "new")];
        let merged = reconcile(local, remote, MergeOptions::default().without_lww());
        assert_eq!(merged[0].payload, "local");
        assert_eq!(merged[1].payload, "new");
    }

    #[test]
    fn missing_timestamp_is_oldest() {
        let local = vec![record(json!({"id": "a", "name": "unstamped"}))];
        let remote = vec![record(json!({"id": "a", "lastModified": 1, "name": "stamped"}))];
        let merged = reconcile(local, remote, MergeOptions::default());
        assert_eq!(merged[0].get("name"), Some(&json!("stamped")));
    }

    #[test]
    fn unkeyed_entities_are_dropped() {
        let local = vec![
            record(json!({"lastModified": 3, "name": "nobody"})),
            record(json!({"_id": "legacy", "lastModified": 1})),
        ];
        let remote = vec![record(json!({"lastModified": 4}))];
        let report = reconcile_with_report(local, remote, MergeOptions::default());
        assert_eq!(keys(&report.merged), vec!["legacy"]);
        assert_eq!(report.unkeyed_dropped, 2);
    }

    #[test]
    fn numeric_ids_take_part_in_the_merge() {
        let local = vec![record(json!({"id": 7, "lastModified": 5, "name": "Goblin"}))];
        let remote = vec![record(json!({"id": "7", "lastModified": 9, "name": "Goblin King"}))];
        let report = reconcile_with_report(local, Vec::new(), MergeOptions::default());
        assert_eq!(report.merged.len(), 1);
        assert_eq!(report.unkeyed_dropped, 0);

        let merged = reconcile(report.merged, remote, MergeOptions::default());
        assert_eq!(keys(&merged), vec!["7"]);
        assert_eq!(merged[0].get("name"), Some(&json!("Goblin King")));
    }

    #[test]
    fn report_tracks_origins() {
        let local = vec![
            Versioned::new("a", 5, "a-local"),
            Versioned::new("b", 5, "b-local"),
            Versioned::new("d", 1, "d-local").into_tombstone(2),
        ];
        let remote = vec![
            Versioned::new("a", 6, "a-remote"),
            Versioned::new("b", 4, "b-remote"),
            Versioned::new("c", 1, "c-remote"),
        ];
        let report = reconcile_with_report(local, remote, MergeOptions::default());
        assert_eq!(report.accepted_remote, vec!["a".to_string(), "c".to_string()]);
        assert_eq!(report.kept_local, vec!["b".to_string()]);
        assert_eq!(report.tombstones_skipped, 1);
    }

    #[test]
    fn duplicate_remote_versions_resolve_by_lww() {
        let remote = vec![
            Versioned::new("a", 2, "first"),
            Versioned::new("a", 7, "newest"),
            Versioned::new("a", 5, "stale"),
        ];
        let merged = reconcile(Vec::new(), remote, MergeOptions::default());
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].payload, "newest");
    }

    #[test]
    fn idempotent_on_same_input() {
        let x = vec![
            Versioned::new("a", 1, 10),
            Versioned::new("b", 2, 20),
            Versioned::new("c", 3, 30),
        ];
        let merged = reconcile(x.clone(), x.clone(), MergeOptions::default());
        assert_eq!(merged, x);
    }

    #[test]
    fn deduplicate_keeps_first() {
        let items = vec![
            Versioned::new("a", 1, "first"),
            Versioned::new("b", 1, "b"),
            Versioned::new("a", 9, "second"),
        ];
        let deduped = deduplicate(items);
        assert_eq!(deduped.len(), 2);
        assert_eq!(deduped[0].payload, "first");
        assert_eq!(deduped[1].payload, "b");
    }

    #[test]
    fn filter_deleted_is_a_predicate() {
        let items = vec![
            Versioned::new("a", 1, ()),
            Versioned::new("b", 1, ()).into_tombstone(2),
        ];
        assert_eq!(keys(&filter_deleted(items)), vec!["a"]);
    }

    #[test]
    fn works_on_borrowed_entities() {
        let local = vec![Versioned::new("a", 1, "x")];
        let remote = vec![Versioned::new("a", 2, "y")];
        let merged = reconcile(local.iter(), remote.iter(), MergeOptions::default());
        assert_eq!(merged[0].payload, "y");
    }
}

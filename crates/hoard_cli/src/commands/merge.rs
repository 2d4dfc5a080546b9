//! Merge command implementation.

use super::read_records;
use hoard_core::{reconcile_with_report, EntityType, MergeOptions, MergeReport, Record};
use hoard_storage::{FileStore, LocalStore};
use serde::Serialize;
use std::path::Path;
use tracing::info;

/// Flags of the merge command.
#[derive(Debug, Clone, Copy, Default)]
pub struct MergeArgs {
    /// Drop tombstones from both sides before merging. This purges local
    /// deletions from the namespace.
    pub drop_deleted: bool,
    /// Disable last-write-wins.
    pub no_lww: bool,
    /// Do not write the result.
    pub dry_run: bool,
}

impl MergeArgs {
    fn options(self) -> MergeOptions {
        let mut options = MergeOptions::default();
        if !self.drop_deleted {
            options = options.keep_deleted();
        }
        if self.no_lww {
            options = options.without_lww();
        }
        options
    }
}

/// Merge summary.
#[derive(Debug, Serialize)]
pub struct MergeSummary {
    /// Entity type that was merged.
    pub entity_type: String,
    /// Records in the local namespace before the merge.
    pub local: usize,
    /// Records in the remote snapshot.
    pub remote: usize,
    /// Records in the merged result.
    pub merged: usize,
    /// Ids whose remote version was taken.
    pub accepted_remote: Vec<String>,
    /// Ids where both sides existed and the local version was kept.
    pub kept_local: Vec<String>,
    /// Tombstones filtered out.
    pub tombstones_skipped: usize,
    /// Records without an id.
    pub unkeyed_dropped: usize,
    /// Whether the result was written.
    pub written: bool,
}

/// Reconciles the namespace with `remote` and commits unless `dry_run`.
pub fn merge(
    store: &dyn LocalStore,
    entity_type: &EntityType,
    remote: Vec<Record>,
    args: MergeArgs,
) -> Result<MergeSummary, Box<dyn std::error::Error>> {
    let local = store.list_all(entity_type)?;
    let (local_len, remote_len) = (local.len(), remote.len());

    let MergeReport {
        merged,
        accepted_remote,
        kept_local,
        tombstones_skipped,
        unkeyed_dropped,
    } = reconcile_with_report(local, remote, args.options());
    let merged_len = merged.len();

    if !args.dry_run {
        store.replace_all(entity_type, merged)?;
        info!(entity_type = %entity_type, records = merged_len, "merged result written");
    }

    Ok(MergeSummary {
        entity_type: entity_type.to_string(),
        local: local_len,
        remote: remote_len,
        merged: merged_len,
        accepted_remote,
        kept_local,
        tombstones_skipped,
        unkeyed_dropped,
        written: !args.dry_run,
    })
}

/// Runs the merge command.
pub fn run(
    store: &FileStore,
    entity_type: &str,
    remote_path: &Path,
    args: MergeArgs,
    format: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let entity_type = EntityType::new(entity_type)?;
    let remote = read_records(remote_path)?;
    let summary = merge(store, &entity_type, remote, args)?;

    match format {
        "json" => println!("{}", serde_json::to_string_pretty(&summary)?),
        _ => {
            println!("Merge of {}:", summary.entity_type);
            println!("  Local records:      {}", summary.local);
            println!("  Remote records:     {}", summary.remote);
            println!("  Merged records:     {}", summary.merged);
            println!("  Taken from remote:  {}", summary.accepted_remote.len());
            println!("  Kept local:         {}", summary.kept_local.len());
            println!("  Tombstones skipped: {}", summary.tombstones_skipped);
            println!("  Without id:         {}", summary.unkeyed_dropped);
            if !summary.written {
                println!("(dry run - nothing written)");
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use hoard_core::Entity;
    use hoard_storage::InMemoryStore;
    use serde_json::json;

    fn monsters() -> EntityType {
        EntityType::new("monsters").unwrap()
    }

    fn record(value: serde_json::Value) -> Record {
        Record::try_from(value).unwrap()
    }

    fn goblin_store() -> InMemoryStore {
        InMemoryStore::with_records(
            &monsters(),
            vec![record(json!({"id": "g1", "lastModified": 5, "name": "Goblin"}))],
        )
        .unwrap()
    }

    fn remote() -> Vec<Record> {
        vec![
            record(json!({"id": "g1", "lastModified": 9, "name": "Goblin King"})),
            record(json!({"id": "o1", "lastModified": 3, "name": "Orc"})),
            record(json!({"name": "nobody"})),
        ]
    }

    #[test]
    fn merge_writes_result() {
        let store = goblin_store();
        let summary = merge(&store, &monsters(), remote(), MergeArgs::default()).unwrap();

        assert_eq!(summary.merged, 2);
        assert_eq!(summary.accepted_remote, vec!["g1".to_string(), "o1".to_string()]);
        assert_eq!(summary.unkeyed_dropped, 1);
        assert!(summary.written);

        let g1 = store.get(&monsters(), "g1").unwrap().unwrap();
        assert_eq!(g1.last_modified(), 9);
    }

    #[test]
    fn dry_run_leaves_store_alone() {
        let store = goblin_store();
        let args = MergeArgs {
            dry_run: true,
            ..MergeArgs::default()
        };
        let summary = merge(&store, &monsters(), remote(), args).unwrap();

        assert!(!summary.written);
        assert_eq!(store.list_all(&monsters()).unwrap().len(), 1);
    }

    #[test]
    fn local_tombstone_survives_older_remote_version() {
        let store = InMemoryStore::with_records(
            &monsters(),
            vec![record(json!({"id": "g1", "lastModified": 10, "deleted": true}))],
        )
        .unwrap();
        let remote = vec![record(json!({"id": "g1", "lastModified": 5, "name": "Goblin"}))];

        let summary = merge(&store, &monsters(), remote, MergeArgs::default()).unwrap();

        assert_eq!(summary.kept_local, vec!["g1".to_string()]);
        assert_eq!(summary.tombstones_skipped, 0);
        let g1 = store.get(&monsters(), "g1").unwrap().unwrap();
        assert!(g1.is_deleted());
        assert_eq!(g1.last_modified(), 10);
    }

    #[test]
    fn drop_deleted_purges_tombstones() {
        let store = InMemoryStore::with_records(
            &monsters(),
            vec![
                record(json!({"id": "g1", "lastModified": 10, "deleted": true})),
                record(json!({"id": "o1", "lastModified": 2, "name": "Orc"})),
            ],
        )
        .unwrap();
        let args = MergeArgs {
            drop_deleted: true,
            ..MergeArgs::default()
        };

        let summary = merge(&store, &monsters(), Vec::new(), args).unwrap();

        assert_eq!(summary.tombstones_skipped, 1);
        assert!(store.get(&monsters(), "g1").unwrap().is_none());
        assert!(store.get(&monsters(), "o1").unwrap().is_some());
    }

    #[test]
    fn no_lww_keeps_local() {
        let store = goblin_store();
        let args = MergeArgs {
            no_lww: true,
            ..MergeArgs::default()
        };
        let summary = merge(&store, &monsters(), remote(), args).unwrap();

        assert_eq!(summary.kept_local, vec!["g1".to_string()]);
        assert_eq!(
            store.get(&monsters(), "g1").unwrap().unwrap().last_modified(),
            5
        );
    }
}

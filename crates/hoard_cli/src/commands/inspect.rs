//! Inspect command implementation.

use hoard_core::{Entity, EntityType};
use hoard_storage::{FileStore, LocalStore};
use serde::Serialize;

/// Store inspection result.
#[derive(Debug, Serialize)]
pub struct InspectResult {
    /// Store path.
    pub path: String,
    /// Per-entity-type statistics.
    pub entity_types: Vec<TypeStats>,
}

/// Statistics for a single entity type.
#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct TypeStats {
    /// Entity type name.
    pub name: String,
    /// Number of stored records.
    pub records: usize,
    /// Number of live records.
    pub live: usize,
    /// Number of tombstones.
    pub tombstones: usize,
    /// Newest `lastModified` in the namespace.
    pub newest: u64,
}

/// Collects statistics for one or all entity types.
pub fn inspect(
    store: &dyn LocalStore,
    only: Option<&str>,
) -> Result<Vec<TypeStats>, Box<dyn std::error::Error>> {
    let types = match only {
        Some(name) => vec![EntityType::new(name)?],
        None => store.entity_types()?,
    };

    let mut stats = Vec::with_capacity(types.len());
    for entity_type in types {
        let records = store.list_all(&entity_type)?;
        let tombstones = records.iter().filter(|r| r.is_deleted()).count();
        stats.push(TypeStats {
            name: entity_type.to_string(),
            records: records.len(),
            live: records.len() - tombstones,
            tombstones,
            newest: records.iter().map(Entity::last_modified).max().unwrap_or(0),
        });
    }
    Ok(stats)
}

/// Runs the inspect command.
pub fn run(
    store: &FileStore,
    only: Option<&str>,
    format: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let result = InspectResult {
        path: store.path().display().to_string(),
        entity_types: inspect(store, only)?,
    };

    match format {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        _ => print_text_output(&result),
    }

    Ok(())
}

fn print_text_output(result: &InspectResult) {
    println!("Store: {}", result.path);
    println!();

    if result.entity_types.is_empty() {
        println!("(empty)");
        return;
    }

    println!(
        "{:<24} {:>8} {:>8} {:>10} {:>16}",
        "TYPE", "RECORDS", "LIVE", "TOMBSTONES", "NEWEST"
    );
    for t in &result.entity_types {
        println!(
            "{:<24} {:>8} {:>8} {:>10} {:>16}",
            t.name, t.records, t.live, t.tombstones, t.newest
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hoard_core::Record;
    use hoard_storage::InMemoryStore;
    use serde_json::json;

    #[test]
    fn counts_live_and_tombstones() {
        let monsters = EntityType::new("monsters").unwrap();
        let store = InMemoryStore::new();
        store
            .put(&monsters, Record::try_from(json!({"id": "a", "lastModified": 4})).unwrap())
            .unwrap();
        store
            .put(
                &monsters,
                Record::try_from(json!({"id": "b", "lastModified": 9, "deleted": true})).unwrap(),
            )
            .unwrap();

        let stats = inspect(&store, None).unwrap();
        assert_eq!(
            stats,
            vec![TypeStats {
                name: "monsters".into(),
                records: 2,
                live: 1,
                tombstones: 1,
                newest: 9,
            }]
        );
    }

    #[test]
    fn unknown_type_is_empty() {
        let store = InMemoryStore::new();
        let stats = inspect(&store, Some("parties")).unwrap();
        assert_eq!(stats[0].records, 0);
        assert_eq!(stats[0].newest, 0);
    }

    #[test]
    fn invalid_type_name_is_an_error() {
        let store = InMemoryStore::new();
        assert!(inspect(&store, Some("no spaces")).is_err());
    }
}

//! Clear command implementation.

use hoard_core::EntityType;
use hoard_storage::{FileStore, LocalStore};
use tracing::{info, warn};

/// Removes one namespace, or everything when `only` is `None`.
///
/// Returns the number of records that were (or would be) removed.
pub fn clear(
    store: &dyn LocalStore,
    only: Option<&str>,
    confirmed: bool,
) -> Result<usize, Box<dyn std::error::Error>> {
    let types = match only {
        Some(name) => vec![EntityType::new(name)?],
        None => store.entity_types()?,
    };

    let mut count = 0;
    for entity_type in &types {
        count += store.list_all(entity_type)?.len();
    }

    if !confirmed {
        return Ok(count);
    }

    match only {
        Some(_) => {
            for entity_type in &types {
                store.replace_all(entity_type, Vec::new())?;
            }
        }
        None => store.clear()?,
    }
    info!(records = count, "local state cleared");
    Ok(count)
}

/// Runs the clear command.
pub fn run(
    store: &FileStore,
    only: Option<&str>,
    yes: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let count = clear(store, only, yes)?;
    let scope = only.unwrap_or("all entity types");

    if yes {
        println!("Removed {count} records ({scope})");
    } else {
        warn!("nothing removed, pass --yes to confirm");
        println!("Would remove {count} records ({scope})");
    }
    Ok(())
}

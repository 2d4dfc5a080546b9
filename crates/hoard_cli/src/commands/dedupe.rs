//! Dedupe command implementation.

use super::read_records;
use hoard_core::{deduplicate, filter_deleted, Record};
use std::path::Path;
use tracing::info;

/// Deduplicates `records`, optionally dropping tombstones.
pub fn dedupe(records: Vec<Record>, drop_deleted: bool) -> Vec<Record> {
    let unique = deduplicate(records);
    if drop_deleted {
        filter_deleted(unique)
    } else {
        unique
    }
}

/// Runs the dedupe command.
pub fn run(input: &Path, drop_deleted: bool) -> Result<(), Box<dyn std::error::Error>> {
    let records = read_records(input)?;
    let before = records.len();
    let result = dedupe(records, drop_deleted);
    info!(before, after = result.len(), "deduplicated");
    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}

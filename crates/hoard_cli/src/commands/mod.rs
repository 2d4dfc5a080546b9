//! CLI command implementations.

pub mod clear;
pub mod dedupe;
pub mod inspect;
pub mod merge;

use hoard_core::Record;
use std::path::Path;

/// Reads a JSON array of records from a file.
pub fn read_records(path: &Path) -> Result<Vec<Record>, Box<dyn std::error::Error>> {
    let bytes = std::fs::read(path).map_err(|e| format!("Cannot read {}: {e}", path.display()))?;
    let records: Vec<Record> = serde_json::from_slice(&bytes)?;
    Ok(records)
}

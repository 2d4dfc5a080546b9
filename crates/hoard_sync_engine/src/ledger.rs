//! Acknowledgement ledger.

use hoard_core::{Entity, Record};
use std::collections::HashMap;

/// Tracks the highest `lastModified` the remote is known to hold, per id.
///
/// A record needs pushing only if its local version is strictly newer than
/// the acknowledged one. Records that were just pulled are therefore never
/// pushed back.
#[derive(Debug, Default, Clone)]
pub struct AckLedger {
    acked: HashMap<String, u64>,
}

impl AckLedger {
    /// Creates an empty ledger.
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds a ledger from a remote snapshot.
    pub fn from_snapshot(snapshot: &[Record]) -> Self {
        let mut ledger = Self::new();
        for record in snapshot {
            if let Some(key) = record.key() {
                ledger.acknowledge(&key, record.last_modified());
            }
        }
        ledger
    }

    /// Records that the remote holds `id` at `last_modified`.
    ///
    /// Older acknowledgements never lower the stored version.
    pub fn acknowledge(&mut self, id: &str, last_modified: u64) {
        let entry = self.acked.entry(id.to_string()).or_insert(last_modified);
        if *entry < last_modified {
            *entry = last_modified;
        }
    }

    /// Returns the acknowledged version of `id`.
    pub fn acknowledged(&self, id: &str) -> Option<u64> {
        self.acked.get(id).copied()
    }

    /// Returns true if `record` is newer than what the remote holds.
    pub fn needs_push(&self, record: &Record) -> bool {
        match record.key() {
            Some(key) => match self.acknowledged(&key) {
                Some(acked) => record.last_modified() > acked,
                None => true,
            },
            None => false,
        }
    }

    /// Returns the records in `merged` that must be pushed, in order.
    pub fn pending<'a>(&self, merged: &'a [Record]) -> Vec<&'a Record> {
        merged.iter().filter(|r| self.needs_push(r)).collect()
    }

    /// Number of tracked ids.
    pub fn len(&self) -> usize {
        self.acked.len()
    }

    /// Returns true if nothing is tracked.
    pub fn is_empty(&self) -> bool {
        self.acked.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(id: &str, lm: u64) -> Record {
        Record::try_from(json!({"id": id, "lastModified": lm})).unwrap()
    }

    #[test]
    fn pulled_records_are_not_pending() {
        let snapshot = vec![record("a", 5), record("b", 7)];
        let ledger = AckLedger::from_snapshot(&snapshot);
        assert_eq!(ledger.len(), 2);
        assert!(ledger.pending(&snapshot).is_empty());
    }

    #[test]
    fn newer_and_unknown_records_are_pending() {
        let ledger = AckLedger::from_snapshot(&[record("a", 5)]);
        let merged = vec![record("a", 6), record("c", 1), record("a", 5)];
        let pending: Vec<_> = ledger.pending(&merged).into_iter().cloned().collect();
        assert_eq!(pending, vec![record("a", 6), record("c", 1)]);
    }

    #[test]
    fn acknowledge_never_goes_backwards() {
        let mut ledger = AckLedger::new();
        ledger.acknowledge("a", 9);
        ledger.acknowledge("a", 3);
        assert_eq!(ledger.acknowledged("a"), Some(9));
        assert!(!ledger.needs_push(&record("a", 9)));
    }

    #[test]
    fn unkeyed_records_are_never_pending() {
        let ledger = AckLedger::new();
        let nameless = Record::try_from(json!({"lastModified": 4})).unwrap();
        assert!(!ledger.needs_push(&nameless));
        assert!(ledger.is_empty());
    }
}

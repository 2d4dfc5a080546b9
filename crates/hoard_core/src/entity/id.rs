//! Entity identifier generation.

use std::sync::atomic::{AtomicU64, Ordering};
use uuid::Uuid;

/// Produces identifiers for newly created entities.
///
/// Identifiers are:
/// - Globally unique across replicas
/// - Immutable once assigned
/// - Never reused
///
/// Generators are passed in explicitly so tests can use deterministic ids.
pub trait IdGenerator: Send + Sync {
    /// Returns a fresh identifier.
    fn next_id(&self) -> String;
}

/// Random v4 UUIDs.
#[derive(Debug, Clone, Copy, Default)]
pub struct UuidGenerator;

impl IdGenerator for UuidGenerator {
    fn next_id(&self) -> String {
        Uuid::new_v4().to_string()
    }
}

/// Deterministic `prefix-N` identifiers, counting from 1.
#[derive(Debug)]
pub struct SequentialIdGenerator {
    prefix: String,
    next: AtomicU64,
}

impl SequentialIdGenerator {
    /// Creates a generator producing `prefix-1`, `prefix-2`, ...
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            next: AtomicU64::new(1),
        }
    }
}

impl IdGenerator for SequentialIdGenerator {
    fn next_id(&self) -> String {
        let n = self.next.fetch_add(1, Ordering::SeqCst);
        format!("{}-{}", self.prefix, n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uuid_ids_are_unique() {
        let id1 = UuidGenerator.next_id();
        let id2 = UuidGenerator.next_id();
        assert_ne!(id1, id2);
        assert!(Uuid::parse_str(&id1).is_ok());
    }

    #[test]
    fn sequential_ids() {
        let ids = SequentialIdGenerator::new("monster");
        assert_eq!(ids.next_id(), "monster-1");
        assert_eq!(ids.next_id(), "monster-2");
    }
}

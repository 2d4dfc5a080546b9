//! Untyped records: flat attribute maps.

use crate::clock::Clock;
use crate::entity::{Entity, IdGenerator};
use crate::error::{CoreError, CoreResult};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::borrow::Cow;

/// Primary identifier field.
pub const ID_FIELD: &str = "id";
/// Identifier field written by older clients; consulted when `id` is absent.
pub const LEGACY_ID_FIELD: &str = "_id";
/// Modification timestamp field.
pub const LAST_MODIFIED_FIELD: &str = "lastModified";
/// Tombstone flag field.
pub const DELETED_FIELD: &str = "deleted";

const RESERVED_FIELDS: [&str; 4] = [ID_FIELD, LEGACY_ID_FIELD, LAST_MODIFIED_FIELD, DELETED_FIELD];

/// An entity stored as a flat attribute map.
///
/// This is the persisted and wire representation of every entity. Domain
/// fields are kept verbatim; only `id`/`_id`, `lastModified` and `deleted`
/// have meaning to hoard. Serialization is transparent, so a record
/// round-trips as the JSON object it was built from.
///
/// # Example
///
/// ```rust
/// use hoard_core::{Entity, ManualClock, Record, SequentialIdGenerator};
/// use serde_json::json;
///
/// let clock = ManualClock::new(100);
/// let mut monster = Record::create(&SequentialIdGenerator::new("m"), &clock);
/// monster.set("name", json!("Owlbear"), &clock).unwrap();
///
/// assert_eq!(monster.key().as_deref(), Some("m-1"));
/// assert_eq!(monster.last_modified(), 101);
/// ```
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record(Map<String, Value>);

impl Record {
    /// Creates a new live record with a fresh id, stamped with `clock`.
    pub fn create(ids: &dyn IdGenerator, clock: &dyn Clock) -> Self {
        let mut map = Map::new();
        map.insert(ID_FIELD.into(), Value::String(ids.next_id()));
        map.insert(LAST_MODIFIED_FIELD.into(), Value::from(clock.now_millis()));
        map.insert(DELETED_FIELD.into(), Value::Bool(false));
        Self(map)
    }

    /// Wraps an existing attribute map without validation.
    #[must_use]
    pub fn from_map(map: Map<String, Value>) -> Self {
        Self(map)
    }

    /// Returns the attribute map.
    #[must_use]
    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    /// Consumes the record, returning the attribute map.
    #[must_use]
    pub fn into_map(self) -> Map<String, Value> {
        self.0
    }

    /// Returns a field value.
    #[must_use]
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    /// Sets a domain field and stamps the record.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::ReservedField`] for `id`, `_id`, `lastModified`
    /// and `deleted`; use [`Record::tombstone`] to delete.
    pub fn set(&mut self, field: &str, value: Value, clock: &dyn Clock) -> CoreResult<()> {
        if RESERVED_FIELDS.contains(&field) {
            return Err(CoreError::ReservedField {
                field: field.to_string(),
            });
        }
        self.0.insert(field.to_string(), value);
        self.touch(clock);
        Ok(())
    }

    /// Removes a domain field and stamps the record.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::ReservedField`] for reserved fields.
    pub fn remove(&mut self, field: &str, clock: &dyn Clock) -> CoreResult<Option<Value>> {
        if RESERVED_FIELDS.contains(&field) {
            return Err(CoreError::ReservedField {
                field: field.to_string(),
            });
        }
        let previous = self.0.remove(field);
        self.touch(clock);
        Ok(previous)
    }

    /// Marks the record deleted. The record stays in the collection.
    pub fn tombstone(&mut self, clock: &dyn Clock) {
        self.0.insert(DELETED_FIELD.into(), Value::Bool(true));
        self.touch(clock);
    }

    /// Stamps `lastModified`, never moving it backwards.
    pub fn touch(&mut self, clock: &dyn Clock) {
        let stamp = clock.now_millis().max(self.last_modified().saturating_add(1));
        self.0.insert(LAST_MODIFIED_FIELD.into(), Value::from(stamp));
    }

    /// Deserializes the record into a typed entity.
    ///
    /// A legacy `_id` is promoted to `id` when `id` is absent.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Serialization`] if the map doesn't fit `T`.
    pub fn to_entity<T: DeserializeOwned>(&self) -> CoreResult<T> {
        let mut map = self.0.clone();
        if !map.contains_key(ID_FIELD) {
            if let Some(legacy) = map.remove(LEGACY_ID_FIELD) {
                map.insert(ID_FIELD.into(), legacy);
            }
        }
        Ok(serde_json::from_value(Value::Object(map))?)
    }

    /// Serializes a typed entity into a record.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::NotAnObject`] if `entity` doesn't serialize to a
    /// JSON object.
    pub fn from_entity<T: Serialize>(entity: &T) -> CoreResult<Self> {
        Self::try_from(serde_json::to_value(entity)?)
    }
}

impl Entity for Record {
    fn key(&self) -> Option<Cow<'_, str>> {
        usable_id(self.0.get(ID_FIELD)).or_else(|| usable_id(self.0.get(LEGACY_ID_FIELD)))
    }

    fn last_modified(&self) -> u64 {
        match self.0.get(LAST_MODIFIED_FIELD) {
            Some(Value::Number(n)) => n
                .as_u64()
                .or_else(|| n.as_f64().filter(|f| *f > 0.0).map(|f| f as u64))
                .unwrap_or(0),
            _ => 0,
        }
    }

    fn is_deleted(&self) -> bool {
        self.0
            .get(DELETED_FIELD)
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }
}

/// Strings key as-is (empty strings are unusable); numbers key by their
/// textual form.
fn usable_id(value: Option<&Value>) -> Option<Cow<'_, str>> {
    match value? {
        Value::String(id) if !id.is_empty() => Some(Cow::Borrowed(id.as_str())),
        Value::Number(n) => Some(Cow::Owned(n.to_string())),
        _ => None,
    }
}

impl TryFrom<Value> for Record {
    type Error = CoreError;

    fn try_from(value: Value) -> CoreResult<Self> {
        match value {
            Value::Object(map) => Ok(Self(map)),
            Value::Null => Err(CoreError::NotAnObject { found: "null" }),
            Value::Bool(_) => Err(CoreError::NotAnObject { found: "boolean" }),
            Value::Number(_) => Err(CoreError::NotAnObject { found: "number" }),
            Value::String(_) => Err(CoreError::NotAnObject { found: "string" }),
            Value::Array(_) => Err(CoreError::NotAnObject { found: "array" }),
        }
    }
}

impl From<Record> for Value {
    fn from(record: Record) -> Self {
        Value::Object(record.0)
    }
}

//! Conversion between flat records and stored entities.
//!
//! Writing expands a [`Record`] into an explicit property list and decides
//! per property whether it is excluded from indexing. Reading flattens the
//! property list back into a record and re-synthesizes the id property
//! from the key.

use crate::key_codec::identifier_value;
use kindstore_model::{Key, OneOrMany, Property, Record, StoredEntity, Value};
use std::collections::BTreeSet;

/// Largest value, in bytes, the store accepts in an indexed property.
pub const INDEX_SIZE_LIMIT: usize = 1500;

/// Whether `value` is too large to be stored as an indexed property.
///
/// Strings and blobs are measured by byte length. Arrays and maps are
/// oversized when any value nested inside them is. Scalars and keys never are.
pub fn exceeds_index_limit(value: &Value) -> bool {
    match value {
        Value::String(s) => s.len() > INDEX_SIZE_LIMIT,
        Value::Blob(bytes) => bytes.len() > INDEX_SIZE_LIMIT,
        Value::Array(items) => items.iter().any(exceeds_index_limit),
        Value::Map(map) => map.values().any(exceeds_index_limit),
        Value::Null | Value::Boolean(_) | Value::Integer(_) | Value::Double(_) | Value::Key(_) => {
            false
        }
    }
}

/// Per-write indexing options.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExpandOptions {
    /// Properties always excluded from indexing.
    pub dont_index: BTreeSet<String>,
    /// Exclude any property that [`exceeds_index_limit`].
    pub auto_index: bool,
}

impl ExpandOptions {
    pub fn new<I, S>(dont_index: I, auto_index: bool) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            dont_index: dont_index.into_iter().map(Into::into).collect(),
            auto_index,
        }
    }

    fn excludes(&self, name: &str, value: &Value) -> bool {
        self.dont_index.contains(name) || (self.auto_index && exceeds_index_limit(value))
    }
}

/// Converts records to and from stored entities.
#[derive(Debug, Clone)]
pub struct EntityCodec {
    id_field: String,
}

impl EntityCodec {
    pub fn new(id_field: impl Into<String>) -> Self {
        Self {
            id_field: id_field.into(),
        }
    }

    /// Name of the record property that carries the key's identifier.
    pub fn id_field(&self) -> &str {
        &self.id_field
    }

    /// Expands `record` into an entity stored under `key`.
    ///
    /// The id property is skipped: it lives in the key.
    pub fn expand(&self, key: Key, record: &Record, options: &ExpandOptions) -> StoredEntity {
        let properties = record
            .iter()
            .filter(|(name, _)| **name != self.id_field)
            .map(|(name, value)| Property {
                name: name.clone(),
                value: value.clone(),
                exclude_from_index: options.excludes(name, value),
            })
            .collect();
        StoredEntity::new(key, properties)
    }

    /// Expands one or many `(key, record)` pairs, keeping the input shape.
    pub fn expand_all(
        &self,
        items: OneOrMany<(Key, Record)>,
        options: &ExpandOptions,
    ) -> OneOrMany<StoredEntity> {
        items.map(|(key, record)| self.expand(key, &record, options))
    }

    /// Flattens an entity into a record and injects the id property.
    ///
    /// An incomplete key contributes no id.
    pub fn flatten(&self, entity: &StoredEntity) -> Record {
        let mut record: Record = entity
            .properties
            .iter()
            .map(|p| (p.name.clone(), p.value.clone()))
            .collect();
        if let Some(id) = entity.key.id() {
            record.insert(self.id_field.clone(), identifier_value(id));
        }
        record
    }

    /// Flattens an optional entity; absence stays absence.
    pub fn flatten_opt(&self, entity: Option<&StoredEntity>) -> Option<Record> {
        entity.map(|e| self.flatten(e))
    }

    /// Flattens a batch, preserving order.
    pub fn flatten_all(&self, entities: &[StoredEntity]) -> Vec<Record> {
        entities.iter().map(|e| self.flatten(e)).collect()
    }

    /// Keeps only `fields` plus the id property.
    pub fn project(&self, mut record: Record, fields: &[String]) -> Record {
        record.retain(|name, _| *name == self.id_field || fields.iter().any(|f| f == name));
        record
    }
}

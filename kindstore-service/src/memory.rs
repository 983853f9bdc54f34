//! In-process [`Datastore`] implementation.
//!
//! Behaves like a hierarchical entity store for the operations the record
//! service uses: numeric id allocation, strict insert and update, the
//! indexed-property size limit, and queries that only see indexed
//! properties. Every batch write validates all entities before applying any.

use crate::error::{StoreError, StoreResult};
use crate::store::Datastore;
use async_trait::async_trait;
use kindstore_codec::{INDEX_SIZE_LIMIT, KEY_PROPERTY, NativeQuery, PropertyFilter, exceeds_index_limit};
use kindstore_model::{Identifier, Key, Property, StoredEntity, Value};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicI64, Ordering};
use tokio::sync::RwLock;
use tracing::debug;

type Table = BTreeMap<Key, Vec<Property>>;

/// An ordered in-memory entity store.
pub struct MemoryDatastore {
    entities: RwLock<Table>,
    next_id: AtomicI64,
}

impl MemoryDatastore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self {
            entities: RwLock::new(BTreeMap::new()),
            next_id: AtomicI64::new(1),
        }
    }

    /// Number of stored entities.
    pub async fn len(&self) -> usize {
        self.entities.read().await.len()
    }

    /// Whether the store holds no entities.
    pub async fn is_empty(&self) -> bool {
        self.entities.read().await.is_empty()
    }

    /// Returns every stored entity in key order.
    pub async fn snapshot(&self) -> Vec<StoredEntity> {
        self.entities
            .read()
            .await
            .iter()
            .map(|(key, properties)| StoredEntity::new(key.clone(), properties.clone()))
            .collect()
    }

    /// Allocates an unused numeric id for an incomplete key.
    fn complete(&self, table: &Table, key: Key) -> Key {
        if key.is_complete() {
            return key;
        }
        loop {
            let id = self.next_id.fetch_add(1, Ordering::Relaxed);
            let mut candidate = key.clone();
            candidate.complete_with(Identifier::Id(id));
            if !table.contains_key(&candidate) {
                return candidate;
            }
        }
    }
}

impl Default for MemoryDatastore {
    fn default() -> Self {
        Self::new()
    }
}

/// Rejects keys with missing ancestor ids and oversized indexed values.
fn validate(entity: &StoredEntity) -> StoreResult<()> {
    let ancestors = entity.key.path.len().saturating_sub(1);
    if entity.key.path.is_empty() || entity.key.path[..ancestors].iter().any(|e| e.id.is_none()) {
        return Err(StoreError::IncompleteKey(entity.key.to_string()));
    }
    for property in entity.properties.iter().filter(|p| !p.exclude_from_index) {
        if exceeds_index_limit(&property.value) {
            return Err(StoreError::IndexSizeExceeded {
                property: property.name.clone(),
                size: largest_leaf(&property.value),
                limit: INDEX_SIZE_LIMIT,
            });
        }
    }
    Ok(())
}

/// Byte length of the largest string or blob inside `value`.
fn largest_leaf(value: &Value) -> usize {
    match value {
        Value::String(s) => s.len(),
        Value::Blob(bytes) => bytes.len(),
        Value::Array(items) => items.iter().map(largest_leaf).max().unwrap_or(0),
        Value::Map(map) => map.values().map(largest_leaf).max().unwrap_or(0),
        _ => 0,
    }
}

fn satisfies(value: &Value, filter: &PropertyFilter) -> bool {
    value
        .compare(&filter.value)
        .is_some_and(|ordering| filter.op.accepts(ordering))
}

/// Evaluates one filter. Unindexed or missing properties never match;
/// array properties match when any element does.
fn matches_filter(key: &Key, properties: &[Property], filter: &PropertyFilter) -> bool {
    if filter.property == KEY_PROPERTY {
        return satisfies(&Value::Key(key.clone()), filter);
    }
    properties
        .iter()
        .find(|p| p.name == filter.property && !p.exclude_from_index)
        .is_some_and(|p| match &p.value {
            Value::Array(items) => items.iter().any(|item| satisfies(item, filter)),
            value => satisfies(value, filter),
        })
}

fn matches_query(key: &Key, properties: &[Property], query: &NativeQuery) -> bool {
    key.namespace == query.namespace
        && key.kind() == Some(query.kind.as_str())
        && query.ancestor.as_ref().is_none_or(|ancestor| key.has_ancestor(ancestor))
        && query
            .filters
            .iter()
            .all(|filter| matches_filter(key, properties, filter))
}

#[async_trait]
impl Datastore for MemoryDatastore {
    async fn get(&self, key: &Key) -> StoreResult<Option<StoredEntity>> {
        let table = self.entities.read().await;
        Ok(table
            .get(key)
            .map(|properties| StoredEntity::new(key.clone(), properties.clone())))
    }

    async fn insert(&self, entities: &[StoredEntity]) -> StoreResult<Vec<Key>> {
        let mut table = self.entities.write().await;
        for (i, entity) in entities.iter().enumerate() {
            validate(entity)?;
            let key = &entity.key;
            let repeated = entities[..i].iter().any(|other| other.key == *key);
            if key.is_complete() && (table.contains_key(key) || repeated) {
                return Err(StoreError::AlreadyExists(key.to_string()));
            }
        }

        let mut keys = Vec::with_capacity(entities.len());
        for entity in entities {
            let key = self.complete(&table, entity.key.clone());
            table.insert(key.clone(), entity.properties.clone());
            keys.push(key);
        }
        debug!(count = keys.len(), "Inserted entities");
        Ok(keys)
    }

    async fn update(&self, entities: &[StoredEntity]) -> StoreResult<()> {
        let mut table = self.entities.write().await;
        for entity in entities {
            validate(entity)?;
            if !table.contains_key(&entity.key) {
                return Err(StoreError::NoEntityToUpdate(entity.key.to_string()));
            }
        }
        for entity in entities {
            table.insert(entity.key.clone(), entity.properties.clone());
        }
        debug!(count = entities.len(), "Updated entities");
        Ok(())
    }

    async fn upsert(&self, entities: &[StoredEntity]) -> StoreResult<Vec<Key>> {
        let mut table = self.entities.write().await;
        for entity in entities {
            validate(entity)?;
        }
        let mut keys = Vec::with_capacity(entities.len());
        for entity in entities {
            let key = self.complete(&table, entity.key.clone());
            table.insert(key.clone(), entity.properties.clone());
            keys.push(key);
        }
        debug!(count = keys.len(), "Upserted entities");
        Ok(keys)
    }

    async fn delete(&self, keys: &[Key]) -> StoreResult<()> {
        let mut table = self.entities.write().await;
        for key in keys {
            table.remove(key);
        }
        debug!(count = keys.len(), "Deleted entities");
        Ok(())
    }

    async fn run_query(&self, query: &NativeQuery) -> StoreResult<Vec<StoredEntity>> {
        let table = self.entities.read().await;
        let results: Vec<StoredEntity> = table
            .iter()
            .filter(|(key, properties)| matches_query(key, properties, query))
            .map(|(key, properties)| {
                let properties = match &query.projection {
                    Some(fields) => properties
                        .iter()
                        .filter(|p| fields.contains(&p.name))
                        .cloned()
                        .collect(),
                    None => properties.clone(),
                };
                StoredEntity::new(key.clone(), properties)
            })
            .collect();
        debug!(kind = %query.kind, count = results.len(), "Ran query");
        Ok(results)
    }
}

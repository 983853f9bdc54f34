use crate::{Key, Value};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// The application-facing record: a flat map of property name to value.
///
/// The record's id lives under a configurable property name and is always
/// derived from the entity key, never stored as a property.
pub type Record = BTreeMap<String, Value>;

/// Builds a [`Record`] from a JSON object. Returns `None` for any other
/// JSON shape.
#[must_use]
pub fn record_from_json(json: serde_json::Value) -> Option<Record> {
    match Value::from(json) {
        Value::Map(map) => Some(map),
        _ => None,
    }
}

/// A single named property of a stored entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Property {
    pub name: String,
    pub value: Value,
    /// Unindexed properties are stored but cannot be used in filters.
    #[serde(default)]
    pub exclude_from_index: bool,
}

impl Property {
    /// Creates an indexed property.
    pub fn indexed(name: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            exclude_from_index: false,
        }
    }

    /// Creates a property excluded from indexing.
    pub fn unindexed(name: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            exclude_from_index: true,
        }
    }
}

/// The store-native unit: a key plus an explicit property list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredEntity {
    pub key: Key,
    pub properties: Vec<Property>,
}

impl StoredEntity {
    #[must_use]
    pub const fn new(key: Key, properties: Vec<Property>) -> Self {
        Self { key, properties }
    }

    /// Looks up a property by name.
    #[must_use]
    pub fn property(&self, name: &str) -> Option<&Property> {
        self.properties.iter().find(|p| p.name == name)
    }

    /// Looks up a property value by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.property(name).map(|p| &p.value)
    }

    /// Whether the named property exists and is excluded from indexing.
    #[must_use]
    pub fn is_unindexed(&self, name: &str) -> bool {
        self.property(name).is_some_and(|p| p.exclude_from_index)
    }
}

/// Either a single item or a sequence of items.
///
/// Write operations accept both shapes and answer in the shape they were
/// given.
#[derive(Debug, Clone, PartialEq)]
pub enum OneOrMany<T> {
    One(T),
    Many(Vec<T>),
}

impl<T> OneOrMany<T> {
    /// Applies `f` to every item while keeping the shape.
    pub fn map<U>(self, mut f: impl FnMut(T) -> U) -> OneOrMany<U> {
        match self {
            Self::One(item) => OneOrMany::One(f(item)),
            Self::Many(items) => OneOrMany::Many(items.into_iter().map(f).collect()),
        }
    }

    /// Flattens into a vector, losing the shape.
    #[must_use]
    pub fn into_vec(self) -> Vec<T> {
        match self {
            Self::One(item) => vec![item],
            Self::Many(items) => items,
        }
    }

    /// Borrows the items as a slice.
    #[must_use]
    pub fn as_slice(&self) -> &[T] {
        match self {
            Self::One(item) => std::slice::from_ref(item),
            Self::Many(items) => items,
        }
    }

    /// Mutably borrows the items as a slice.
    pub fn as_mut_slice(&mut self) -> &mut [T] {
        match self {
            Self::One(item) => std::slice::from_mut(item),
            Self::Many(items) => items,
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::One(_) => 1,
            Self::Many(items) => items.len(),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the single item, if this is `One`.
    #[must_use]
    pub fn one(self) -> Option<T> {
        match self {
            Self::One(item) => Some(item),
            Self::Many(_) => None,
        }
    }
}

impl<T> From<Vec<T>> for OneOrMany<T> {
    fn from(items: Vec<T>) -> Self {
        Self::Many(items)
    }
}

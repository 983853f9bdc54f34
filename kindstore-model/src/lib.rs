//! Core data model for kindstore.
//!
//! Defines the types shared by the codecs and the record service:
//! - [`Key`]: hierarchical `(kind, identifier)` path with an optional namespace
//! - [`Value`]: property values, including nested arrays, maps and keys
//! - [`StoredEntity`]: the store-native entity with per-property index flags
//! - [`Record`]: the flat application-facing record
//! - [`OneOrMany`]: single-vs-batch shape for write operations

mod entity;
mod key;
mod value;

pub use entity::{OneOrMany, Property, Record, StoredEntity, record_from_json};
pub use key::{Identifier, Key, PathElement};
pub use value::Value;

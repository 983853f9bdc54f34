//! Translation layer between flat application records and a hierarchical,
//! schemaless entity store.
//!
//! # Components
//!
//! - **KeyCodec**: resolves identifiers, path arrays and explicit keys into store keys
//! - **EntityCodec**: expands records into property lists with index-exclusion
//!   flags and flattens entities back into records
//! - **QueryTranslator**: parses filter queries and emits store-native comparisons
//!
//! All codecs are pure and configured once; they hold no per-call state.
//!
//! # Example
//!
//! ```
//! use kindstore_codec::{EntityCodec, ExpandOptions, KeyCodec};
//! use kindstore_model::{Record, Value};
//!
//! let keys = KeyCodec::new("User", None);
//! let entities = EntityCodec::new("id");
//!
//! let key = keys.make_key(Some(&Value::from("42")), None, None);
//! let mut record = Record::new();
//! record.insert("name".into(), Value::from("Bob"));
//!
//! let entity = entities.expand(key, &record, &ExpandOptions::default());
//! let flat = entities.flatten(&entity);
//! assert_eq!(flat["id"], Value::Integer(42));
//! assert_eq!(flat["name"], Value::from("Bob"));
//! ```

mod entity_codec;
mod error;
mod key_codec;
mod query;

pub use entity_codec::{EntityCodec, ExpandOptions, INDEX_SIZE_LIMIT, exceeds_index_limit};
pub use error::{QueryError, QueryResult};
pub use key_codec::{KeyCodec, identifier_from_value, identifier_value, parse_identifier};
pub use query::{
    CompareOp, FieldFilter, FilterValue, KEY_PROPERTY, NativeQuery, PropertyFilter, Query,
    QueryTranslator,
};

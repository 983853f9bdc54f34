//! CRUD and query service for a hierarchical, schemaless entity store.
//!
//! Exposes find/get/create/update/patch/remove over flat records while the
//! store works with keyed entities whose properties are individually
//! indexed or excluded from indexing.
//!
//! # Architecture
//!
//! - [`Datastore`] is the seam to the actual store client
//! - [`MemoryDatastore`] is an in-process store for tests and embedding
//! - [`RecordService`] orchestrates key resolution, record expansion and
//!   flattening, query translation, and the read-modify-write steps the
//!   store has no primitive for (patch, query-scoped remove, upsert)
//!
//! # Example
//!
//! ```
//! use kindstore_codec::Query;
//! use kindstore_model::{OneOrMany, Record, Value};
//! use kindstore_service::{MemoryDatastore, RecordService, Records, ServiceConfig};
//! use std::sync::Arc;
//!
//! # tokio_test_block_on(async {
//! let service = RecordService::new(Arc::new(MemoryDatastore::new()), ServiceConfig::new("User"));
//!
//! let mut bob = Record::new();
//! bob.insert("id".into(), Value::from("Bob"));
//! bob.insert("age".into(), Value::from(44));
//! service.create(OneOrMany::One(bob), &Query::new()).await.unwrap();
//!
//! let found = service.get(&Value::from("Bob"), &Query::new()).await.unwrap();
//! assert_eq!(found["age"], Value::Integer(44));
//! # });
//! # fn tokio_test_block_on<F: std::future::Future>(f: F) -> F::Output {
//! #     tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(f)
//! # }
//! ```

mod config;
mod error;
mod memory;
mod service;
mod store;

pub use config::ServiceConfig;
pub use error::{ServiceError, ServiceResult, StoreError, StoreResult};
pub use memory::MemoryDatastore;
pub use service::{DirectRecords, RecordService, Records};
pub use store::Datastore;

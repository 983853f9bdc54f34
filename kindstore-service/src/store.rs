//! Store client abstraction.
//!
//! Defines the primitive operations the record service needs from a
//! hierarchical entity store. Network clients, authentication and
//! consistency guarantees belong to the implementation.

use crate::error::StoreResult;
use async_trait::async_trait;
use kindstore_codec::NativeQuery;
use kindstore_model::{Key, StoredEntity};

/// Abstract entity store interface.
///
/// Batch writes are a single call; implementations decide how atomic that
/// call is. Keys with an incomplete last element are completed by the
/// store on `insert` and `upsert`, and the final keys are returned in
/// input order.
#[async_trait]
pub trait Datastore: Send + Sync {
    /// Fetches one entity. A missing key is `Ok(None)`, not an error.
    async fn get(&self, key: &Key) -> StoreResult<Option<StoredEntity>>;

    /// Strict insert. Fails with `AlreadyExists` if any complete key is taken.
    async fn insert(&self, entities: &[StoredEntity]) -> StoreResult<Vec<Key>>;

    /// Strict update. Fails with `NoEntityToUpdate` if any key is missing.
    async fn update(&self, entities: &[StoredEntity]) -> StoreResult<()>;

    /// Creates or overwrites every entity.
    async fn upsert(&self, entities: &[StoredEntity]) -> StoreResult<Vec<Key>>;

    /// Deletes every key. Missing keys are ignored.
    async fn delete(&self, keys: &[Key]) -> StoreResult<()>;

    /// Runs a query. Results for an ancestor query include the ancestor
    /// itself when it matches the remaining filters.
    async fn run_query(&self, query: &NativeQuery) -> StoreResult<Vec<StoredEntity>>;
}

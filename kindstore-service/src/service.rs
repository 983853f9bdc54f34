//! Record service: CRUD over a hierarchical entity store.
//!
//! The service composes the key, entity and query codecs with a
//! [`Datastore`] client. It keeps no cache; every call builds fresh keys
//! and entities and the store is the only source of truth.
//!
//! Two surfaces are exposed:
//! - [`Records`], the public interface, implemented by [`RecordService`]
//!   with logging around every call
//! - [`DirectRecords`], obtained from [`RecordService::direct`], which runs
//!   the same operations without the wrapper. `patch` and `remove` use it
//!   for their read phase.
//!
//! # Consistency
//!
//! `patch` and `remove` read and write in separate store calls. A writer
//! touching the same keys between the two calls races with them and the
//! last write wins. Within one call, a batch is a single store request and
//! is exactly as atomic as the store makes it.

use crate::config::ServiceConfig;
use crate::error::{ServiceError, ServiceResult, StoreError};
use crate::store::Datastore;
use async_trait::async_trait;
use kindstore_codec::{EntityCodec, ExpandOptions, KeyCodec, Query, QueryTranslator};
use kindstore_model::{Key, OneOrMany, Record, StoredEntity, Value};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// The public record operations.
#[async_trait]
pub trait Records: Send + Sync {
    /// Returns every record matching `query`.
    async fn find(&self, query: &Query) -> ServiceResult<Vec<Record>>;

    /// Returns one record, or `NotFound`.
    async fn get(&self, id: &Value, query: &Query) -> ServiceResult<Record>;

    /// Creates one or many records in a single store call.
    async fn create(&self, data: OneOrMany<Record>, query: &Query) -> ServiceResult<OneOrMany<Record>>;

    /// Replaces a record. Upserts when `query.create` is set.
    async fn update(&self, id: &Value, data: Record, query: &Query) -> ServiceResult<Record>;

    /// Merges `data` into the record `id`, or into every record matching
    /// `query` when no id is given.
    async fn patch(
        &self,
        id: Option<&Value>,
        data: Record,
        query: &Query,
    ) -> ServiceResult<OneOrMany<Record>>;

    /// Deletes the record `id`, or every record matching `query`, and
    /// returns what was deleted.
    async fn remove(&self, id: Option<&Value>, query: &Query) -> ServiceResult<OneOrMany<Record>>;
}

/// CRUD orchestrator over a [`Datastore`].
pub struct RecordService<S: Datastore + ?Sized> {
    store: Arc<S>,
    config: ServiceConfig,
    keys: KeyCodec,
    entities: EntityCodec,
    queries: QueryTranslator,
}

impl<S: Datastore + ?Sized> RecordService<S> {
    /// Creates a service over `store`.
    pub fn new(store: Arc<S>, config: ServiceConfig) -> Self {
        let keys = KeyCodec::new(config.kind.clone(), config.namespace.clone());
        let entities = EntityCodec::new(config.id_field.clone());
        let queries = QueryTranslator::new(keys.clone(), config.id_field.clone());
        info!(kind = %config.kind, namespace = ?config.namespace, "Record service ready");
        Self {
            store,
            config,
            keys,
            entities,
            queries,
        }
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    /// The underlying store client.
    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Unwrapped access to the record operations.
    pub fn direct(&self) -> DirectRecords<'_, S> {
        DirectRecords { service: self }
    }

    fn kind_for<'a>(&'a self, query: &'a Query) -> &'a str {
        query.kind.as_deref().unwrap_or(&self.config.kind)
    }

    fn ancestor_key(&self, query: &Query) -> Option<Key> {
        query.ancestor.as_ref().map(|ancestor| {
            self.keys
                .make_key(Some(ancestor), query.kind.as_deref(), query.namespace.as_deref())
        })
    }

    /// Resolves the key for `id`, nested under the query's ancestor if any.
    fn resolve_key(&self, id: Option<&Value>, query: &Query) -> Key {
        self.keys.make_nested_key(
            self.ancestor_key(query).as_ref(),
            id,
            query.kind.as_deref(),
            query.namespace.as_deref(),
        )
    }

    fn expand_options(&self, query: &Query) -> ExpandOptions {
        ExpandOptions::new(
            query.dont_index.iter().cloned(),
            query.auto_index.unwrap_or(self.config.auto_index),
        )
    }

    /// Flattens an entity and applies the query's projection.
    fn output(&self, entity: &StoredEntity, query: &Query) -> Record {
        let record = self.entities.flatten(entity);
        match &query.select {
            Some(fields) => self.entities.project(record, fields),
            None => record,
        }
    }

    async fn fetch_one(&self, id: &Value, query: &Query) -> ServiceResult<StoredEntity> {
        let key = self.resolve_key(Some(id), query);
        self.store
            .get(&key)
            .await?
            .ok_or_else(|| ServiceError::NotFound(key.to_string()))
    }

    /// Runs `query` and drops the ancestor itself from the results.
    ///
    /// With `projected` unset the store returns whole entities, as needed by
    /// read phases whose results are written back.
    async fn query_entities(&self, query: &Query, projected: bool) -> ServiceResult<Vec<StoredEntity>> {
        let mut native = self.queries.translate(query);
        if !projected {
            native.projection = None;
        }
        let mut found = self.store.run_query(&native).await?;
        if let Some(ancestor) = &native.ancestor {
            found.retain(|entity| entity.key != *ancestor);
        }
        Ok(found)
    }

    /// Read phase shared by `patch` and `remove`.
    async fn fetch(&self, id: Option<&Value>, query: &Query) -> ServiceResult<OneOrMany<StoredEntity>> {
        match id {
            Some(id) => self.fetch_one(id, query).await.map(OneOrMany::One),
            None => self.query_entities(query, false).await.map(OneOrMany::Many),
        }
    }
}

/// Strict updates report a missing key as `NotFound`.
fn missing_as_not_found(err: StoreError) -> ServiceError {
    match err {
        StoreError::NoEntityToUpdate(key) => {
            warn!(key = %key, "Update target does not exist");
            ServiceError::NotFound(key)
        }
        other => other.into(),
    }
}

/// The record operations without the public wrapper.
pub struct DirectRecords<'a, S: Datastore + ?Sized> {
    service: &'a RecordService<S>,
}

impl<S: Datastore + ?Sized> DirectRecords<'_, S> {
    pub async fn find(&self, query: &Query) -> ServiceResult<Vec<Record>> {
        let service = self.service;
        let found = service.query_entities(query, true).await?;
        Ok(found.iter().map(|entity| service.output(entity, query)).collect())
    }

    pub async fn get(&self, id: &Value, query: &Query) -> ServiceResult<Record> {
        let service = self.service;
        let entity = service.fetch_one(id, query).await?;
        Ok(service.output(&entity, query))
    }

    /// Records carrying the id property are stored under that id; the rest
    /// get store-allocated numeric ids, reflected in the result.
    pub async fn create(&self, data: OneOrMany<Record>, query: &Query) -> ServiceResult<OneOrMany<Record>> {
        let service = self.service;
        let options = service.expand_options(query);
        let id_field = service.entities.id_field();
        let mut entities = data.map(|record| {
            let key = service.resolve_key(record.get(id_field), query);
            service.entities.expand(key, &record, &options)
        });

        let keys = service.store.insert(entities.as_slice()).await?;
        for (entity, key) in entities.as_mut_slice().iter_mut().zip(keys) {
            entity.key = key;
        }
        Ok(entities.map(|entity| service.output(&entity, query)))
    }

    pub async fn update(&self, id: &Value, data: Record, query: &Query) -> ServiceResult<Record> {
        let service = self.service;
        let key = service.resolve_key(Some(id), query);
        let mut entity = service
            .entities
            .expand(key, &data, &service.expand_options(query));

        if query.create {
            let keys = service.store.upsert(std::slice::from_ref(&entity)).await?;
            if let Some(key) = keys.into_iter().next() {
                entity.key = key;
            }
        } else {
            service
                .store
                .update(std::slice::from_ref(&entity))
                .await
                .map_err(missing_as_not_found)?;
        }
        Ok(service.output(&entity, query))
    }

    /// Read-modify-write. Fields in `data` replace the stored ones; other
    /// properties keep their values and their index exclusion. An empty
    /// read phase writes nothing.
    pub async fn patch(
        &self,
        id: Option<&Value>,
        data: Record,
        query: &Query,
    ) -> ServiceResult<OneOrMany<Record>> {
        let service = self.service;
        let fetched = service.fetch(id, query).await?;
        if fetched.is_empty() {
            return Ok(OneOrMany::Many(Vec::new()));
        }

        let options = service.expand_options(query);
        let id_field = service.entities.id_field();
        let patched = fetched.map(|entity| {
            let mut record = service.entities.flatten(&entity);
            record.extend(
                data.iter()
                    .filter(|(name, _)| name.as_str() != id_field)
                    .map(|(name, value)| (name.clone(), value.clone())),
            );
            let mut options = options.clone();
            options.dont_index.extend(
                entity
                    .properties
                    .iter()
                    .filter(|p| p.exclude_from_index && !data.contains_key(&p.name))
                    .map(|p| p.name.clone()),
            );
            service.entities.expand(entity.key, &record, &options)
        });

        service
            .store
            .update(patched.as_slice())
            .await
            .map_err(missing_as_not_found)?;
        Ok(patched.map(|entity| service.output(&entity, query)))
    }

    pub async fn remove(&self, id: Option<&Value>, query: &Query) -> ServiceResult<OneOrMany<Record>> {
        let service = self.service;
        let fetched = service.fetch(id, query).await?;
        if !fetched.is_empty() {
            let keys: Vec<Key> = fetched.as_slice().iter().map(|e| e.key.clone()).collect();
            service.store.delete(&keys).await?;
        }
        Ok(fetched.map(|entity| service.output(&entity, query)))
    }
}

#[async_trait]
impl<S: Datastore + ?Sized> Records for RecordService<S> {
    async fn find(&self, query: &Query) -> ServiceResult<Vec<Record>> {
        let kind = self.kind_for(query);
        let records = self
            .direct()
            .find(query)
            .await
            .inspect_err(|e| warn!(kind = %kind, error = %e, "find failed"))?;
        debug!(kind = %kind, count = records.len(), "find");
        Ok(records)
    }

    async fn get(&self, id: &Value, query: &Query) -> ServiceResult<Record> {
        let kind = self.kind_for(query);
        debug!(kind = %kind, id = ?id, "get");
        self.direct()
            .get(id, query)
            .await
            .inspect_err(|e| debug!(kind = %kind, error = %e, "get failed"))
    }

    async fn create(&self, data: OneOrMany<Record>, query: &Query) -> ServiceResult<OneOrMany<Record>> {
        let kind = self.kind_for(query);
        let count = data.len();
        let created = self
            .direct()
            .create(data, query)
            .await
            .inspect_err(|e| warn!(kind = %kind, error = %e, "create failed"))?;
        info!(kind = %kind, count, "Created records");
        Ok(created)
    }

    async fn update(&self, id: &Value, data: Record, query: &Query) -> ServiceResult<Record> {
        let kind = self.kind_for(query);
        let updated = self
            .direct()
            .update(id, data, query)
            .await
            .inspect_err(|e| warn!(kind = %kind, id = ?id, error = %e, "update failed"))?;
        info!(kind = %kind, id = ?id, upsert = query.create, "Updated record");
        Ok(updated)
    }

    async fn patch(
        &self,
        id: Option<&Value>,
        data: Record,
        query: &Query,
    ) -> ServiceResult<OneOrMany<Record>> {
        let kind = self.kind_for(query);
        let patched = self
            .direct()
            .patch(id, data, query)
            .await
            .inspect_err(|e| warn!(kind = %kind, id = ?id, error = %e, "patch failed"))?;
        info!(kind = %kind, id = ?id, count = patched.len(), "Patched records");
        Ok(patched)
    }

    async fn remove(&self, id: Option<&Value>, query: &Query) -> ServiceResult<OneOrMany<Record>> {
        let kind = self.kind_for(query);
        let removed = self
            .direct()
            .remove(id, query)
            .await
            .inspect_err(|e| warn!(kind = %kind, id = ?id, error = %e, "remove failed"))?;
        info!(kind = %kind, id = ?id, count = removed.len(), "Removed records");
        Ok(removed)
    }
}

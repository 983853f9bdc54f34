use kindstore_codec::{CompareOp, Query};
use kindstore_model::{Key, OneOrMany, PathElement, Record, Value, record_from_json};
use kindstore_service::{MemoryDatastore, RecordService, Records, ServiceConfig, ServiceError};
use pretty_assertions::assert_eq;
use serde_json::json;
use std::sync::Arc;

fn record(json: serde_json::Value) -> Record {
    record_from_json(json).unwrap()
}

fn query(json: serde_json::Value) -> Query {
    Query::from_json(json).unwrap()
}

fn make_service() -> (Arc<MemoryDatastore>, RecordService<MemoryDatastore>) {
    let store = Arc::new(MemoryDatastore::new());
    let service = RecordService::new(store.clone(), ServiceConfig::new("User"));
    (store, service)
}

async fn create_one(service: &RecordService<MemoryDatastore>, data: serde_json::Value, q: &Query) -> Record {
    service
        .create(OneOrMany::One(record(data)), q)
        .await
        .unwrap()
        .one()
        .unwrap()
}

// ── Create & get ─────────────────────────────────────────────────

#[tokio::test]
async fn create_then_get_round_trips() {
    let (_, service) = make_service();
    let data = json!({"id": "Bob", "age": 44, "tags": ["a", "b"], "address": {"city": "Oslo"}});
    let created = create_one(&service, data.clone(), &Query::new()).await;
    assert_eq!(created, record(data.clone()));

    let fetched = service.get(&Value::from("Bob"), &Query::new()).await.unwrap();
    assert_eq!(fetched, record(data));
}

#[tokio::test]
async fn create_without_id_gets_allocated_numeric_id() {
    let (store, service) = make_service();
    let created = create_one(&service, json!({"name": "Ann"}), &Query::new()).await;
    let id = created["id"].clone();
    assert!(matches!(id, Value::Integer(_)));

    let fetched = service.get(&id, &Query::new()).await.unwrap();
    assert_eq!(fetched["name"], Value::from("Ann"));
    assert_eq!(store.len().await, 1);
}

#[tokio::test]
async fn create_many_keeps_order_and_shape() {
    let (store, service) = make_service();
    let created = service
        .create(
            OneOrMany::Many(vec![
                record(json!({"id": "a", "n": 1})),
                record(json!({"n": 2})),
                record(json!({"id": "c", "n": 3})),
            ]),
            &Query::new(),
        )
        .await
        .unwrap();

    let OneOrMany::Many(created) = created else {
        panic!("expected a batch result");
    };
    assert_eq!(created.len(), 3);
    assert_eq!(created[0]["id"], Value::from("a"));
    assert!(matches!(created[1]["id"], Value::Integer(_)));
    assert_eq!(created[2]["n"], Value::Integer(3));
    assert_eq!(store.len().await, 3);
}

#[tokio::test]
async fn create_over_existing_key_conflicts() {
    let (_, service) = make_service();
    create_one(&service, json!({"id": "Bob"}), &Query::new()).await;
    let err = service
        .create(OneOrMany::One(record(json!({"id": "Bob", "age": 1}))), &Query::new())
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::Conflict(_)));
    assert_eq!(err.status_code(), 409);
}

#[tokio::test]
async fn failed_batch_writes_nothing() {
    let (store, service) = make_service();
    create_one(&service, json!({"id": "taken"}), &Query::new()).await;
    let result = service
        .create(
            OneOrMany::Many(vec![record(json!({"id": "new"})), record(json!({"id": "taken"}))]),
            &Query::new(),
        )
        .await;
    assert!(result.is_err());
    assert_eq!(store.len().await, 1);
}

#[tokio::test]
async fn get_missing_is_not_found() {
    let (_, service) = make_service();
    let err = service.get(&Value::from("nobody"), &Query::new()).await.unwrap_err();
    assert!(err.is_not_found());
    assert_eq!(err.status_code(), 404);
}

#[tokio::test]
async fn numeric_string_and_integer_ids_collide() {
    let (_, service) = make_service();
    create_one(&service, json!({"id": "42", "name": "x"}), &Query::new()).await;

    let by_int = service.get(&Value::Integer(42), &Query::new()).await.unwrap();
    assert_eq!(by_int["name"], Value::from("x"));
    assert_eq!(by_int["id"], Value::Integer(42));

    let err = service
        .create(OneOrMany::One(record(json!({"id": 42}))), &Query::new())
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::Conflict(_)));
}

#[tokio::test]
async fn get_with_select_projects_and_keeps_id() {
    let (_, service) = make_service();
    create_one(&service, json!({"id": "Bob", "age": 44, "children": 2}), &Query::new()).await;
    let fetched = service
        .get(&Value::from("Bob"), &query(json!({"$select": ["age"]})))
        .await
        .unwrap();
    assert_eq!(fetched, record(json!({"id": "Bob", "age": 44})));
}

// ── Indexing ─────────────────────────────────────────────────────

#[tokio::test]
async fn unindexed_property_is_not_queryable() {
    let (_, service) = make_service();
    create_one(
        &service,
        json!({"id": "Bob", "age": 44, "children": 2}),
        &query(json!({"dontIndex": ["age"]})),
    )
    .await;

    let by_age = service.find(&query(json!({"age": {"$lte": 50}}))).await.unwrap();
    assert!(by_age.is_empty());

    let by_children = service.find(&query(json!({"children": {"$lte": 4}}))).await.unwrap();
    assert_eq!(by_children.len(), 1);
    assert_eq!(by_children[0]["id"], Value::from("Bob"));
}

#[tokio::test]
async fn oversized_indexed_property_is_rejected() {
    let (_, service) = make_service();
    let big = "x".repeat(1501);
    let err = service
        .create(OneOrMany::One(record(json!({"id": "doc", "body": big}))), &Query::new())
        .await
        .unwrap_err();
    match err {
        ServiceError::IndexSizeExceeded { ref property, size } => {
            assert_eq!(property, "body");
            assert_eq!(size, 1501);
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(err.status_code(), 400);
}

#[tokio::test]
async fn auto_index_excludes_oversized_properties() {
    let (store, service) = make_service();
    let big = "x".repeat(1501);
    create_one(
        &service,
        json!({"id": "doc", "body": big, "meta": {"blob": big}, "title": "t"}),
        &query(json!({"autoIndex": true})),
    )
    .await;

    let stored = store.snapshot().await.remove(0);
    assert!(stored.is_unindexed("body"));
    assert!(stored.is_unindexed("meta"));
    assert!(!stored.is_unindexed("title"));
}

#[tokio::test]
async fn service_level_auto_index_default() {
    let store = Arc::new(MemoryDatastore::new());
    let service = RecordService::new(store, ServiceConfig::new("Doc").with_auto_index(true));
    let big = "x".repeat(2000);
    let created = create_one(&service, json!({"id": 1, "body": big}), &Query::new()).await;
    assert_eq!(created["id"], Value::Integer(1));

    let err = service
        .create(
            OneOrMany::One(record(json!({"id": 2, "body": big}))),
            &query(json!({"autoIndex": false})),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::IndexSizeExceeded { .. }));
}

// ── Find ─────────────────────────────────────────────────────────

#[tokio::test]
async fn find_null_equality() {
    let (_, service) = make_service();
    create_one(&service, json!({"id": "Bob", "father": null}), &Query::new()).await;
    create_one(&service, json!({"id": "Ann", "father": "Bob"}), &Query::new()).await;
    create_one(&service, json!({"id": "Eve"}), &Query::new()).await;

    let found = service.find(&query(json!({"father": null}))).await.unwrap();
    assert_eq!(found, vec![record(json!({"id": "Bob", "father": null}))]);
}

#[tokio::test]
async fn find_combines_filters() {
    let (_, service) = make_service();
    for (id, age) in [("a", 10), ("b", 20), ("c", 30), ("d", 40)] {
        create_one(&service, json!({"id": id, "age": age, "team": "x"}), &Query::new()).await;
    }
    let found = service
        .find(&query(json!({"team": "x", "age": {"$gt": "10", "$lt": 40}})))
        .await
        .unwrap();
    let ids: Vec<Value> = found.iter().map(|r| r["id"].clone()).collect();
    assert_eq!(ids, vec![Value::from("b"), Value::from("c")]);
}

#[tokio::test]
async fn find_matches_array_elements() {
    let (_, service) = make_service();
    create_one(&service, json!({"id": 1, "tags": ["red", "blue"]}), &Query::new()).await;
    create_one(&service, json!({"id": 2, "tags": ["green"]}), &Query::new()).await;
    let found = service.find(&Query::new().filter_eq("tags", "blue")).await.unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0]["id"], Value::Integer(1));
}

#[tokio::test]
async fn find_by_id_filter() {
    let (_, service) = make_service();
    create_one(&service, json!({"id": 5}), &Query::new()).await;
    create_one(&service, json!({"id": 6}), &Query::new()).await;
    let found = service
        .find(&Query::new().filter("id", CompareOp::Eq, "6"))
        .await
        .unwrap();
    assert_eq!(found, vec![record(json!({"id": 6}))]);
}

#[tokio::test]
async fn find_with_select() {
    let (_, service) = make_service();
    create_one(&service, json!({"id": 1, "a": 1, "b": 2}), &Query::new()).await;
    let found = service.find(&query(json!({"$select": ["b"]}))).await.unwrap();
    assert_eq!(found, vec![record(json!({"id": 1, "b": 2}))]);
}

#[tokio::test]
async fn kind_override_scopes_records() {
    let (_, service) = make_service();
    create_one(&service, json!({"id": 1}), &query(json!({"kind": "Account"}))).await;
    assert!(service.find(&Query::new()).await.unwrap().is_empty());
    assert_eq!(
        service.find(&Query::new().with_kind("Account")).await.unwrap().len(),
        1
    );
}

#[tokio::test]
async fn namespaces_isolate_records() {
    let (_, service) = make_service();
    create_one(&service, json!({"id": "Bob"}), &Query::new().with_namespace("tenant-a")).await;

    let err = service
        .get(&Value::from("Bob"), &Query::new().with_namespace("tenant-b"))
        .await
        .unwrap_err();
    assert!(err.is_not_found());
    assert!(service.find(&Query::new()).await.unwrap().is_empty());
    assert_eq!(
        service
            .find(&Query::new().with_namespace("tenant-a"))
            .await
            .unwrap()
            .len(),
        1
    );
}

// ── Ancestors ────────────────────────────────────────────────────

#[tokio::test]
async fn ancestor_query_excludes_the_ancestor() {
    let (store, service) = make_service();
    create_one(&service, json!({"id": "A", "role": "member"}), &Query::new()).await;
    let under_a = Query::new().with_ancestor("A");
    create_one(&service, json!({"id": "c1", "role": "member"}), &under_a).await;
    create_one(&service, json!({"role": "member"}), &under_a).await;
    create_one(&service, json!({"id": "B", "role": "member"}), &Query::new()).await;

    let child_key = Key::new("User", "A").child(PathElement::new("User", "c1"));
    assert!(store.snapshot().await.iter().any(|e| e.key == child_key));

    let found = service
        .find(&query(json!({"ancestor": "A", "role": "member"})))
        .await
        .unwrap();
    assert_eq!(found.len(), 2);
    assert!(found.iter().all(|r| r["id"] != Value::from("A")));
    assert!(found.iter().all(|r| r["id"] != Value::from("B")));
}

#[tokio::test]
async fn get_under_ancestor() {
    let (_, service) = make_service();
    let under_a = Query::new().with_ancestor("A");
    create_one(&service, json!({"id": "c1", "n": 1}), &under_a).await;

    assert!(service.get(&Value::from("c1"), &Query::new()).await.is_err());
    let fetched = service.get(&Value::from("c1"), &under_a).await.unwrap();
    assert_eq!(fetched, record(json!({"id": "c1", "n": 1})));

    let explicit = Value::Key(Key::new("User", "A").child(PathElement::new("User", "c1")));
    assert!(service.get(&explicit, &Query::new()).await.is_ok());
}

// ── Update ───────────────────────────────────────────────────────

#[tokio::test]
async fn strict_update_of_missing_record_is_not_found() {
    let (store, service) = make_service();
    let err = service
        .update(&Value::from("Bob"), record(json!({"age": 1})), &Query::new())
        .await
        .unwrap_err();
    assert!(err.is_not_found());
    assert!(store.is_empty().await);
}

#[tokio::test]
async fn update_with_create_upserts() {
    let (_, service) = make_service();
    let updated = service
        .update(
            &Value::from("Bob"),
            record(json!({"age": 1})),
            &query(json!({"create": true})),
        )
        .await
        .unwrap();
    assert_eq!(updated, record(json!({"id": "Bob", "age": 1})));
    assert!(service.get(&Value::from("Bob"), &Query::new()).await.is_ok());
}

#[tokio::test]
async fn update_replaces_whole_record() {
    let (_, service) = make_service();
    create_one(&service, json!({"id": "Bob", "age": 44, "children": 2}), &Query::new()).await;
    let updated = service
        .update(
            &Value::from("Bob"),
            record(json!({"id": "ignored", "age": 45})),
            &Query::new(),
        )
        .await
        .unwrap();
    assert_eq!(updated, record(json!({"id": "Bob", "age": 45})));
    assert_eq!(
        service.get(&Value::from("Bob"), &Query::new()).await.unwrap(),
        record(json!({"id": "Bob", "age": 45}))
    );
}

// ── Patch ────────────────────────────────────────────────────────

#[tokio::test]
async fn patch_by_id_merges_shallowly() {
    let (_, service) = make_service();
    create_one(
        &service,
        json!({"id": "Bob", "age": 44, "address": {"city": "Oslo", "zip": "0150"}}),
        &Query::new(),
    )
    .await;
    let patched = service
        .patch(
            Some(&Value::from("Bob")),
            record(json!({"age": 45, "address": {"city": "Bergen"}})),
            &Query::new(),
        )
        .await
        .unwrap();
    assert_eq!(
        patched,
        OneOrMany::One(record(json!({"id": "Bob", "age": 45, "address": {"city": "Bergen"}})))
    );
}

#[tokio::test]
async fn patch_without_id_patches_all_matches() {
    let (_, service) = make_service();
    create_one(&service, json!({"id": 1, "team": "x", "active": false}), &Query::new()).await;
    create_one(&service, json!({"id": 2, "team": "x", "active": false}), &Query::new()).await;
    create_one(&service, json!({"id": 3, "team": "y", "active": false}), &Query::new()).await;

    let patched = service
        .patch(None, record(json!({"active": true})), &query(json!({"team": "x"})))
        .await
        .unwrap();
    assert_eq!(patched.len(), 2);

    let active = service.find(&query(json!({"active": true}))).await.unwrap();
    let ids: Vec<Value> = active.iter().map(|r| r["id"].clone()).collect();
    assert_eq!(ids, vec![Value::Integer(1), Value::Integer(2)]);
}

#[tokio::test]
async fn patch_by_query_with_select_keeps_unselected_fields() {
    let (_, service) = make_service();
    create_one(
        &service,
        json!({"id": "Bob", "age": 44, "city": "Oslo", "team": "a"}),
        &Query::new(),
    )
    .await;

    let patched = service
        .patch(
            None,
            record(json!({"age": 45})),
            &query(json!({"team": "a", "$select": ["age"]})),
        )
        .await
        .unwrap();
    assert_eq!(patched, OneOrMany::Many(vec![record(json!({"id": "Bob", "age": 45}))]));

    let stored = service.get(&Value::from("Bob"), &Query::new()).await.unwrap();
    assert_eq!(
        stored,
        record(json!({"id": "Bob", "age": 45, "city": "Oslo", "team": "a"}))
    );
}

#[tokio::test]
async fn patch_by_query_under_ancestor_with_select() {
    let (store, service) = make_service();
    create_one(&service, json!({"id": "A", "team": "a", "note": "parent"}), &Query::new()).await;
    let under_a = Query::new().with_ancestor("A");
    create_one(&service, json!({"id": "c1", "team": "a", "city": "Oslo"}), &under_a).await;
    create_one(&service, json!({"id": "c2", "team": "a", "city": "Bergen"}), &under_a).await;
    create_one(&service, json!({"id": "B", "team": "a", "city": "Tromsø"}), &Query::new()).await;

    let patched = service
        .patch(
            None,
            record(json!({"level": 2})),
            &query(json!({"ancestor": "A", "team": "a", "$select": ["level"]})),
        )
        .await
        .unwrap();
    assert_eq!(
        patched,
        OneOrMany::Many(vec![
            record(json!({"id": "c1", "level": 2})),
            record(json!({"id": "c2", "level": 2})),
        ])
    );

    let parent = Key::new("User", "A");
    let stored: Vec<(Key, Record)> = store
        .snapshot()
        .await
        .into_iter()
        .map(|entity| {
            let props = entity
                .properties
                .iter()
                .map(|p| (p.name.clone(), p.value.clone()))
                .collect();
            (entity.key, props)
        })
        .collect();
    assert_eq!(
        stored,
        vec![
            (parent.clone(), record(json!({"team": "a", "note": "parent"}))),
            (
                parent.child(PathElement::new("User", "c1")),
                record(json!({"team": "a", "city": "Oslo", "level": 2})),
            ),
            (
                parent.child(PathElement::new("User", "c2")),
                record(json!({"team": "a", "city": "Bergen", "level": 2})),
            ),
            (Key::new("User", "B"), record(json!({"team": "a", "city": "Tromsø"}))),
        ]
    );
}

#[tokio::test]
async fn patch_by_query_applies_dont_index_to_patched_fields() {
    let (store, service) = make_service();
    create_one(&service, json!({"id": 1, "team": "x", "age": 30}), &Query::new()).await;

    service
        .patch(
            None,
            record(json!({"age": 31})),
            &query(json!({"team": "x", "dontIndex": ["age"]})),
        )
        .await
        .unwrap();

    let stored = store.snapshot().await.remove(0);
    assert!(stored.is_unindexed("age"));
    assert!(!stored.is_unindexed("team"));
    assert_eq!(stored.get("age"), Some(&Value::Integer(31)));
    assert!(service.find(&query(json!({"age": 31}))).await.unwrap().is_empty());
}

#[tokio::test]
async fn patch_missing_id_is_not_found() {
    let (_, service) = make_service();
    let err = service
        .patch(Some(&Value::from("ghost")), record(json!({"a": 1})), &Query::new())
        .await
        .unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn patch_with_no_matches_writes_nothing() {
    let (_, service) = make_service();
    let patched = service
        .patch(None, record(json!({"a": 1})), &query(json!({"team": "none"})))
        .await
        .unwrap();
    assert!(patched.is_empty());
}

#[tokio::test]
async fn patch_keeps_index_exclusion_of_untouched_properties() {
    let (store, service) = make_service();
    create_one(
        &service,
        json!({"id": "Bob", "age": 44, "children": 2}),
        &query(json!({"dontIndex": ["age"]})),
    )
    .await;
    service
        .patch(Some(&Value::from("Bob")), record(json!({"children": 3})), &Query::new())
        .await
        .unwrap();

    let stored = store.snapshot().await.remove(0);
    assert!(stored.is_unindexed("age"));
    assert!(!stored.is_unindexed("children"));
    assert!(service.find(&query(json!({"age": 44}))).await.unwrap().is_empty());
}

// ── Remove ───────────────────────────────────────────────────────

#[tokio::test]
async fn remove_by_id_returns_removed_record() {
    let (store, service) = make_service();
    create_one(&service, json!({"id": "Bob", "age": 44}), &Query::new()).await;
    let removed = service.remove(Some(&Value::from("Bob")), &Query::new()).await.unwrap();
    assert_eq!(removed, OneOrMany::One(record(json!({"id": "Bob", "age": 44}))));
    assert!(store.is_empty().await);
}

#[tokio::test]
async fn remove_missing_id_is_not_found() {
    let (_, service) = make_service();
    let err = service
        .remove(Some(&Value::from("ghost")), &Query::new())
        .await
        .unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn remove_by_query_removes_matches_only() {
    let (store, service) = make_service();
    create_one(&service, json!({"id": 1, "team": "x"}), &Query::new()).await;
    create_one(&service, json!({"id": 2, "team": "x"}), &Query::new()).await;
    create_one(&service, json!({"id": 3, "team": "y"}), &Query::new()).await;

    let removed = service.remove(None, &query(json!({"team": "x"}))).await.unwrap();
    assert_eq!(removed.len(), 2);
    assert_eq!(store.len().await, 1);

    let nothing = service.remove(None, &query(json!({"team": "x"}))).await.unwrap();
    assert_eq!(nothing, OneOrMany::Many(vec![]));
}

#[tokio::test]
async fn remove_by_query_with_select_projects_result_only() {
    let (store, service) = make_service();
    create_one(&service, json!({"id": 1, "team": "x", "city": "Oslo"}), &Query::new()).await;

    let removed = service
        .remove(None, &query(json!({"team": "x", "$select": ["city"]})))
        .await
        .unwrap();
    assert_eq!(removed, OneOrMany::Many(vec![record(json!({"id": 1, "city": "Oslo"}))]));
    assert!(store.is_empty().await);
}

// ── Direct surface ───────────────────────────────────────────────

#[tokio::test]
async fn direct_surface_matches_public_surface() {
    let (_, service) = make_service();
    let direct = service.direct();
    direct
        .create(OneOrMany::One(record(json!({"id": "Bob", "age": 1}))), &Query::new())
        .await
        .unwrap();
    assert_eq!(
        direct.get(&Value::from("Bob"), &Query::new()).await.unwrap(),
        service.get(&Value::from("Bob"), &Query::new()).await.unwrap()
    );
    assert_eq!(direct.find(&Query::new()).await.unwrap().len(), 1);
}

#[tokio::test]
async fn works_through_trait_object() {
    let store: Arc<dyn kindstore_service::Datastore> = Arc::new(MemoryDatastore::new());
    let service: Box<dyn Records> = Box::new(RecordService::new(store, ServiceConfig::new("User")));
    service
        .create(OneOrMany::One(record(json!({"id": 1}))), &Query::new())
        .await
        .unwrap();
    assert_eq!(service.find(&Query::new()).await.unwrap().len(), 1);
}

#![forbid(unsafe_code)]

use std::sync::Arc;

use kbindex_core::{ChangeType, IndexSpec, ResourceChangeEvent, Status};
use kbindex_indexhub::{FieldKind, IndexCreationRequest, MemoryIndexStore, StoreCall, StoreError, StoreOp};
use kbindex_reconcile::{IndexReconciler, Outcome, ReconcileError};

fn spec() -> IndexSpec {
    IndexSpec {
        index_name: "kb-1".into(),
        vector_dimension: 1024,
        vector_field: "v".into(),
        text_field: "t".into(),
        metadata_field: "m".into(),
    }
}

fn event(change_type: ChangeType) -> ResourceChangeEvent {
    ResourceChangeEvent {
        change_type,
        properties: spec(),
        request_id: "req-1".into(),
        logical_id: "VectorIndex".into(),
        stack_id: Some("stack".into()),
        physical_id: None,
    }
}

#[tokio::test]
async fn create_on_empty_store_issues_one_create_with_vector_mapping() {
    let store = Arc::new(MemoryIndexStore::new());
    let r = IndexReconciler::new(store.clone());

    let res = r.reconcile(&event(ChangeType::Create)).await;

    assert_eq!(res.status, Status::Success);
    assert_eq!(res.physical_id, "kb-1");
    assert_eq!(res.request_id, "req-1");
    assert_eq!(res.logical_id, "VectorIndex");
    assert_eq!(res.stack_id.as_deref(), Some("stack"));
    assert_eq!(store.creates(), 1);
    let created = store.get("kb-1").unwrap();
    let (field, mapping) = created.vector_field().unwrap();
    assert_eq!(field, "v");
    assert_eq!(mapping.kind, FieldKind::KnnVector);
    assert_eq!(mapping.dimension, Some(1024));
}

#[tokio::test]
async fn repeated_create_is_idempotent() {
    let store = Arc::new(MemoryIndexStore::new());
    let r = IndexReconciler::new(store.clone());

    let (first, o1) = r.reconcile_detailed(&event(ChangeType::Create)).await;
    let (second, o2) = r.reconcile_detailed(&event(ChangeType::Create)).await;

    assert_eq!(first, second);
    assert_eq!(o1, Ok(Outcome::Created));
    assert_eq!(o2, Ok(Outcome::AlreadyPresent));
    assert_eq!(store.creates(), 1);
    assert_eq!(
        store.calls(),
        vec![StoreCall::Exists("kb-1".into()), StoreCall::Create("kb-1".into()), StoreCall::Exists("kb-1".into())]
    );
}

#[tokio::test]
async fn update_re_queries_existence_and_leaves_present_index_alone() {
    let existing = IndexCreationRequest::from_spec(&IndexSpec::for_index("kb-1", 8));
    let store = Arc::new(MemoryIndexStore::new().with_index("kb-1", existing.clone()));
    let r = IndexReconciler::new(store.clone());

    let (res, outcome) = r.reconcile_detailed(&event(ChangeType::Update)).await;

    assert!(res.is_success());
    assert_eq!(outcome, Ok(Outcome::AlreadyPresent));
    assert_eq!(store.get("kb-1"), Some(existing));
}

#[tokio::test]
async fn delete_of_absent_index_still_succeeds() {
    let store = Arc::new(MemoryIndexStore::new());
    let r = IndexReconciler::new(store.clone());

    let (res, outcome) = r.reconcile_detailed(&event(ChangeType::Delete)).await;

    assert_eq!(res.status, Status::Success);
    assert_eq!(res.physical_id, "kb-1");
    assert_eq!(outcome, Err(ReconcileError::Store(StoreError::NotFound("kb-1".into()))));
}

#[tokio::test]
async fn delete_removes_existing_index() {
    let store = Arc::new(MemoryIndexStore::new());
    let r = IndexReconciler::new(store.clone());
    r.reconcile(&event(ChangeType::Create)).await;

    let (_, outcome) = r.reconcile_detailed(&event(ChangeType::Delete)).await;

    assert_eq!(outcome, Ok(Outcome::Deleted));
    assert!(!store.contains("kb-1"));
}

#[tokio::test]
async fn store_failures_are_contained_at_the_boundary() {
    let store = Arc::new(MemoryIndexStore::new());
    store.fail_on(StoreOp::Create, StoreError::Status { code: 403, body: "forbidden".into() });
    let r = IndexReconciler::new(store.clone());

    // Internal layer sees the failure...
    let err = r.apply(&event(ChangeType::Create)).await.unwrap_err();
    assert_eq!(err, ReconcileError::Store(StoreError::Status { code: 403, body: "forbidden".into() }));

    // ...the boundary does not.
    let res = r.reconcile(&event(ChangeType::Create)).await;
    assert_eq!(res.status, Status::Success);
    assert!(!store.contains("kb-1"));

    store.fail_on(StoreOp::Exists, StoreError::Transport("connection reset".into()));
    assert!(r.reconcile(&event(ChangeType::Update)).await.is_success());
}

#[tokio::test]
async fn result_wire_shape_for_the_framework() {
    let store = Arc::new(MemoryIndexStore::new());
    let r = IndexReconciler::new(store);
    let res = r.reconcile(&event(ChangeType::Create)).await;
    let v = serde_json::to_value(&res).unwrap();
    assert_eq!(v["status"], "SUCCESS");
    assert_eq!(v["physicalId"], "kb-1");
    assert_eq!(v["data"], serde_json::json!({}));
}

#[tokio::test]
async fn native_delete_with_only_index_name_reports_success() {
    let store = Arc::new(MemoryIndexStore::new().with_index("kb-1", IndexCreationRequest::from_spec(&IndexSpec::for_index("kb-1", 8))));
    let r = IndexReconciler::new(store.clone());
    let ev: ResourceChangeEvent<serde_json::Value> = serde_json::from_value(serde_json::json!({
        "RequestType": "Delete",
        "RequestId": "req-7",
        "LogicalResourceId": "VectorIndex",
        "PhysicalResourceId": "kb-1",
        "ResourceProperties": {"ServiceToken": "arn:aws:lambda:eu-west-1:1:function:f", "indexName": "kb-1"}
    }))
    .unwrap();

    let (res, outcome) = r.reconcile_raw(ev).await;

    assert_eq!(outcome, Ok(Outcome::Deleted));
    let v = serde_json::to_value(&res).unwrap();
    assert_eq!(v["status"], "SUCCESS");
    assert_eq!(v["physicalId"], "kb-1");
    assert!(!store.contains("kb-1"));
}

#[tokio::test]
async fn blank_dimension_on_create_is_contained() {
    let store = Arc::new(MemoryIndexStore::new());
    let r = IndexReconciler::new(store.clone());
    let ev: ResourceChangeEvent<serde_json::Value> = serde_json::from_value(serde_json::json!({
        "RequestType": "Create",
        "RequestId": "req-8",
        "LogicalResourceId": "VectorIndex",
        "ResourceProperties": {"indexName": "kb-1", "dimensions": "", "vectorField": "kb-1", "textField": "T", "metadataField": "M"}
    }))
    .unwrap();

    let (res, outcome) = r.reconcile_raw(ev).await;

    assert!(res.is_success());
    assert_eq!(res.physical_id, "kb-1");
    assert_eq!(outcome, Err(ReconcileError::InvalidSpec(kbindex_core::SpecError::ZeroDimension)));
    assert!(store.calls().is_empty());
}

#[tokio::test]
async fn undecodable_properties_still_answer_with_correlation_ids() {
    let store = Arc::new(MemoryIndexStore::new());
    let r = IndexReconciler::new(store.clone());
    let ev: ResourceChangeEvent<serde_json::Value> = serde_json::from_value(serde_json::json!({
        "RequestType": "Update",
        "RequestId": "req-9",
        "LogicalResourceId": "VectorIndex",
        "PhysicalResourceId": "kb-1",
        "ResourceProperties": "not-an-object"
    }))
    .unwrap();

    let (res, outcome) = r.reconcile_raw(ev).await;

    assert_eq!(res.status, Status::Success);
    assert_eq!(res.request_id, "req-9");
    assert_eq!(res.physical_id, "kb-1");
    assert!(matches!(outcome, Err(ReconcileError::MalformedProperties(_))));
    assert!(store.calls().is_empty());
}

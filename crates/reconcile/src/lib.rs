//! kbindex reconcile: drives an external vector index through create/update/delete.
//!
//! Two layers:
//! - [`IndexReconciler::apply`] is the fallible operation and reports what happened.
//! - [`IndexReconciler::reconcile`] is the protocol boundary. It logs any failure
//!   from `apply` and always answers `SUCCESS`, so a flaky index store never rolls
//!   back the provisioning run that owns the index.
//!
//! Existence is re-read from the store on every Create/Update; no local state
//! survives between invocations.

#![forbid(unsafe_code)]

use std::sync::Arc;
use std::time::Instant;

use kbindex_core::{ChangeType, IndexSpec, ResourceChangeEvent, ResourceChangeResult, SpecError};
use kbindex_indexhub::{IndexCreationRequest, IndexStore, StoreError};
use metrics::{counter, histogram};
use serde::{Deserialize, Serialize};
use serde_json::Value as Json;
use tracing::{error, info};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Created,
    /// The index was already there; nothing was sent.
    AlreadyPresent,
    Deleted,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ReconcileError {
    #[error("invalid index spec: {0}")]
    InvalidSpec(#[from] SpecError),
    #[error("index store: {0}")]
    Store(#[from] StoreError),
    #[error("unreadable resource properties: {0}")]
    MalformedProperties(String),
}

pub struct IndexReconciler {
    store: Arc<dyn IndexStore>,
}

impl IndexReconciler {
    pub fn new(store: Arc<dyn IndexStore>) -> Self { Self { store } }

    /// Boundary entry point: always a success report.
    pub async fn reconcile(&self, event: &ResourceChangeEvent) -> ResourceChangeResult {
        self.reconcile_detailed(event).await.0
    }

    /// Like [`reconcile`](Self::reconcile) but also hands back the contained outcome.
    pub async fn reconcile_detailed(&self, event: &ResourceChangeEvent) -> (ResourceChangeResult, Result<Outcome, ReconcileError>) {
        let t0 = Instant::now();
        counter!("reconcile_attempts", 1u64);
        let spec = &event.properties;
        let outcome = self.apply(event).await;
        match &outcome {
            Ok(o) => {
                counter!("reconcile_ok", 1u64);
                info!(index = %spec.index_name, change = %event.change_type, outcome = ?o, request_id = %event.request_id, "reconcile ok");
            }
            Err(e) => {
                counter!("reconcile_contained_err", 1u64);
                error!(index = %spec.index_name, change = %event.change_type, request_id = %event.request_id, error = %e, "reconcile failed; reporting success to keep provisioning going");
            }
        }
        histogram!("reconcile_latency_ms", t0.elapsed().as_secs_f64() * 1000.0);
        (ResourceChangeResult::success(event, physical_id(event)), outcome)
    }

    /// Entry point for undecoded properties. Properties that do not decode into
    /// an [`IndexSpec`] are a contained failure like any other.
    pub async fn reconcile_raw(&self, event: ResourceChangeEvent<Json>) -> (ResourceChangeResult, Result<Outcome, ReconcileError>) {
        let ResourceChangeEvent { change_type, properties, request_id, logical_id, stack_id, physical_id } = event;
        match serde_json::from_value::<IndexSpec>(properties.clone()) {
            Ok(spec) => {
                let event = ResourceChangeEvent { change_type, properties: spec, request_id, logical_id, stack_id, physical_id };
                self.reconcile_detailed(&event).await
            }
            Err(e) => {
                counter!("reconcile_attempts", 1u64);
                counter!("reconcile_contained_err", 1u64);
                let event = ResourceChangeEvent { change_type, properties, request_id, logical_id, stack_id, physical_id };
                let name = event.properties.get("indexName").and_then(Json::as_str).unwrap_or_default();
                let physical = fallback_physical_id(name, &event);
                error!(change = %event.change_type, request_id = %event.request_id, error = %e, "resource properties unreadable; reporting success to keep provisioning going");
                (ResourceChangeResult::success(&event, physical), Err(ReconcileError::MalformedProperties(e.to_string())))
            }
        }
    }

    /// Fallible layer: performs the change and reports what happened.
    pub async fn apply(&self, event: &ResourceChangeEvent) -> Result<Outcome, ReconcileError> {
        match event.change_type {
            ChangeType::Create | ChangeType::Update => self.ensure_index(&event.properties).await,
            ChangeType::Delete => self.remove_index(&event.properties).await,
        }
    }

    async fn ensure_index(&self, spec: &IndexSpec) -> Result<Outcome, ReconcileError> {
        spec.validate()?;
        if self.store.exists(&spec.index_name).await? {
            counter!("index_create_skipped_total", 1u64);
            return Ok(Outcome::AlreadyPresent);
        }
        let request = IndexCreationRequest::from_spec(spec);
        self.store.create(&spec.index_name, &request).await?;
        counter!("index_create_total", 1u64);
        Ok(Outcome::Created)
    }

    async fn remove_index(&self, spec: &IndexSpec) -> Result<Outcome, ReconcileError> {
        // Only the name matters for deletion; a spec that fails validation may still name a real index.
        if spec.index_name.is_empty() {
            return Err(SpecError::EmptyName.into());
        }
        self.store.delete(&spec.index_name).await?;
        counter!("index_delete_total", 1u64);
        Ok(Outcome::Deleted)
    }
}

/// Physical id reported back: the index name, else the id the framework already
/// holds, else the logical id.
pub fn physical_id(event: &ResourceChangeEvent) -> String {
    fallback_physical_id(&event.properties.index_name, event)
}

fn fallback_physical_id<P>(index_name: &str, event: &ResourceChangeEvent<P>) -> String {
    if !index_name.is_empty() {
        return index_name.to_string();
    }
    match event.physical_id.as_deref() {
        Some(id) if !id.is_empty() => id.to_string(),
        _ => event.logical_id.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kbindex_indexhub::MemoryIndexStore;

    fn event(change_type: ChangeType, spec: IndexSpec) -> ResourceChangeEvent {
        ResourceChangeEvent { change_type, properties: spec, request_id: "req".into(), logical_id: "Index".into(), stack_id: None, physical_id: None }
    }

    #[tokio::test]
    async fn invalid_spec_is_contained_without_store_calls() {
        let store = Arc::new(MemoryIndexStore::new());
        let r = IndexReconciler::new(store.clone());
        let (res, outcome) = r.reconcile_detailed(&event(ChangeType::Create, IndexSpec::for_index("kb", 0))).await;
        assert!(res.is_success());
        assert_eq!(outcome, Err(ReconcileError::InvalidSpec(SpecError::ZeroDimension)));
        assert!(store.calls().is_empty());
    }

    #[test]
    fn physical_id_falls_back_to_logical_id() {
        assert_eq!(physical_id(&event(ChangeType::Delete, IndexSpec::for_index("", 3))), "Index");
        assert_eq!(physical_id(&event(ChangeType::Delete, IndexSpec::for_index("kb", 3))), "kb");
        let mut ev = event(ChangeType::Delete, IndexSpec::default());
        ev.physical_id = Some("kb-old".into());
        assert_eq!(physical_id(&ev), "kb-old");
    }
}

//! In-memory index store that records calls, for tests and dry runs.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard};

use crate::{IndexCreationRequest, IndexStore, StoreError, StoreResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreOp {
    Exists,
    Create,
    Delete,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreCall {
    Exists(String),
    Create(String),
    Delete(String),
}

#[derive(Default)]
struct State {
    indices: BTreeMap<String, IndexCreationRequest>,
    calls: Vec<StoreCall>,
    failures: HashMap<StoreOp, StoreError>,
}

/// Behaves like the real store: creating an existing index is rejected and
/// deleting an absent one reports `NotFound`.
#[derive(Default)]
pub struct MemoryIndexStore {
    state: Mutex<State>,
}

impl MemoryIndexStore {
    pub fn new() -> Self { Self::default() }

    pub fn with_index(self, name: &str, request: IndexCreationRequest) -> Self {
        self.lock().indices.insert(name.to_string(), request);
        self
    }

    /// Make every subsequent call of `op` fail with `err` until cleared.
    pub fn fail_on(&self, op: StoreOp, err: StoreError) {
        self.lock().failures.insert(op, err);
    }

    pub fn clear_failures(&self) {
        self.lock().failures.clear();
    }

    pub fn calls(&self) -> Vec<StoreCall> { self.lock().calls.clone() }

    pub fn creates(&self) -> usize {
        self.lock().calls.iter().filter(|c| matches!(c, StoreCall::Create(_))).count()
    }

    pub fn contains(&self, name: &str) -> bool { self.lock().indices.contains_key(name) }

    pub fn get(&self, name: &str) -> Option<IndexCreationRequest> { self.lock().indices.get(name).cloned() }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn record(&self, op: StoreOp, call: StoreCall) -> StoreResult<MutexGuard<'_, State>> {
        let mut st = self.lock();
        st.calls.push(call);
        if let Some(err) = st.failures.get(&op).cloned() {
            return Err(err);
        }
        Ok(st)
    }
}

#[async_trait::async_trait]
impl IndexStore for MemoryIndexStore {
    async fn exists(&self, name: &str) -> StoreResult<bool> {
        let st = self.record(StoreOp::Exists, StoreCall::Exists(name.to_string()))?;
        Ok(st.indices.contains_key(name))
    }

    async fn create(&self, name: &str, request: &IndexCreationRequest) -> StoreResult<()> {
        let mut st = self.record(StoreOp::Create, StoreCall::Create(name.to_string()))?;
        if st.indices.contains_key(name) {
            return Err(StoreError::Status { code: 400, body: format!("resource_already_exists_exception: index [{}]", name) });
        }
        st.indices.insert(name.to_string(), request.clone());
        Ok(())
    }

    async fn delete(&self, name: &str) -> StoreResult<()> {
        let mut st = self.record(StoreOp::Delete, StoreCall::Delete(name.to_string()))?;
        match st.indices.remove(name) {
            Some(_) => Ok(()),
            None => Err(StoreError::NotFound(name.to_string())),
        }
    }
}

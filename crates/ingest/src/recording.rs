//! Ingestion API double that records every start call.

use std::sync::Mutex;

use crate::{IngestError, IngestionApi, IngestionJob};

#[derive(Default)]
pub struct RecordingIngestionApi {
    calls: Mutex<Vec<(String, String)>>,
    failure: Mutex<Option<String>>,
}

impl RecordingIngestionApi {
    pub fn new() -> Self { Self::default() }

    /// Every following call fails with `message` (or succeeds again with `None`).
    pub fn set_failure(&self, message: Option<&str>) {
        *self.failure.lock().unwrap_or_else(|p| p.into_inner()) = message.map(|m| m.to_string());
    }

    pub fn calls(&self) -> Vec<(String, String)> {
        self.calls.lock().unwrap_or_else(|p| p.into_inner()).clone()
    }
}

#[async_trait::async_trait]
impl IngestionApi for RecordingIngestionApi {
    async fn start_job(&self, knowledge_base_id: &str, data_source_id: &str) -> Result<IngestionJob, IngestError> {
        let n = {
            let mut calls = self.calls.lock().unwrap_or_else(|p| p.into_inner());
            calls.push((knowledge_base_id.to_string(), data_source_id.to_string()));
            calls.len()
        };
        if let Some(msg) = self.failure.lock().unwrap_or_else(|p| p.into_inner()).clone() {
            return Err(IngestError::IngestionStartFailed(msg));
        }
        Ok(IngestionJob { ingestion_job_id: Some(format!("job-{}", n)), status: Some("STARTING".into()) })
    }
}

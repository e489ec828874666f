//! kbindex ingest: start a knowledge-base data-source sync.
//!
//! Stateless. No retry and no idempotency key: the ingestion API queues or
//! deduplicates concurrent jobs itself, and failures go back to the caller.

#![forbid(unsafe_code)]

pub mod http;
pub mod recording;

use std::sync::Arc;

use kbindex_core::{ChangeType, ResourceChangeEvent, ResourceChangeResult};
use metrics::counter;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

pub use http::HttpIngestionApi;
pub use recording::RecordingIngestionApi;

static ID_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[0-9a-zA-Z]{1,10}$").expect("static regex"));

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IngestError {
    #[error("invalid {field} {value:?}: expected 1-10 alphanumeric characters")]
    InvalidId { field: &'static str, value: String },
    #[error("start ingestion job failed: {0}")]
    IngestionStartFailed(String),
}

/// Properties of an ingestion change event and of scheduled invocations.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct IngestionTarget {
    pub knowledge_base_id: String,
    pub data_source_id: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct IngestionJob {
    #[serde(default)]
    pub ingestion_job_id: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}

/// External ingestion API.
#[async_trait::async_trait]
pub trait IngestionApi: Send + Sync {
    async fn start_job(&self, knowledge_base_id: &str, data_source_id: &str) -> Result<IngestionJob, IngestError>;
}

pub fn validate_id(field: &'static str, value: &str) -> Result<(), IngestError> {
    if ID_RE.is_match(value) {
        Ok(())
    } else {
        Err(IngestError::InvalidId { field, value: value.to_string() })
    }
}

pub struct IngestionTrigger {
    api: Arc<dyn IngestionApi>,
}

impl IngestionTrigger {
    pub fn new(api: Arc<dyn IngestionApi>) -> Self { Self { api } }

    /// Validate both ids and issue exactly one start call.
    pub async fn trigger(&self, knowledge_base_id: &str, data_source_id: &str) -> Result<(), IngestError> {
        validate_id("knowledge base id", knowledge_base_id)?;
        validate_id("data source id", data_source_id)?;
        counter!("ingestion_start_total", 1u64);
        match self.api.start_job(knowledge_base_id, data_source_id).await {
            Ok(job) => {
                info!(kb = %knowledge_base_id, ds = %data_source_id, job = ?job.ingestion_job_id, status = ?job.status, "ingestion job started");
                Ok(())
            }
            Err(e) => {
                counter!("ingestion_start_err", 1u64);
                warn!(kb = %knowledge_base_id, ds = %data_source_id, error = %e, "ingestion job did not start");
                Err(e)
            }
        }
    }

    /// Change-event entry point: syncs once after creation, ignores Update and Delete.
    pub async fn on_change(&self, event: &ResourceChangeEvent<IngestionTarget>) -> Result<ResourceChangeResult, IngestError> {
        let target = &event.properties;
        if event.change_type == ChangeType::Create {
            self.trigger(&target.knowledge_base_id, &target.data_source_id).await?;
        } else {
            info!(change = %event.change_type, ds = %target.data_source_id, "nothing to do for ingestion trigger");
        }
        Ok(ResourceChangeResult::success(event, target.data_source_id.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn id_format() {
        assert!(validate_id("kb", "ABCDEF1234").is_ok());
        assert!(validate_id("kb", "a1").is_ok());
        assert!(validate_id("kb", "").is_err());
        assert!(validate_id("kb", "ABCDEF12345").is_err());
        assert!(validate_id("kb", "abc-def").is_err());
        assert_eq!(
            validate_id("data source id", " x"),
            Err(IngestError::InvalidId { field: "data source id", value: " x".into() })
        );
    }
}

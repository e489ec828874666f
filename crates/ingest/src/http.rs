//! HTTP client for the ingestion API.

use std::sync::Arc;

use kbindex_core::Config;
use kbindex_indexhub::{build_http_client, RequestSigner};
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;
use url::Url;

use crate::{IngestError, IngestionApi, IngestionJob};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StartResponse {
    #[serde(default)]
    ingestion_job: IngestionJob,
}

pub struct HttpIngestionApi {
    client: Client,
    endpoint: Url,
    signer: Arc<dyn RequestSigner>,
}

impl HttpIngestionApi {
    pub fn new(client: Client, endpoint: Url, signer: Arc<dyn RequestSigner>) -> Self {
        Self { client, endpoint, signer }
    }

    pub fn from_config(cfg: &Config, signer: Arc<dyn RequestSigner>) -> Result<Self, IngestError> {
        let client = build_http_client(cfg.http_timeout).map_err(|e| IngestError::IngestionStartFailed(e.to_string()))?;
        Ok(Self::new(client, cfg.ingestion_endpoint.clone(), signer))
    }

    /// `{endpoint}/knowledgebases/{kb}/datasources/{ds}/ingestionjobs/`
    pub fn jobs_url(&self, knowledge_base_id: &str, data_source_id: &str) -> Result<Url, IngestError> {
        let mut url = self.endpoint.clone();
        url.path_segments_mut()
            .map_err(|_| IngestError::IngestionStartFailed(format!("endpoint {} cannot take a path", self.endpoint)))?
            .pop_if_empty()
            .extend(["knowledgebases", knowledge_base_id, "datasources", data_source_id, "ingestionjobs", ""]);
        Ok(url)
    }
}

fn failed(e: impl std::fmt::Display) -> IngestError {
    IngestError::IngestionStartFailed(e.to_string())
}

#[async_trait::async_trait]
impl IngestionApi for HttpIngestionApi {
    async fn start_job(&self, knowledge_base_id: &str, data_source_id: &str) -> Result<IngestionJob, IngestError> {
        let url = self.jobs_url(knowledge_base_id, data_source_id)?;
        let mut request = self.client.put(url).json(&serde_json::json!({})).build().map_err(failed)?;
        self.signer.sign(&mut request).map_err(failed)?;
        let resp = self.client.execute(request).await.map_err(failed)?;
        let status = resp.status();
        let body = match resp.text().await {
            Ok(b) => b,
            Err(e) => {
                debug!(kb = %knowledge_base_id, ds = %data_source_id, error = %e, "start ingestion job response body unreadable");
                format!("<unreadable body: {e}>")
            }
        };
        debug!(kb = %knowledge_base_id, ds = %data_source_id, status = status.as_u16(), "start ingestion job call");
        if !status.is_success() {
            return Err(failed(format!("status {}: {}", status.as_u16(), body)));
        }
        // A 2xx with an unexpected body still means the job was accepted.
        Ok(serde_json::from_str::<StartResponse>(&body).map(|r| r.ingestion_job).unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kbindex_indexhub::Unsigned;

    #[test]
    fn jobs_url_layout() {
        let api = HttpIngestionApi::new(Client::new(), Url::parse("https://bedrock-agent.eu-west-1.amazonaws.com").unwrap(), Arc::new(Unsigned));
        assert_eq!(
            api.jobs_url("KB12345678", "DS12345678").unwrap().as_str(),
            "https://bedrock-agent.eu-west-1.amazonaws.com/knowledgebases/KB12345678/datasources/DS12345678/ingestionjobs/"
        );
    }

    #[test]
    fn start_response_parses_job() {
        let r: StartResponse = serde_json::from_str(r#"{"ingestionJob":{"ingestionJobId":"J1","status":"STARTING","knowledgeBaseId":"KB"}}"#).unwrap();
        assert_eq!(r.ingestion_job.ingestion_job_id.as_deref(), Some("J1"));
        assert_eq!(r.ingestion_job.status.as_deref(), Some("STARTING"));
    }
}

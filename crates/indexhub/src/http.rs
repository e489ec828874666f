//! HTTP index store against the collection endpoint.

use std::sync::Arc;
use std::time::{Duration, Instant};

use kbindex_core::Config;
use metrics::histogram;
use reqwest::{Client, Method, Request, StatusCode};
use tracing::debug;
use url::Url;

use crate::{IndexCreationRequest, IndexStore, StoreError, StoreResult};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Hook that authenticates an outgoing request in place.
///
/// The deployment environment supplies the signer (credentials are not this
/// crate's concern); [`Unsigned`] is used for local stores.
pub trait RequestSigner: Send + Sync {
    fn sign(&self, request: &mut Request) -> Result<(), String>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Unsigned;

impl RequestSigner for Unsigned {
    fn sign(&self, _request: &mut Request) -> Result<(), String> { Ok(()) }
}

pub fn build_http_client(timeout: Duration) -> StoreResult<Client> {
    Client::builder()
        .connect_timeout(CONNECT_TIMEOUT)
        .timeout(timeout)
        .build()
        .map_err(|e| StoreError::Transport(format!("failed to build HTTP client: {e}")))
}

pub struct HttpIndexStore {
    client: Client,
    endpoint: Url,
    signer: Arc<dyn RequestSigner>,
}

impl HttpIndexStore {
    pub fn new(client: Client, endpoint: Url, signer: Arc<dyn RequestSigner>) -> Self {
        Self { client, endpoint, signer }
    }

    pub fn from_config(cfg: &Config, signer: Arc<dyn RequestSigner>) -> StoreResult<Self> {
        Ok(Self::new(build_http_client(cfg.http_timeout)?, cfg.index_endpoint.clone(), signer))
    }

    pub fn index_url(&self, name: &str) -> StoreResult<Url> {
        let mut url = self.endpoint.clone();
        url.path_segments_mut()
            .map_err(|_| StoreError::Invalid(format!("endpoint {} cannot take a path", self.endpoint)))?
            .pop_if_empty()
            .push(name);
        Ok(url)
    }

    async fn send(&self, method: Method, name: &str, body: Option<&serde_json::Value>) -> StoreResult<(StatusCode, String)> {
        let t0 = Instant::now();
        let mut builder = self.client.request(method.clone(), self.index_url(name)?);
        if let Some(b) = body {
            builder = builder.json(b);
        }
        let mut request = builder.build()?;
        self.signer.sign(&mut request).map_err(StoreError::Signing)?;
        let resp = self.client.execute(request).await?;
        let status = resp.status();
        let text = match resp.text().await {
            Ok(t) => t,
            Err(e) => {
                debug!(index = %name, error = %e, "index store response body unreadable");
                format!("<unreadable body: {e}>")
            }
        };
        histogram!("index_store_latency_ms", t0.elapsed().as_secs_f64() * 1000.0);
        debug!(method = %method, index = %name, status = status.as_u16(), "index store call");
        Ok((status, text))
    }
}

#[async_trait::async_trait]
impl IndexStore for HttpIndexStore {
    async fn exists(&self, name: &str) -> StoreResult<bool> {
        match self.send(Method::HEAD, name, None).await? {
            (s, _) if s.is_success() => Ok(true),
            (StatusCode::NOT_FOUND, _) => Ok(false),
            (s, body) => Err(StoreError::Status { code: s.as_u16(), body }),
        }
    }

    async fn create(&self, name: &str, request: &IndexCreationRequest) -> StoreResult<()> {
        let body = request.to_body();
        match self.send(Method::PUT, name, Some(&body)).await? {
            (s, _) if s.is_success() => Ok(()),
            (s, body) => Err(StoreError::Status { code: s.as_u16(), body }),
        }
    }

    async fn delete(&self, name: &str) -> StoreResult<()> {
        match self.send(Method::DELETE, name, None).await? {
            (s, _) if s.is_success() => Ok(()),
            (StatusCode::NOT_FOUND, _) => Err(StoreError::NotFound(name.to_string())),
            (s, body) => Err(StoreError::Status { code: s.as_u16(), body }),
        }
    }
}

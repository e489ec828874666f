//! Process configuration, read once at startup.

use std::time::Duration;

use url::Url;

pub const ENV_INDEX_ENDPOINT: &str = "OPENSEARCH_DOMAIN";
pub const ENV_REGION: &str = "AWS_REGION";
pub const ENV_ACCOUNT_ID: &str = "AWS_ACCOUNT_ID";
pub const ENV_INGESTION_ENDPOINT: &str = "BEDROCK_AGENT_ENDPOINT";
pub const ENV_HTTP_TIMEOUT: &str = "KBINDEX_HTTP_TIMEOUT_SECS";

const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    Missing(&'static str),
    #[error("invalid {var}: {reason}")]
    Invalid { var: &'static str, reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Index-store endpoint (collection endpoint).
    pub index_endpoint: Url,
    pub region: String,
    pub account_id: Option<String>,
    /// Ingestion API base URL.
    pub ingestion_endpoint: Url,
    pub http_timeout: Duration,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|k| std::env::var(k).ok())
    }

    /// Build from an arbitrary variable lookup. Empty values count as missing.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |k: &str| lookup(k).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let endpoint_s = get(ENV_INDEX_ENDPOINT).ok_or(ConfigError::Missing(ENV_INDEX_ENDPOINT))?;
        let index_endpoint = parse_url(ENV_INDEX_ENDPOINT, &endpoint_s)?;
        let region = get(ENV_REGION).ok_or(ConfigError::Missing(ENV_REGION))?;

        let ingestion_endpoint = match get(ENV_INGESTION_ENDPOINT) {
            Some(s) => parse_url(ENV_INGESTION_ENDPOINT, &s)?,
            None => parse_url(ENV_INGESTION_ENDPOINT, &format!("https://bedrock-agent.{}.amazonaws.com", region))?,
        };

        let http_timeout = match get(ENV_HTTP_TIMEOUT) {
            Some(s) => {
                let secs = s.parse::<u64>().map_err(|e| ConfigError::Invalid { var: ENV_HTTP_TIMEOUT, reason: e.to_string() })?;
                Duration::from_secs(secs.max(1))
            }
            None => Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS),
        };

        Ok(Self { index_endpoint, region, account_id: get(ENV_ACCOUNT_ID), ingestion_endpoint, http_timeout })
    }
}

fn parse_url(var: &'static str, s: &str) -> Result<Url, ConfigError> {
    // The framework hands out bare collection hosts as often as full URLs.
    let candidate = if s.contains("://") { s.to_string() } else { format!("https://{}", s) };
    let url = Url::parse(&candidate).map_err(|e| ConfigError::Invalid { var, reason: e.to_string() })?;
    if url.host_str().is_none() {
        return Err(ConfigError::Invalid { var, reason: "URL has no host".into() });
    }
    Ok(url)
}

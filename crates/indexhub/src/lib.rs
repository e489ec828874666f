//! kbindex indexhub: talking to the external index store.
//!
//! The store is the system of record; nothing here caches existence or mapping
//! state between calls.

#![forbid(unsafe_code)]

pub mod http;
pub mod mapping;
pub mod memory;

pub use http::{build_http_client, HttpIndexStore, RequestSigner, Unsigned};
pub use mapping::{FieldKind, FieldMapping, IndexCreationRequest, VectorMethod};
pub use memory::{MemoryIndexStore, StoreCall, StoreOp};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("transport: {0}")]
    Transport(String),
    #[error("index store returned {code}: {body}")]
    Status { code: u16, body: String },
    #[error("index {0:?} not found")]
    NotFound(String),
    #[error("signing request: {0}")]
    Signing(String),
    #[error("invalid request: {0}")]
    Invalid(String),
}

impl From<reqwest::Error> for StoreError {
    fn from(e: reqwest::Error) -> Self {
        StoreError::Transport(e.to_string())
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// External index-management API.
#[async_trait::async_trait]
pub trait IndexStore: Send + Sync {
    async fn exists(&self, name: &str) -> StoreResult<bool>;

    async fn create(&self, name: &str, request: &IndexCreationRequest) -> StoreResult<()>;

    /// Deleting an absent index reports [`StoreError::NotFound`].
    async fn delete(&self, name: &str) -> StoreResult<()>;
}

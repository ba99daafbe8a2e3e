//! External document index used as the sync target.

mod dify;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

pub use dify::DifyClient;

/// Document handle returned by the index after a create or update
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IndexedDocument {
    pub document_id: String,
    pub indexing_status: Option<String>,
}

#[derive(Debug, Error)]
pub enum IndexError {
    #[error("Invalid document index configuration: {0}")]
    InvalidConfiguration(String),
    #[error("Document index request failed: {0}")]
    Http(#[from] reqwest::Error),
    /// Non-2xx response; carries the upstream message verbatim
    #[error("{0}")]
    Api(String),
    #[error("Invalid document index response: {0}")]
    InvalidPayload(String),
}

pub type IndexResult<T> = Result<T, IndexError>;

/// Text-document operations the sync engine needs from the index
#[async_trait]
pub trait DocumentIndex: Send + Sync {
    /// Create a new document and return its identifier
    async fn create_document(&self, name: &str, text: &str) -> IndexResult<IndexedDocument>;

    /// Replace the content of an existing document
    async fn update_document(
        &self,
        document_id: &str,
        name: &str,
        text: &str,
    ) -> IndexResult<IndexedDocument>;

    /// Remove a document from the index
    async fn delete_document(&self, document_id: &str) -> IndexResult<()>;
}

//! Dify knowledge-base dataset client.

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;

use super::{DocumentIndex, IndexError, IndexResult, IndexedDocument};
use crate::config::DifyConfig;
use crate::util::{compact_text, is_http_url, sanitize};

#[derive(Clone)]
pub struct DifyClient {
    api_url: String,
    api_key: String,
    dataset_id: String,
    client: reqwest::Client,
}

impl std::fmt::Debug for DifyClient {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("DifyClient")
            .field("api_url", &self.api_url)
            .field("api_key", &"[REDACTED]")
            .field("dataset_id", &self.dataset_id)
            .finish_non_exhaustive()
    }
}

impl DifyClient {
    /// Build a client, rejecting incomplete credentials before any request is made.
    pub fn new(config: DifyConfig) -> IndexResult<Self> {
        let api_key = config.api_key.trim();
        if api_key.is_empty() {
            return Err(IndexError::InvalidConfiguration(
                "Dify API key must not be empty".to_string(),
            ));
        }
        let dataset_id = config.dataset_id.trim();
        if dataset_id.is_empty() {
            return Err(IndexError::InvalidConfiguration(
                "Dify dataset id must not be empty".to_string(),
            ));
        }
        let api_url = config.api_url.trim().trim_end_matches('/');
        if !is_http_url(api_url) {
            return Err(IndexError::InvalidConfiguration(
                "Dify API URL must include http:// or https://".to_string(),
            ));
        }

        Ok(Self {
            api_url: api_url.to_string(),
            api_key: api_key.to_string(),
            dataset_id: dataset_id.to_string(),
            client: reqwest::Client::builder().timeout(config.timeout).build()?,
        })
    }

    fn create_url(&self) -> String {
        format!(
            "{}/datasets/{}/document/create-by-text",
            self.api_url, self.dataset_id
        )
    }

    fn update_url(&self, document_id: &str) -> String {
        format!(
            "{}/datasets/{}/documents/{}/update-by-text",
            self.api_url, self.dataset_id, document_id
        )
    }

    fn document_url(&self, document_id: &str) -> String {
        format!(
            "{}/datasets/{}/documents/{}",
            self.api_url, self.dataset_id, document_id
        )
    }

    async fn send_document_request(
        &self,
        request: reqwest::RequestBuilder,
    ) -> IndexResult<IndexedDocument> {
        let response = request
            .bearer_auth(&self.api_key)
            .header("Accept", "application/json")
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(IndexError::Api(parse_api_error(status, &body)));
        }

        let payload = response.json::<DocumentResponse>().await.map_err(|error| {
            IndexError::InvalidPayload(format!("response body parse failed: {}", sanitize(&error)))
        })?;
        payload.try_into()
    }
}

#[async_trait]
impl DocumentIndex for DifyClient {
    async fn create_document(&self, name: &str, text: &str) -> IndexResult<IndexedDocument> {
        let body = serde_json::json!({
            "name": name,
            "text": text,
            "indexing_technique": "high_quality",
            "process_rule": {
                "mode": "automatic"
            }
        });

        let document = self
            .send_document_request(self.client.post(self.create_url()).json(&body))
            .await?;
        tracing::debug!(
            document_id = %document.document_id,
            indexing_status = document.indexing_status.as_deref().unwrap_or("unknown"),
            "Created Dify document"
        );
        Ok(document)
    }

    async fn update_document(
        &self,
        document_id: &str,
        name: &str,
        text: &str,
    ) -> IndexResult<IndexedDocument> {
        let body = serde_json::json!({
            "name": name,
            "text": text,
        });

        let document = self
            .send_document_request(self.client.post(self.update_url(document_id)).json(&body))
            .await?;
        tracing::debug!(
            document_id = %document.document_id,
            indexing_status = document.indexing_status.as_deref().unwrap_or("unknown"),
            "Updated Dify document"
        );
        Ok(document)
    }

    async fn delete_document(&self, document_id: &str) -> IndexResult<()> {
        let response = self
            .client
            .delete(self.document_url(document_id))
            .bearer_auth(&self.api_key)
            .header("Accept", "application/json")
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(IndexError::Api(parse_api_error(status, &body)));
        }

        tracing::debug!(document_id, "Deleted Dify document");
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
struct DocumentResponse {
    document: Option<DocumentBody>,
}

#[derive(Debug, Deserialize)]
struct DocumentBody {
    id: Option<String>,
    indexing_status: Option<String>,
}

impl TryFrom<DocumentResponse> for IndexedDocument {
    type Error = IndexError;

    fn try_from(value: DocumentResponse) -> IndexResult<Self> {
        let document = value.document.ok_or_else(|| {
            IndexError::InvalidPayload("response did not include `document`".to_string())
        })?;

        let document_id = document
            .id
            .map(|id| id.trim().to_string())
            .filter(|id| !id.is_empty())
            .ok_or_else(|| {
                IndexError::InvalidPayload("response did not include `document.id`".to_string())
            })?;

        Ok(Self {
            document_id,
            indexing_status: document.indexing_status,
        })
    }
}

#[derive(Debug, Deserialize)]
struct DifyErrorBody {
    code: Option<String>,
    message: Option<String>,
}

fn parse_api_error(status: StatusCode, body: &str) -> String {
    if let Ok(payload) = serde_json::from_str::<DifyErrorBody>(body) {
        if let Some(message) = payload.message {
            return match payload.code {
                Some(code) => format!("{} [{}] ({})", message.trim(), code, status.as_u16()),
                None => format!("{} ({})", message.trim(), status.as_u16()),
            };
        }
    }

    let trimmed = compact_text(body);
    if trimmed.is_empty() {
        format!("HTTP {status}")
    } else {
        format!("{} ({})", trimmed, status.as_u16())
    }
}

//! OpenSearch provider implementation.
//!
//! This module provides the concrete implementation of `SearchIndexProvider`
//! using the OpenSearch Rust crate.

use std::time::Duration;

use async_trait::async_trait;
use opensearch::{
    http::transport::{SingleNodeConnectionPool, TransportBuilder},
    indices::{IndicesCreateParts, IndicesExistsParts},
    GetParts, IndexParts, OpenSearch,
};
use serde_json::Value;
use tracing::{debug, error, info};
use url::Url;

use crate::errors::SearchIndexError;
use crate::interfaces::SearchIndexProvider;
use crate::opensearch::index_config::{get_index_settings, IndexConfig};
use crate::utils;
use catalog_indexer_shared::WorkDocument;

/// OpenSearch provider implementation.
///
/// # Example
///
/// ```ignore
/// use catalog_indexer_repository::opensearch::IndexConfig;
/// let config = IndexConfig::new("sfr_works");
/// let provider = OpenSearchProvider::new("http://localhost:9200", config, Duration::from_secs(30)).await?;
///
/// let existing = provider.get_document(&doc_id).await?;
/// provider.upsert_document(&doc_id, &document).await?;
/// ```
pub struct OpenSearchProvider {
    client: OpenSearch,
    index_config: IndexConfig,
}

impl OpenSearchProvider {
    /// Create a new OpenSearch provider connected to the specified URL.
    ///
    /// # Arguments
    ///
    /// * `url` - The OpenSearch server URL (e.g., "http://localhost:9200")
    /// * `index_config` - The index configuration
    /// * `timeout` - Per-request transport timeout
    ///
    /// # Returns
    ///
    /// * `Ok(OpenSearchProvider)` - A new provider instance
    /// * `Err(SearchIndexError)` - If connection setup fails
    pub async fn new(
        url: &str,
        index_config: IndexConfig,
        timeout: Duration,
    ) -> Result<Self, SearchIndexError> {
        let parsed_url =
            Url::parse(url).map_err(|e| SearchIndexError::connection(e.to_string()))?;

        let conn_pool = SingleNodeConnectionPool::new(parsed_url);
        let transport = TransportBuilder::new(conn_pool)
            .disable_proxy()
            .timeout(timeout)
            .build()
            .map_err(|e| SearchIndexError::connection(e.to_string()))?;

        let client = OpenSearch::new(transport);

        info!(
            url = %url,
            index = %index_config.name,
            timeout_secs = timeout.as_secs(),
            "Created OpenSearch provider"
        );

        Ok(Self {
            client,
            index_config,
        })
    }

    /// Extract the stored document from a get response body.
    ///
    /// Returns `Ok(None)` when the body reports `"found": false`.
    fn parse_get_response(body: Value) -> Result<Option<WorkDocument>, SearchIndexError> {
        if body.get("found").and_then(Value::as_bool) == Some(false) {
            return Ok(None);
        }

        let source = body
            .get("_source")
            .cloned()
            .ok_or_else(|| SearchIndexError::parse("Get response has no _source"))?;

        serde_json::from_value(source)
            .map(Some)
            .map_err(|e| SearchIndexError::parse(format!("Invalid stored document: {}", e)))
    }

    /// Whether a failed create request only lost a race with another creator.
    fn is_already_exists(body: &str) -> bool {
        body.contains("resource_already_exists_exception")
    }
}

#[async_trait]
impl SearchIndexProvider for OpenSearchProvider {
    async fn ensure_index_exists(&self) -> Result<(), SearchIndexError> {
        let index_name = self.index_config.name.as_str();

        let response = self
            .client
            .indices()
            .exists(IndicesExistsParts::Index(&[index_name]))
            .send()
            .await
            .map_err(|e| SearchIndexError::connection(e.to_string()))?;

        if response.status_code().is_success() {
            info!(index = %index_name, "Search index already exists");
            return Ok(());
        }

        info!(index = %index_name, "Initializing search index");

        let response = self
            .client
            .indices()
            .create(IndicesCreateParts::Index(index_name))
            .body(get_index_settings(&self.index_config))
            .send()
            .await
            .map_err(|e| SearchIndexError::index_creation(e.to_string()))?;

        let status = response.status_code();
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            if Self::is_already_exists(&error_body) {
                info!(index = %index_name, "Search index created concurrently");
                return Ok(());
            }
            error!(status = %status, body = %error_body, "Index creation failed");
            return Err(SearchIndexError::index_creation(format!(
                "Index creation failed with status {}: {}",
                status, error_body
            )));
        }

        info!(index = %index_name, "Search index created");
        Ok(())
    }

    /// Fetch a stored document. A 404 is the normal "create" path and yields `Ok(None)`.
    async fn get_document(
        &self,
        document_id: &str,
    ) -> Result<Option<WorkDocument>, SearchIndexError> {
        utils::validate_document_id(document_id)?;

        let response = self
            .client
            .get(GetParts::IndexId(&self.index_config.name, document_id))
            .send()
            .await
            .map_err(|e| SearchIndexError::get(e.to_string()))?;

        let status = response.status_code();
        if status.as_u16() == 404 {
            debug!(doc_id = %document_id, "Document not found");
            return Ok(None);
        }

        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            error!(status = %status, body = %error_body, "Get request failed");
            return Err(SearchIndexError::get(format!(
                "Get failed with status {}: {}",
                status, error_body
            )));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| SearchIndexError::parse(e.to_string()))?;

        Self::parse_get_response(body)
    }

    /// Write the full document with the index API, replacing any stored body.
    async fn upsert_document(
        &self,
        document_id: &str,
        document: &WorkDocument,
    ) -> Result<(), SearchIndexError> {
        utils::validate_document_id(document_id)?;

        let body = serde_json::to_value(document)
            .map_err(|e| SearchIndexError::serialization(e.to_string()))?;

        let response = self
            .client
            .index(IndexParts::IndexId(&self.index_config.name, document_id))
            .body(body)
            .send()
            .await
            .map_err(|e| SearchIndexError::upsert(e.to_string()))?;

        let status = response.status_code();
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            error!(status = %status, body = %error_body, "Upsert request failed");
            return Err(SearchIndexError::upsert(format!(
                "Upsert failed with status {}: {}",
                status, error_body
            )));
        }

        debug!(doc_id = %document_id, "Document indexed");
        Ok(())
    }
}

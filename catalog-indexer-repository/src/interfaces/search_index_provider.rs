//! Search index provider trait definition.
//!
//! This module defines the abstract interface for search index operations,
//! allowing for different backend implementations (OpenSearch, Elasticsearch, etc.).

use async_trait::async_trait;

use crate::errors::SearchIndexError;
use catalog_indexer_shared::WorkDocument;

/// Abstracts the underlying search index implementation (OpenSearch, Elasticsearch, etc.).
///
/// Implementations are injected into the index writer to enable dependency
/// injection and easy testing with mock implementations.
///
/// # Upsert semantics
///
/// `upsert_document` always replaces the whole stored document. There is no
/// field-level merge with a previously stored body, so re-indexing the same
/// work twice converges to the same stored state.
///
/// # Index Initialization
///
/// Implementations should call `ensure_index_exists` during application startup to ensure
/// the search index and its mapping are in place before performing document operations.
#[async_trait]
pub trait SearchIndexProvider: Send + Sync {
    /// Ensure the search index exists with the work mapping, creating it if necessary.
    ///
    /// # Returns
    ///
    /// * `Ok(())` - If the index is ready for use
    /// * `Err(SearchIndexError)` - If initialization fails
    async fn ensure_index_exists(&self) -> Result<(), SearchIndexError>;

    /// Fetch a stored document by id.
    ///
    /// # Arguments
    ///
    /// * `document_id` - The work uuid in 32-character hex form
    ///
    /// # Returns
    ///
    /// * `Ok(Some(WorkDocument))` - The stored document
    /// * `Ok(None)` - If no document is stored under this id
    /// * `Err(SearchIndexError)` - On transport or parse failures
    async fn get_document(
        &self,
        document_id: &str,
    ) -> Result<Option<WorkDocument>, SearchIndexError>;

    /// Insert the document, or fully replace it if one is already stored under this id.
    ///
    /// # Arguments
    ///
    /// * `document_id` - The work uuid in 32-character hex form
    /// * `document` - The complete document body
    ///
    /// # Returns
    ///
    /// * `Ok(())` - If the document was written
    /// * `Err(SearchIndexError)` - If the store rejected the write
    async fn upsert_document(
        &self,
        document_id: &str,
        document: &WorkDocument,
    ) -> Result<(), SearchIndexError>;
}

//! Work store trait definition.
//!
//! The relational catalog is the source of truth for every indexed work.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::errors::WorkStoreError;
use catalog_indexer_shared::{ChangedWork, WorkGraph};

/// Read access to the relational catalog.
///
/// Implementors supply recently modified work ids in keyset pages and fully
/// materialized work graphs.
#[async_trait]
pub trait WorkStore: Send + Sync {
    /// Return one page of works modified at or after `since`.
    ///
    /// Pages are ordered by id; pass the last id of the previous page as
    /// `after_id` to continue. An empty page marks the end of the result set.
    async fn fetch_modified_since(
        &self,
        since: DateTime<Utc>,
        after_id: i64,
        limit: i64,
    ) -> Result<Vec<ChangedWork>, WorkStoreError>;

    /// Load the complete entity graph of one work.
    async fn fetch_graph(&self, uuid: &Uuid) -> Result<WorkGraph, WorkStoreError>;
}

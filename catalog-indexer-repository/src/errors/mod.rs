//! Error types for the catalog indexer repository.
//!
//! One error type per collaborator: the search index and the work store.

mod search_index_error;
mod work_store_error;

pub use search_index_error::SearchIndexError;
pub use work_store_error::WorkStoreError;

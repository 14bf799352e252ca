//! Interface definitions for the repository collaborators.
//!
//! This module defines the abstract `SearchIndexProvider` and `WorkStore`
//! traits that allow for dependency injection and swappable backends.

mod search_index_provider;
mod work_store;

pub use search_index_provider::SearchIndexProvider;
pub use work_store::WorkStore;

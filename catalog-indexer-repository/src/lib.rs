//! # Catalog Indexer Repository
//!
//! This crate provides traits and implementations for the two stores the
//! catalog indexer talks to: the relational work store (PostgreSQL) and the
//! search index (OpenSearch). It includes definitions for errors, interfaces,
//! index mappings and the concrete backends.

pub mod errors;
pub mod interfaces;
pub mod opensearch;
pub mod postgres;
pub mod utils;

pub use errors::{SearchIndexError, WorkStoreError};
pub use interfaces::{SearchIndexProvider, WorkStore};
pub use opensearch::{IndexConfig, OpenSearchProvider};
pub use postgres::PostgresWorkStore;
pub use utils::validate_document_id;

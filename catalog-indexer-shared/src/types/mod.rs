//! This module defines the core data structures used across the catalog indexer.
//! It re-exports the source graph, search document and queue message types.

pub mod date_range;
pub mod index_message;
pub mod work_document;
pub mod work_graph;

pub use date_range::{DateRange, PartialDate};
pub use index_message::IndexMessage;
pub use work_document::WorkDocument;
pub use work_graph::WorkGraph;

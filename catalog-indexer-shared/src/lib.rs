//! # Catalog Indexer Shared
//!
//! This crate defines shared data structures used across the catalog indexer.
//! It includes the fully materialized source-side work graph, the nested
//! search documents produced from it, and the queue message exchanged between
//! the change-detection and indexing stages.

pub mod types;

pub use types::date_range::{DateRange, PartialDate};
pub use types::index_message::{IndexMessage, RecordType};
pub use types::work_document::{
    document_id_for, AccessReportDocument, AgentDocument, IdentifierDocument, InstanceDocument,
    ItemDocument, LinkDocument, MeasurementDocument, SubjectDocument, WorkDocument,
};
pub use types::work_graph::{
    AccessReportRecord, AgentRecord, AgentRole, ChangedWork, DateRecord, IdentifierRecord,
    IdentifierValue, InstanceRecord, ItemRecord, LinkRecord, MeasurementRecord, RawDateRange,
    SubjectRecord, WorkGraph,
};

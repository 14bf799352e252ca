//! Processor module for the catalog indexer.
//!
//! Converts work graphs into nested search documents.

mod agents;
mod converter;
mod date_range;
mod flattener;

pub use agents::dedupe_agents;
pub use converter::{
    convert_access_report, convert_agent, convert_identifier, convert_instance, convert_item,
    convert_link, convert_measurement, convert_subject,
};
pub use date_range::{normalize_date, NormalizedDate};
pub use flattener::GraphFlattener;

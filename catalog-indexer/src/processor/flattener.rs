//! Work graph flattening.
//!
//! Transforms a fully materialized `WorkGraph` into the nested `WorkDocument`
//! stored in the search index.

use tracing::{debug, instrument};

use catalog_indexer_shared::{document_id_for, WorkDocument, WorkGraph};

use crate::errors::IngestError;
use crate::processor::agents::dedupe_agents;
use crate::processor::converter::{
    convert_identifiers, convert_instance, convert_links, convert_measurements, convert_subject,
};
use crate::processor::date_range::normalize_date;

/// Flattener that converts work graphs into search documents.
///
/// Flattening is a pure function of the graph: the same graph always produces
/// the same document, and every field of the target is overwritten.
#[derive(Debug, Default, Clone)]
pub struct GraphFlattener {}

impl GraphFlattener {
    /// Create a new graph flattener.
    pub fn new() -> Self {
        Self {}
    }

    /// Flatten a graph into a new document.
    pub fn flatten(&self, graph: &WorkGraph) -> Result<WorkDocument, IngestError> {
        let mut doc = WorkDocument::new(&graph.uuid);
        self.flatten_into(&mut doc, graph)?;
        Ok(doc)
    }

    /// Flatten a graph over an existing document.
    ///
    /// Every field and collection of `doc` is replaced; nothing of its prior
    /// content survives. On error `doc` is left untouched.
    #[instrument(skip(self, doc, graph), fields(work = %graph.uuid))]
    pub fn flatten_into(&self, doc: &mut WorkDocument, graph: &WorkGraph) -> Result<(), IngestError> {
        let issued = normalize_date(&graph.dates, "issued")?.unwrap_or_default();
        let created = normalize_date(&graph.dates, "created")?.unwrap_or_default();
        let agents = dedupe_agents(&graph.agents)?;
        let identifiers = convert_identifiers(&graph.identifiers)?;
        let instances = graph
            .instances
            .iter()
            .map(convert_instance)
            .collect::<Result<Vec<_>, _>>()?;

        doc.uuid = document_id_for(&graph.uuid);
        doc.title = graph.title.clone();
        doc.sort_title = graph.sort_title.clone();
        doc.language = graph.language.clone();
        doc.license = graph.license.clone();
        doc.rights_statement = graph.rights_statement.clone();
        doc.medium = graph.medium.clone();
        doc.series = graph.series.clone();
        doc.series_position = graph.series_position;
        doc.date_created = graph.date_created;
        doc.date_modified = graph.date_modified;
        doc.issued = issued.range;
        doc.issued_display = issued.display;
        doc.created = created.range;
        doc.created_display = created.display;
        doc.alt_titles = graph.alt_titles.clone();
        doc.subjects = graph.subjects.iter().map(convert_subject).collect();
        doc.agents = agents;
        doc.identifiers = identifiers;
        doc.measurements = convert_measurements(&graph.measurements);
        doc.links = convert_links(&graph.links);
        doc.instances = instances;

        debug!(
            instance_count = doc.instances.len(),
            agent_count = doc.agents.len(),
            subject_count = doc.subjects.len(),
            "Flattened work graph"
        );

        Ok(())
    }
}

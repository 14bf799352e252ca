//! Search document types.
//!
//! A `WorkDocument` is one self-contained nested document in the search index.
//! Every nested entity is a plain value produced fresh by each flattening pass.
//! Date ranges are paired with a `<field>_display` sibling carrying the
//! human-readable rendering.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::date_range::DateRange;

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MeasurementDocument {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quantity: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub weight: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub taken_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AccessReportDocument {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ace_version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
    pub measurements: Vec<MeasurementDocument>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SubjectDocument {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub authority: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uri: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub weight: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkDocument {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub media_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rel_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thumbnail: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct IdentifierDocument {
    pub id_type: String,
    pub identifier: String,
}

/// An agent as it appears on one entity.
///
/// `roles` accumulates every role the agent is credited with on the owning
/// entity, in encounter order and without repeats.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentDocument {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sort_name: Option<String>,
    pub aliases: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lcnaf: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub viaf: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub birth_date: Option<DateRange>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub birth_date_display: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub death_date: Option<DateRange>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub death_date_display: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub biography: Option<String>,
    pub roles: Vec<String>,
    pub links: Vec<LinkDocument>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ItemDocument {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub modified: Option<DateRange>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub modified_display: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub drm: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rights_uri: Option<String>,
    pub agents: Vec<AgentDocument>,
    pub measurements: Vec<MeasurementDocument>,
    pub identifiers: Vec<IdentifierDocument>,
    pub links: Vec<LinkDocument>,
    pub access_reports: Vec<AccessReportDocument>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct InstanceDocument {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sub_title: Option<String>,
    pub alt_titles: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pub_place: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pub_date: Option<DateRange>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pub_date_display: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub edition: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub edition_statement: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub table_of_contents: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub copyright_date: Option<DateRange>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub copyright_date_display: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extent: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub license: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rights_statement: Option<String>,
    pub items: Vec<ItemDocument>,
    pub agents: Vec<AgentDocument>,
    pub measurements: Vec<MeasurementDocument>,
    pub identifiers: Vec<IdentifierDocument>,
    pub links: Vec<LinkDocument>,
}

/// Document representation of a work in the search index.
///
/// The document id is the work's uuid in its 32-character hex form.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkDocument {
    pub uuid: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sort_title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub license: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rights_statement: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub medium: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub series: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub series_position: Option<i16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_created: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_modified: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub issued: Option<DateRange>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub issued_display: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created: Option<DateRange>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_display: Option<String>,
    pub alt_titles: Vec<String>,
    pub subjects: Vec<SubjectDocument>,
    pub agents: Vec<AgentDocument>,
    pub identifiers: Vec<IdentifierDocument>,
    pub measurements: Vec<MeasurementDocument>,
    pub links: Vec<LinkDocument>,
    pub instances: Vec<InstanceDocument>,
}

impl WorkDocument {
    /// Create an empty document shell for the given work.
    ///
    /// # Example
    ///
    /// ```
    /// use catalog_indexer_shared::WorkDocument;
    /// use uuid::Uuid;
    ///
    /// let uuid = Uuid::parse_str("550e8400-e29b-41d4-a716-446655440000").unwrap();
    /// let doc = WorkDocument::new(&uuid);
    /// assert_eq!(doc.uuid, "550e8400e29b41d4a716446655440000");
    /// ```
    pub fn new(uuid: &Uuid) -> Self {
        Self {
            uuid: document_id_for(uuid),
            ..Default::default()
        }
    }
}

/// Render a work uuid as a search document id (32 hex characters, no dashes).
pub fn document_id_for(uuid: &Uuid) -> String {
    uuid.simple().to_string()
}

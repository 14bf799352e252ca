//! Source-side records for one catalog work.
//!
//! A `WorkGraph` is fully materialized by the work store before flattening
//! begins, so converting it into a search document never performs I/O.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::date_range::PartialDate;

/// Identifier pair yielded by the change query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangedWork {
    pub id: i64,
    pub uuid: Uuid,
}

/// An explicitly stored date interval. Either side may be open.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RawDateRange {
    pub lower: Option<PartialDate>,
    pub upper: Option<PartialDate>,
}

/// A typed date attached to a work, instance, item or agent.
///
/// `date_type` names the date (`issued`, `birth_date`, ...). The display
/// string, the explicit range and the single value are independent columns
/// and any of them may be missing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRecord {
    pub date_type: String,
    pub display_date: Option<String>,
    pub date_range: Option<RawDateRange>,
    pub date: Option<PartialDate>,
}

impl DateRecord {
    /// A date known only as a single value.
    pub fn single(date_type: impl Into<String>, date: PartialDate) -> Self {
        Self {
            date_type: date_type.into(),
            display_date: None,
            date_range: None,
            date: Some(date),
        }
    }

    /// A date stored as an explicit range.
    pub fn range(
        date_type: impl Into<String>,
        lower: Option<PartialDate>,
        upper: Option<PartialDate>,
    ) -> Self {
        Self {
            date_type: date_type.into(),
            display_date: None,
            date_range: Some(RawDateRange { lower, upper }),
            date: None,
        }
    }

    /// Attach a stored display string.
    pub fn with_display(mut self, display: impl Into<String>) -> Self {
        self.display_date = Some(display.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct MeasurementRecord {
    pub quantity: Option<String>,
    pub value: Option<f64>,
    pub weight: Option<f64>,
    pub taken_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct AccessReportRecord {
    pub ace_version: Option<String>,
    pub score: Option<f64>,
    pub measurements: Vec<MeasurementRecord>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SubjectRecord {
    pub authority: Option<String>,
    pub uri: Option<String>,
    pub subject: Option<String>,
    pub weight: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct LinkRecord {
    pub url: Option<String>,
    pub media_type: Option<String>,
    pub content: Option<String>,
    pub rel_type: Option<String>,
    pub thumbnail: Option<i64>,
}

/// One value of an identifier, tagged with the identifier scheme it belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentifierValue {
    pub id_type: String,
    pub value: String,
}

/// An identifier row with its typed sub-records.
///
/// Exactly one sub-record is expected to match `id_type`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentifierRecord {
    pub id_type: String,
    pub values: Vec<IdentifierValue>,
}

impl IdentifierRecord {
    /// An identifier whose single sub-record matches its declared type.
    pub fn new(id_type: impl Into<String>, value: impl Into<String>) -> Self {
        let id_type = id_type.into();
        Self {
            values: vec![IdentifierValue {
                id_type: id_type.clone(),
                value: value.into(),
            }],
            id_type,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentRecord {
    pub name: String,
    pub sort_name: Option<String>,
    pub aliases: Vec<String>,
    pub lcnaf: Option<String>,
    pub viaf: Option<String>,
    pub biography: Option<String>,
    pub dates: Vec<DateRecord>,
    pub links: Vec<LinkRecord>,
}

impl AgentRecord {
    /// An agent with only a name.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            sort_name: None,
            aliases: Vec::new(),
            lcnaf: None,
            viaf: None,
            biography: None,
            dates: Vec::new(),
            links: Vec::new(),
        }
    }
}

/// An agent credited on an entity in one role.
///
/// The same agent may appear several times on one entity with different roles.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentRole {
    pub agent: AgentRecord,
    pub role: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ItemRecord {
    pub source: Option<String>,
    pub content_type: Option<String>,
    pub drm: Option<String>,
    pub rights_uri: Option<String>,
    pub dates: Vec<DateRecord>,
    pub agents: Vec<AgentRole>,
    pub measurements: Vec<MeasurementRecord>,
    pub identifiers: Vec<IdentifierRecord>,
    pub links: Vec<LinkRecord>,
    pub access_reports: Vec<AccessReportRecord>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct InstanceRecord {
    pub title: Option<String>,
    pub sub_title: Option<String>,
    pub alt_titles: Vec<String>,
    pub pub_place: Option<String>,
    pub edition: Option<String>,
    pub edition_statement: Option<String>,
    pub table_of_contents: Option<String>,
    pub language: Option<String>,
    pub extent: Option<String>,
    pub license: Option<String>,
    pub rights_statement: Option<String>,
    pub dates: Vec<DateRecord>,
    pub items: Vec<ItemRecord>,
    pub agents: Vec<AgentRole>,
    pub measurements: Vec<MeasurementRecord>,
    pub identifiers: Vec<IdentifierRecord>,
    pub links: Vec<LinkRecord>,
}

/// The full hierarchical record for one catalog work.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkGraph {
    pub id: i64,
    pub uuid: Uuid,
    pub title: Option<String>,
    pub sort_title: Option<String>,
    pub language: Option<String>,
    pub license: Option<String>,
    pub rights_statement: Option<String>,
    pub medium: Option<String>,
    pub series: Option<String>,
    pub series_position: Option<i16>,
    pub date_created: Option<DateTime<Utc>>,
    pub date_modified: Option<DateTime<Utc>>,
    pub dates: Vec<DateRecord>,
    pub alt_titles: Vec<String>,
    pub subjects: Vec<SubjectRecord>,
    pub agents: Vec<AgentRole>,
    pub identifiers: Vec<IdentifierRecord>,
    pub measurements: Vec<MeasurementRecord>,
    pub links: Vec<LinkRecord>,
    pub instances: Vec<InstanceRecord>,
}

impl WorkGraph {
    /// An empty graph for the given work, with every collection empty.
    pub fn empty(id: i64, uuid: Uuid) -> Self {
        Self {
            id,
            uuid,
            title: None,
            sort_title: None,
            language: None,
            license: None,
            rights_statement: None,
            medium: None,
            series: None,
            series_position: None,
            date_created: None,
            date_modified: None,
            dates: Vec::new(),
            alt_titles: Vec::new(),
            subjects: Vec::new(),
            agents: Vec::new(),
            identifiers: Vec::new(),
            measurements: Vec::new(),
            links: Vec::new(),
            instances: Vec::new(),
        }
    }
}

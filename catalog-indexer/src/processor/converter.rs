//! Entity converters.
//!
//! One explicit field mapping per source record type. Nested collections are
//! always built into fresh vectors, so a converted entity never carries state
//! from an earlier document.

use catalog_indexer_shared::{
    AccessReportDocument, AccessReportRecord, AgentDocument, AgentRecord, IdentifierDocument,
    IdentifierRecord, InstanceDocument, InstanceRecord, ItemDocument, ItemRecord, LinkDocument,
    LinkRecord, MeasurementDocument, MeasurementRecord, SubjectDocument, SubjectRecord,
};

use crate::errors::IngestError;
use crate::processor::agents::dedupe_agents;
use crate::processor::date_range::normalize_date;

pub fn convert_measurement(measurement: &MeasurementRecord) -> MeasurementDocument {
    MeasurementDocument {
        quantity: measurement.quantity.clone(),
        value: measurement.value,
        weight: measurement.weight,
        taken_at: measurement.taken_at,
    }
}

pub fn convert_measurements(measurements: &[MeasurementRecord]) -> Vec<MeasurementDocument> {
    measurements.iter().map(convert_measurement).collect()
}

pub fn convert_access_report(report: &AccessReportRecord) -> AccessReportDocument {
    AccessReportDocument {
        ace_version: report.ace_version.clone(),
        score: report.score,
        measurements: convert_measurements(&report.measurements),
    }
}

pub fn convert_subject(subject: &SubjectRecord) -> SubjectDocument {
    SubjectDocument {
        authority: subject.authority.clone(),
        uri: subject.uri.clone(),
        subject: subject.subject.clone(),
        weight: subject.weight,
    }
}

pub fn convert_link(link: &LinkRecord) -> LinkDocument {
    LinkDocument {
        url: link.url.clone(),
        media_type: link.media_type.clone(),
        content: link.content.clone(),
        rel_type: link.rel_type.clone(),
        thumbnail: link.thumbnail,
    }
}

pub fn convert_links(links: &[LinkRecord]) -> Vec<LinkDocument> {
    links.iter().map(convert_link).collect()
}

/// Convert an identifier, taking its value from the first sub-record whose
/// type matches the declared type.
///
/// # Errors
///
/// Returns a data-shape error when no sub-record matches.
pub fn convert_identifier(identifier: &IdentifierRecord) -> Result<IdentifierDocument, IngestError> {
    let value = identifier
        .values
        .iter()
        .find(|v| v.id_type == identifier.id_type)
        .ok_or_else(|| {
            IngestError::data_shape(format!(
                "Identifier of type '{}' has no matching value",
                identifier.id_type
            ))
        })?;

    Ok(IdentifierDocument {
        id_type: identifier.id_type.clone(),
        identifier: value.value.clone(),
    })
}

pub fn convert_identifiers(
    identifiers: &[IdentifierRecord],
) -> Result<Vec<IdentifierDocument>, IngestError> {
    identifiers.iter().map(convert_identifier).collect()
}

/// Convert an agent with no roles attached. Roles are added by the deduplicator.
pub fn convert_agent(agent: &AgentRecord) -> Result<AgentDocument, IngestError> {
    let mut doc = AgentDocument {
        name: agent.name.clone(),
        sort_name: agent.sort_name.clone(),
        aliases: Vec::with_capacity(agent.aliases.len()),
        lcnaf: agent.lcnaf.clone(),
        viaf: agent.viaf.clone(),
        biography: agent.biography.clone(),
        links: convert_links(&agent.links),
        ..Default::default()
    };

    for alias in &agent.aliases {
        if !doc.aliases.contains(alias) {
            doc.aliases.push(alias.clone());
        }
    }

    if let Some(birth) = normalize_date(&agent.dates, "birth_date")? {
        doc.birth_date = birth.range;
        doc.birth_date_display = birth.display;
    }
    if let Some(death) = normalize_date(&agent.dates, "death_date")? {
        doc.death_date = death.range;
        doc.death_date_display = death.display;
    }

    Ok(doc)
}

pub fn convert_item(item: &ItemRecord) -> Result<ItemDocument, IngestError> {
    let mut doc = ItemDocument {
        source: item.source.clone(),
        content_type: item.content_type.clone(),
        drm: item.drm.clone(),
        rights_uri: item.rights_uri.clone(),
        agents: dedupe_agents(&item.agents)?,
        measurements: convert_measurements(&item.measurements),
        identifiers: convert_identifiers(&item.identifiers)?,
        links: convert_links(&item.links),
        access_reports: item.access_reports.iter().map(convert_access_report).collect(),
        ..Default::default()
    };

    if let Some(modified) = normalize_date(&item.dates, "modified")? {
        doc.modified = modified.range;
        doc.modified_display = modified.display;
    }

    Ok(doc)
}

pub fn convert_instance(instance: &InstanceRecord) -> Result<InstanceDocument, IngestError> {
    let mut doc = InstanceDocument {
        title: instance.title.clone(),
        sub_title: instance.sub_title.clone(),
        alt_titles: instance.alt_titles.clone(),
        pub_place: instance.pub_place.clone(),
        edition: instance.edition.clone(),
        edition_statement: instance.edition_statement.clone(),
        table_of_contents: instance.table_of_contents.clone(),
        language: instance.language.clone(),
        extent: instance.extent.clone(),
        license: instance.license.clone(),
        rights_statement: instance.rights_statement.clone(),
        items: instance
            .items
            .iter()
            .map(convert_item)
            .collect::<Result<_, _>>()?,
        agents: dedupe_agents(&instance.agents)?,
        measurements: convert_measurements(&instance.measurements),
        identifiers: convert_identifiers(&instance.identifiers)?,
        links: convert_links(&instance.links),
        ..Default::default()
    };

    if let Some(pub_date) = normalize_date(&instance.dates, "pub_date")? {
        doc.pub_date = pub_date.range;
        doc.pub_date_display = pub_date.display;
    }
    if let Some(copyright) = normalize_date(&instance.dates, "copyright_date")? {
        doc.copyright_date = copyright.range;
        doc.copyright_date_display = copyright.display;
    }

    Ok(doc)
}

#[cfg(test)]
mod tests {
    use super::*;
    use catalog_indexer_shared::{
        AgentRole, DateRecord, IdentifierValue, PartialDate,
    };

    #[test]
    fn test_isbn_extraction() {
        let identifier = IdentifierRecord::new("isbn", "9780143127741");

        let doc = convert_identifier(&identifier).unwrap();
        assert_eq!(doc.id_type, "isbn");
        assert_eq!(doc.identifier, "9780143127741");
    }

    #[test]
    fn test_identifier_without_matching_value() {
        let identifier = IdentifierRecord {
            id_type: "lccn".to_string(),
            values: vec![],
        };

        let result = convert_identifier(&identifier);
        assert!(matches!(result, Err(IngestError::DataShapeError(_))));
    }

    #[test]
    fn test_identifier_ignores_values_of_other_types() {
        let identifier = IdentifierRecord {
            id_type: "oclc".to_string(),
            values: vec![
                IdentifierValue {
                    id_type: "isbn".to_string(),
                    value: "9780143127741".to_string(),
                },
                IdentifierValue {
                    id_type: "oclc".to_string(),
                    value: "858341".to_string(),
                },
            ],
        };

        assert_eq!(convert_identifier(&identifier).unwrap().identifier, "858341");

        let mismatched = IdentifierRecord {
            id_type: "lccn".to_string(),
            values: identifier.values.clone(),
        };
        assert!(convert_identifier(&mismatched).is_err());
    }

    #[test]
    fn test_convert_agent_dates() {
        let mut agent = AgentRecord::named("Herman Melville");
        agent.dates = vec![
            DateRecord::single("birth_date", PartialDate::Year(1819)),
            DateRecord::single("death_date", PartialDate::Year(1891)),
        ];
        agent.aliases = vec!["Melville, H.".to_string(), "Melville, H.".to_string()];

        let doc = convert_agent(&agent).unwrap();
        assert_eq!(doc.birth_date_display.as_deref(), Some("1819"));
        assert_eq!(doc.death_date.unwrap().lte, Some(PartialDate::Year(1891)));
        assert_eq!(doc.aliases, vec!["Melville, H.".to_string()]);
        assert!(doc.roles.is_empty());
    }

    #[test]
    fn test_convert_item_with_access_report() {
        let item = ItemRecord {
            source: Some("gutenberg".to_string()),
            content_type: Some("ebook".to_string()),
            dates: vec![DateRecord::single("modified", PartialDate::Year(2019))],
            access_reports: vec![AccessReportRecord {
                ace_version: Some("1.0.2".to_string()),
                score: Some(0.85),
                measurements: vec![MeasurementRecord {
                    quantity: Some("violations".to_string()),
                    value: Some(3.0),
                    weight: Some(1.0),
                    taken_at: None,
                }],
            }],
            identifiers: vec![IdentifierRecord::new("gutenberg", "2701")],
            ..Default::default()
        };

        let doc = convert_item(&item).unwrap();
        assert_eq!(doc.modified_display.as_deref(), Some("2019"));
        assert_eq!(doc.access_reports.len(), 1);
        assert_eq!(doc.access_reports[0].measurements.len(), 1);
        assert_eq!(doc.identifiers[0].identifier, "2701");
    }

    #[test]
    fn test_convert_instance_nested_collections() {
        let instance = InstanceRecord {
            title: Some("Moby Dick; or, The Whale".to_string()),
            dates: vec![
                DateRecord::single("pub_date", PartialDate::Year(1851)),
                DateRecord::range("copyright_date", None, Some(PartialDate::Year(1851))),
            ],
            items: vec![ItemRecord::default(), ItemRecord::default()],
            agents: vec![AgentRole {
                agent: AgentRecord::named("Harper & Brothers"),
                role: Some("publisher".to_string()),
            }],
            links: vec![LinkRecord {
                url: Some("https://example.org/moby".to_string()),
                ..Default::default()
            }],
            ..Default::default()
        };

        let doc = convert_instance(&instance).unwrap();
        assert_eq!(doc.items.len(), 2);
        assert_eq!(doc.agents[0].roles, vec!["publisher".to_string()]);
        assert_eq!(doc.pub_date_display.as_deref(), Some("1851"));
        assert_eq!(doc.copyright_date_display.as_deref(), Some("- 1851"));
        assert_eq!(doc.links.len(), 1);
    }

    #[test]
    fn test_item_identifier_error_propagates_to_instance() {
        let instance = InstanceRecord {
            items: vec![ItemRecord {
                identifiers: vec![IdentifierRecord {
                    id_type: "lccn".to_string(),
                    values: vec![],
                }],
                ..Default::default()
            }],
            ..Default::default()
        };

        assert!(matches!(
            convert_instance(&instance),
            Err(IngestError::DataShapeError(_))
        ));
    }
}

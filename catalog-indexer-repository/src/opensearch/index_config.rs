//! OpenSearch index configuration and mappings.
//!
//! This module defines the index settings and the nested mapping for work documents.

use serde_json::{json, Value};

/// Default name of the works index.
pub const DEFAULT_INDEX_NAME: &str = "sfr_works";

/// Configuration for the search index.
#[derive(Debug, Clone)]
pub struct IndexConfig {
    /// The index name used for all document operations.
    pub name: String,
    /// Number of primary shards used when the index is created.
    pub number_of_shards: u32,
    /// Number of replicas used when the index is created.
    pub number_of_replicas: u32,
}

impl IndexConfig {
    /// Create a new index configuration with one shard and one replica.
    ///
    /// # Arguments
    ///
    /// * `name` - The index name
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            number_of_shards: 1,
            number_of_replicas: 1,
        }
    }
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self::new(DEFAULT_INDEX_NAME)
    }
}

fn text_with_keyword() -> Value {
    json!({ "type": "text", "fields": { "keyword": { "type": "keyword" } } })
}

fn unindexed_keyword() -> Value {
    json!({ "type": "keyword", "index": false })
}

fn date_range() -> Value {
    json!({ "type": "date_range", "format": "date_optional_time" })
}

fn nested(properties: Value) -> Value {
    json!({ "type": "nested", "properties": properties })
}

fn measurement_properties() -> Value {
    json!({
        "quantity": { "type": "keyword" },
        "value": { "type": "float" },
        "weight": { "type": "half_float" },
        "taken_at": { "type": "date" }
    })
}

fn link_properties() -> Value {
    json!({
        "url": unindexed_keyword(),
        "media_type": { "type": "keyword" },
        "content": { "type": "text", "index": false },
        "rel_type": { "type": "keyword" },
        "thumbnail": unindexed_keyword()
    })
}

fn identifier_properties() -> Value {
    json!({
        "id_type": { "type": "keyword" },
        "identifier": { "type": "keyword" }
    })
}

fn subject_properties() -> Value {
    json!({
        "authority": { "type": "keyword" },
        "uri": { "type": "keyword" },
        "subject": text_with_keyword(),
        "weight": { "type": "half_float" }
    })
}

fn access_report_properties() -> Value {
    json!({
        "ace_version": { "type": "keyword" },
        "score": { "type": "half_float" },
        "measurements": nested(measurement_properties())
    })
}

fn agent_properties() -> Value {
    json!({
        "name": text_with_keyword(),
        "sort_name": unindexed_keyword(),
        "aliases": text_with_keyword(),
        "lcnaf": { "type": "keyword" },
        "viaf": { "type": "keyword" },
        "birth_date": date_range(),
        "birth_date_display": { "type": "keyword" },
        "death_date": date_range(),
        "death_date_display": { "type": "keyword" },
        "biography": { "type": "text" },
        "roles": { "type": "keyword" },
        "links": nested(link_properties())
    })
}

fn item_properties() -> Value {
    json!({
        "source": { "type": "keyword" },
        "content_type": { "type": "keyword" },
        "modified": date_range(),
        "modified_display": { "type": "keyword" },
        "drm": { "type": "keyword" },
        "rights_uri": { "type": "keyword" },
        "agents": nested(agent_properties()),
        "measurements": nested(measurement_properties()),
        "identifiers": nested(identifier_properties()),
        "links": nested(link_properties()),
        "access_reports": nested(access_report_properties())
    })
}

fn instance_properties() -> Value {
    json!({
        "title": text_with_keyword(),
        "sub_title": text_with_keyword(),
        "alt_titles": text_with_keyword(),
        "pub_place": text_with_keyword(),
        "pub_date": date_range(),
        "pub_date_display": { "type": "keyword" },
        "edition": text_with_keyword(),
        "edition_statement": text_with_keyword(),
        "table_of_contents": { "type": "text" },
        "copyright_date": date_range(),
        "copyright_date_display": { "type": "keyword" },
        "language": { "type": "keyword", "ignore_above": 2 },
        "extent": { "type": "text" },
        "license": text_with_keyword(),
        "rights_statement": text_with_keyword(),
        "items": nested(item_properties()),
        "agents": nested(agent_properties()),
        "measurements": nested(measurement_properties()),
        "identifiers": nested(identifier_properties()),
        "links": nested(link_properties())
    })
}

/// Get the index settings and mappings for the works index.
///
/// The configuration includes:
/// - **nested** mappings for every collection so inner objects match independently
/// - **date_range** fields in `date_optional_time` format with keyword `_display` siblings
/// - **text + keyword** fields for titles and names
pub fn get_index_settings(config: &IndexConfig) -> Value {
    json!({
        "settings": {
            "number_of_shards": config.number_of_shards,
            "number_of_replicas": config.number_of_replicas
        },
        "mappings": {
            "properties": {
                "uuid": { "type": "keyword", "store": true },
                "title": text_with_keyword(),
                "sort_title": unindexed_keyword(),
                "language": { "type": "keyword", "ignore_above": 2 },
                "license": { "type": "keyword" },
                "rights_statement": text_with_keyword(),
                "medium": text_with_keyword(),
                "series": text_with_keyword(),
                "series_position": { "type": "short", "ignore_malformed": true },
                "date_created": { "type": "date" },
                "date_modified": { "type": "date" },
                "issued": date_range(),
                "issued_display": { "type": "keyword" },
                "created": date_range(),
                "created_display": { "type": "keyword" },
                "alt_titles": text_with_keyword(),
                "subjects": nested(subject_properties()),
                "agents": nested(agent_properties()),
                "identifiers": nested(identifier_properties()),
                "measurements": nested(measurement_properties()),
                "links": nested(link_properties()),
                "instances": nested(instance_properties())
            }
        }
    })
}

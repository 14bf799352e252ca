//! Queue message exchanged between the change-detection and indexing stages.
//!
//! The body is JSON: `{"type": "uuid", "identifier": "<32 hex chars>"}`.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::work_document::document_id_for;

/// The kind of identifier carried by an index message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordType {
    /// The identifier is a work uuid.
    Uuid,
}

/// A request to (re)index one work.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexMessage {
    #[serde(rename = "type")]
    pub record_type: RecordType,
    pub identifier: String,
}

impl IndexMessage {
    /// Build a message for the given work uuid.
    pub fn for_work(uuid: &Uuid) -> Self {
        Self {
            record_type: RecordType::Uuid,
            identifier: document_id_for(uuid),
        }
    }

    /// Parse the identifier as a work uuid.
    pub fn work_uuid(&self) -> Result<Uuid, uuid::Error> {
        Uuid::parse_str(&self.identifier)
    }

    /// Serialize to the transport-neutral message body.
    pub fn to_body(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Parse a message body.
    pub fn from_body(body: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_body_format() {
        let uuid = Uuid::parse_str("550e8400-e29b-41d4-a716-446655440000").unwrap();
        let message = IndexMessage::for_work(&uuid);

        let body: serde_json::Value = serde_json::from_str(&message.to_body().unwrap()).unwrap();
        assert_eq!(body["type"], "uuid");
        assert_eq!(body["identifier"], "550e8400e29b41d4a716446655440000");
    }

    #[test]
    fn test_parse_body() {
        let message =
            IndexMessage::from_body(r#"{"type":"uuid","identifier":"550e8400e29b41d4a716446655440000"}"#)
                .unwrap();
        assert_eq!(message.record_type, RecordType::Uuid);
        assert_eq!(
            message.work_uuid().unwrap().to_string(),
            "550e8400-e29b-41d4-a716-446655440000"
        );
    }

    #[test]
    fn test_parse_body_rejects_unknown_type() {
        assert!(IndexMessage::from_body(r#"{"type":"isbn","identifier":"123"}"#).is_err());
    }

    #[test]
    fn test_parse_body_rejects_missing_identifier() {
        assert!(IndexMessage::from_body(r#"{"type":"uuid"}"#).is_err());
    }
}

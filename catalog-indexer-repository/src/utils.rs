//! Utility functions for the catalog indexer repository.

use crate::errors::SearchIndexError;

/// Validate a work document id.
///
/// Document ids are work uuids in their simple form: exactly 32 hexadecimal
/// characters, no dashes.
///
/// # Example
///
/// ```
/// use catalog_indexer_repository::validate_document_id;
///
/// assert!(validate_document_id("550e8400e29b41d4a716446655440000").is_ok());
/// assert!(validate_document_id("550e8400-e29b-41d4-a716-446655440000").is_err());
/// ```
pub fn validate_document_id(document_id: &str) -> Result<(), SearchIndexError> {
    if document_id.len() != 32 || !document_id.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(SearchIndexError::validation(format!(
            "Invalid document id '{}': expected 32 hex characters",
            document_id
        )));
    }
    Ok(())
}

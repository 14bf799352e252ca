//! Error types for the catalog indexer stages.

use thiserror::Error;

use catalog_indexer_repository::{SearchIndexError, WorkStoreError};

/// Errors that can occur in the indexing stage.
#[derive(Error, Debug)]
pub enum IngestError {
    /// Message body or entity graph is missing a required field or fails to parse.
    #[error("Data shape error: {0}")]
    DataShapeError(String),

    /// The relational store is unreachable or returned an unexpected shape.
    #[error("Source store error: {0}")]
    SourceStoreError(String),

    /// The search store rejected a fetch or upsert.
    #[error("Index store error: {0}")]
    IndexStoreError(String),

    /// Kafka-related error.
    #[error("Kafka error: {0}")]
    KafkaError(String),

    /// Channel communication error.
    #[error("Channel error: {0}")]
    ChannelError(String),

    /// At least one message of a delivered batch failed.
    #[error("{failed} of {total} messages in batch failed")]
    BatchFailed { failed: usize, total: usize },
}

impl IngestError {
    /// Create a data shape error.
    pub fn data_shape(msg: impl Into<String>) -> Self {
        Self::DataShapeError(msg.into())
    }

    /// Create a source store error.
    pub fn source_store(msg: impl Into<String>) -> Self {
        Self::SourceStoreError(msg.into())
    }

    /// Create an index store error.
    pub fn index_store(msg: impl Into<String>) -> Self {
        Self::IndexStoreError(msg.into())
    }

    /// Create a Kafka error.
    pub fn kafka(msg: impl Into<String>) -> Self {
        Self::KafkaError(msg.into())
    }
}

impl From<rdkafka::error::KafkaError> for IngestError {
    fn from(err: rdkafka::error::KafkaError) -> Self {
        Self::KafkaError(err.to_string())
    }
}

impl From<WorkStoreError> for IngestError {
    fn from(err: WorkStoreError) -> Self {
        Self::SourceStoreError(err.to_string())
    }
}

impl From<SearchIndexError> for IngestError {
    fn from(err: SearchIndexError) -> Self {
        Self::IndexStoreError(err.to_string())
    }
}

/// Errors returned by a message queue's batch-send operation.
#[derive(Error, Debug, Clone)]
pub enum QueueError {
    /// The transport failed for the whole call.
    #[error("Transport error: {0}")]
    TransportError(String),

    /// More entries than the queue accepts in one call.
    #[error("Batch of {size} entries exceeds the maximum of {max}")]
    BatchTooLarge { size: usize, max: usize },
}

impl QueueError {
    /// Create a transport error.
    pub fn transport(msg: impl Into<String>) -> Self {
        Self::TransportError(msg.into())
    }
}

/// A group of outbound messages that could not be delivered.
///
/// `identifiers` lists every work identifier of the group that was not
/// delivered after retries.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Failed to dispatch {} message(s): {reason}", identifiers.len())]
pub struct DispatchError {
    pub identifiers: Vec<String>,
    pub reason: String,
}

impl DispatchError {
    /// Create a dispatch error for the given identifiers.
    pub fn new(identifiers: Vec<String>, reason: impl Into<String>) -> Self {
        Self {
            identifiers,
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_store_errors_map_to_ingest_kinds() {
        let err: IngestError = WorkStoreError::WorkNotFound(Uuid::nil()).into();
        assert!(matches!(err, IngestError::SourceStoreError(_)));

        let err: IngestError = SearchIndexError::upsert("mapping conflict").into();
        assert!(matches!(err, IngestError::IndexStoreError(msg) if msg.contains("mapping conflict")));
    }

    #[test]
    fn test_dispatch_error_display() {
        let err = DispatchError::new(vec!["a".to_string(), "b".to_string()], "timed out");
        assert_eq!(err.to_string(), "Failed to dispatch 2 message(s): timed out");
    }
}

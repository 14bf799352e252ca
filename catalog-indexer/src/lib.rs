//! # Catalog Indexer
//!
//! Keeps a search index of catalog works in step with the relational
//! catalog. Two stages communicate only through a Kafka topic:
//!
//! 1. **Change detection** ([`poller`]): enumerates works modified within a
//!    lookback window and dispatches one index message per work, in batches
//!    of at most ten.
//! 2. **Indexing** ([`orchestrator`]): consumes index messages, loads each
//!    work graph, flattens it into a nested document and upserts it.
//!
//! ## Modules
//!
//! - [`config`]: Configuration and dependency initialization
//! - [`consumer`]: Kafka consumer for index messages
//! - [`processor`]: Flattens work graphs into search documents
//! - [`loader`]: Writes one work into the search index
//! - [`orchestrator`]: Drives the indexing stage
//! - [`enumerator`]: Pages through changed works
//! - [`dispatcher`]: Batches index messages onto the queue
//! - [`poller`]: Drives the change-detection stage
//! - [`errors`]: Error types for both stages

pub mod config;
pub mod consumer;
pub mod dispatcher;
pub mod enumerator;
pub mod errors;
pub mod loader;
pub mod orchestrator;
pub mod poller;
pub mod processor;
pub mod telemetry;

pub use config::{Dependencies, IndexerConfig, PollerDependencies};
pub use errors::{DispatchError, IngestError};
pub use telemetry::init_tracing;

use thiserror::Error;

/// Errors that can occur during initialization or execution of either stage.
#[derive(Error, Debug)]
pub enum IndexingError {
    /// Configuration error.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Ingest error.
    #[error("Ingest error: {0}")]
    IngestError(#[from] IngestError),

    /// The change poll left messages undelivered.
    #[error("{0} index message(s) were not dispatched")]
    DispatchFailed(usize),
}

impl IndexingError {
    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }
}

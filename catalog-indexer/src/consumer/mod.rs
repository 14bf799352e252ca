//! Consumer module for the catalog indexer.
//!
//! Provides Kafka consumer functionality for receiving index messages.

mod kafka_consumer;
mod messages;
mod offsets;

pub use kafka_consumer::KafkaConsumer;
pub use messages::{QueueMessage, StreamMessage};
pub use offsets::{AckDecision, OffsetTracker, DEFAULT_MAX_ATTEMPTS};

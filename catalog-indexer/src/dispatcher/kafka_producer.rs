//! Kafka-backed message queue for index messages.

use std::time::Duration;

use async_trait::async_trait;
use futures::future::join_all;
use rdkafka::config::ClientConfig;
use rdkafka::producer::{FutureProducer, FutureRecord};
use rdkafka::util::Timeout;
use tracing::{debug, info};

use super::{BatchSendOutcome, FailedEntry, MessageQueue, QueueEntry, MAX_BATCH_ENTRIES};
use crate::config::apply_credentials;
use crate::errors::{IngestError, QueueError};

/// Queue that produces each entry as one Kafka record keyed by its identifier.
///
/// Entries of a batch are produced concurrently; the outcome lists each
/// entry's delivery result.
pub struct KafkaQueue {
    producer: FutureProducer,
    topic: String,
    delivery_timeout: Duration,
}

impl KafkaQueue {
    /// Create a new Kafka queue.
    ///
    /// # Arguments
    ///
    /// * `brokers` - Kafka broker addresses (comma-separated)
    /// * `topic` - The index queue topic
    /// * `credentials` - SASL username and password for managed Kafka
    /// * `delivery_timeout` - How long to wait for each delivery report
    pub fn new(
        brokers: &str,
        topic: &str,
        credentials: Option<(&str, &str)>,
        delivery_timeout: Duration,
    ) -> Result<Self, IngestError> {
        let mut config = ClientConfig::new();

        config
            .set("bootstrap.servers", brokers)
            .set("client.id", "catalog-change-poller")
            .set("compression.type", "zstd")
            .set("message.timeout.ms", delivery_timeout.as_millis().to_string());

        apply_credentials(&mut config, credentials);

        let producer: FutureProducer = config.create()?;

        info!(brokers = %brokers, topic = %topic, "Created Kafka producer");

        Ok(Self {
            producer,
            topic: topic.to_string(),
            delivery_timeout,
        })
    }

    /// Get the topic this queue produces to.
    pub fn topic(&self) -> &str {
        &self.topic
    }
}

#[async_trait]
impl MessageQueue for KafkaQueue {
    async fn send_batch(&self, entries: &[QueueEntry]) -> Result<BatchSendOutcome, QueueError> {
        if entries.len() > MAX_BATCH_ENTRIES {
            return Err(QueueError::BatchTooLarge {
                size: entries.len(),
                max: MAX_BATCH_ENTRIES,
            });
        }

        let deliveries = entries.iter().map(|entry| async move {
            let record = FutureRecord::to(&self.topic)
                .key(&entry.identifier)
                .payload(&entry.body);

            let result = self
                .producer
                .send(record, Timeout::After(self.delivery_timeout))
                .await;

            (entry.id.clone(), result)
        });

        let mut outcome = BatchSendOutcome::default();

        for (id, result) in join_all(deliveries).await {
            match result {
                Ok((partition, offset)) => {
                    debug!(entry_id = %id, partition, offset, "Delivered index message");
                    outcome.successful.push(id);
                }
                Err((e, _)) => outcome.failed.push(FailedEntry {
                    id,
                    reason: e.to_string(),
                }),
            }
        }

        Ok(outcome)
    }
}

impl std::fmt::Debug for KafkaQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KafkaQueue")
            .field("topic", &self.topic)
            .finish_non_exhaustive()
    }
}

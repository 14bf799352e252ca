//! Kafka consumer implementation for the catalog indexer.
//!
//! Consumes index messages from the queue topic and forwards them in batches
//! to the orchestrator.

use async_trait::async_trait;
use rdkafka::{
    config::ClientConfig,
    consumer::{CommitMode, Consumer as _, StreamConsumer},
    message::{BorrowedMessage, Message as KafkaMessage},
    Offset, TopicPartitionList,
};
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, error, info, instrument, warn};

use crate::config::apply_credentials;
use crate::consumer::messages::{QueueMessage, StreamMessage};
use crate::consumer::offsets::{AckDecision, OffsetTracker};
use crate::errors::IngestError;
use crate::orchestrator::Consumer;

/// Default batch size for Kafka message batching.
const DEFAULT_BATCH_SIZE: usize = 10;

/// Default batch timeout in milliseconds.
const DEFAULT_BATCH_TIMEOUT_MS: u64 = 1000;

/// How long a seek back to a failed offset may block.
const SEEK_TIMEOUT: Duration = Duration::from_secs(5);

/// Kafka consumer for index messages.
pub struct KafkaConsumer {
    consumer: StreamConsumer,
    topics: Vec<String>,
    batch_size: usize,
    batch_timeout: Duration,
}

impl KafkaConsumer {
    /// Create a new Kafka consumer.
    ///
    /// # Arguments
    ///
    /// * `brokers` - Kafka broker addresses (comma-separated)
    /// * `group_id` - Consumer group ID
    /// * `topic` - The index queue topic
    /// * `credentials` - SASL username and password for managed Kafka
    ///
    /// # Returns
    ///
    /// * `Ok(KafkaConsumer)` - A new consumer instance
    /// * `Err(IngestError)` - If consumer creation fails
    pub fn new(
        brokers: &str,
        group_id: &str,
        topic: &str,
        credentials: Option<(&str, &str)>,
    ) -> Result<Self, IngestError> {
        Self::with_batch_config(
            brokers,
            group_id,
            topic,
            credentials,
            DEFAULT_BATCH_SIZE,
            DEFAULT_BATCH_TIMEOUT_MS,
        )
    }

    /// Create a new Kafka consumer with custom batch configuration.
    ///
    /// # Arguments
    ///
    /// * `brokers` - Kafka broker addresses (comma-separated)
    /// * `group_id` - Consumer group ID
    /// * `topic` - The index queue topic
    /// * `credentials` - SASL username and password for managed Kafka
    /// * `batch_size` - Number of messages to batch before sending
    /// * `batch_timeout_ms` - Maximum time to wait before flushing a partial batch (milliseconds)
    pub fn with_batch_config(
        brokers: &str,
        group_id: &str,
        topic: &str,
        credentials: Option<(&str, &str)>,
        batch_size: usize,
        batch_timeout_ms: u64,
    ) -> Result<Self, IngestError> {
        let mut config = ClientConfig::new();

        config
            .set("bootstrap.servers", brokers)
            .set("group.id", group_id)
            .set("enable.auto.commit", "false")
            .set("auto.offset.reset", "earliest")
            .set("session.timeout.ms", "6000");

        apply_credentials(&mut config, credentials);

        let consumer: StreamConsumer = config
            .create()
            .map_err(|e| IngestError::kafka(e.to_string()))?;

        info!(
            brokers = %brokers,
            group_id = %group_id,
            topic = %topic,
            batch_size = batch_size,
            batch_timeout_ms = batch_timeout_ms,
            sasl = credentials.is_some(),
            "Created Kafka consumer with batching"
        );

        Ok(Self {
            consumer,
            topics: vec![topic.to_string()],
            batch_size,
            batch_timeout: Duration::from_millis(batch_timeout_ms),
        })
    }

    /// Flush a batch of pending messages to the channel.
    async fn flush_batch(
        &self,
        batch: &[QueueMessage],
        offsets: &[(String, i32, i64)],
        sender: &mpsc::Sender<StreamMessage>,
    ) -> Result<(), IngestError> {
        if batch.is_empty() {
            return Ok(());
        }

        info!(
            message_count = batch.len(),
            offset_count = offsets.len(),
            "Sending batch of messages to orchestrator"
        );

        sender
            .send(StreamMessage::Messages {
                messages: batch.to_vec(),
                offsets: offsets.to_vec(),
            })
            .await
            .map_err(|e| IngestError::ChannelError(e.to_string()))
    }

    /// Commit the given positions (the next offset to read per partition).
    fn commit_positions(&self, positions: &[(String, i32, i64)]) -> Result<(), IngestError> {
        if positions.is_empty() {
            return Ok(());
        }

        let mut tpl = TopicPartitionList::new();
        for (topic, partition, position) in positions {
            tpl.add_partition_offset(topic, *partition, Offset::Offset(*position))?;
        }

        self.consumer.commit(&tpl, CommitMode::Async)?;

        Ok(())
    }

    /// Carry out the commits and seeks decided by the offset tracker.
    fn apply_decision(&self, decision: AckDecision) {
        for (topic, partition, offset) in &decision.abandoned {
            error!(
                topic = %topic,
                partition = partition,
                offset = offset,
                "Giving up on message after repeated indexing failures"
            );
        }

        for (topic, partition, offset) in &decision.seeks {
            match self
                .consumer
                .seek(topic, *partition, Offset::Offset(*offset), SEEK_TIMEOUT)
            {
                Ok(()) => warn!(
                    topic = %topic,
                    partition = partition,
                    offset = offset,
                    "Rewound partition to redeliver failed messages"
                ),
                Err(e) => error!(
                    topic = %topic,
                    partition = partition,
                    offset = offset,
                    error = %e,
                    "Failed to rewind partition; messages are redelivered after restart"
                ),
            }
        }

        match self.commit_positions(&decision.commits) {
            Ok(()) if !decision.commits.is_empty() => {
                debug!(positions = ?decision.commits, "Committed offsets");
            }
            Ok(()) => {}
            Err(e) => error!(error = %e, "Failed to commit offsets"),
        }
    }

    /// Read the key and body of a Kafka message.
    ///
    /// Returns `None` for messages without a payload.
    fn parse_message(msg: &BorrowedMessage<'_>) -> Option<QueueMessage> {
        let payload = msg.payload()?;
        let key = msg
            .key()
            .map(|k| String::from_utf8_lossy(k).into_owned());

        Some(QueueMessage {
            key,
            body: String::from_utf8_lossy(payload).into_owned(),
        })
    }
}

#[async_trait]
impl Consumer for KafkaConsumer {
    /// Subscribe to configured topics.
    fn subscribe(&self) -> Result<(), IngestError> {
        let topics: Vec<&str> = self.topics.iter().map(|s| s.as_str()).collect();
        self.consumer.subscribe(&topics)?;

        info!(topics = ?self.topics, "Subscribed to Kafka topics");
        Ok(())
    }

    /// Start consuming messages and send them through the channel.
    ///
    /// A partition's offset is committed only up to its lowest message that
    /// has not been indexed. A failed batch rewinds its partitions so the
    /// messages are read again.
    #[instrument(skip(self, sender, ack_receiver, shutdown))]
    async fn run(
        &self,
        sender: mpsc::Sender<StreamMessage>,
        mut ack_receiver: mpsc::Receiver<StreamMessage>,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), IngestError> {
        use futures::StreamExt;

        let mut message_stream = self.consumer.stream();
        let mut batch: Vec<QueueMessage> = Vec::with_capacity(self.batch_size);
        let mut pending_offsets: Vec<(String, i32, i64)> = Vec::new();
        let mut tracker = OffsetTracker::default();
        let mut flush_timer = tokio::time::interval(self.batch_timeout);
        flush_timer.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        flush_timer.tick().await;

        loop {
            tokio::select! {
                _ = shutdown.recv() => {
                    info!("Consumer received shutdown signal");
                    // Uncommitted messages are re-read from the last committed offset on restart
                    let _ = sender.send(StreamMessage::End).await;
                    break;
                }
                ack_msg = ack_receiver.recv() => {
                    match ack_msg {
                        Some(StreamMessage::Acknowledgment { offsets, success, error }) => {
                            if !success {
                                error!(
                                    offset_count = offsets.len(),
                                    error = error.as_deref().unwrap_or("Unknown error"),
                                    "Batch failed, holding back its offsets"
                                );
                            }
                            self.apply_decision(tracker.acknowledge(&offsets, success));
                        }
                        Some(StreamMessage::End) | None => {
                            info!("Acknowledgment channel closed");
                            break;
                        }
                        _ => {}
                    }
                }
                message = message_stream.next() => {
                    match message {
                        Some(Ok(msg)) => {
                            debug!(
                                topic = %msg.topic(),
                                partition = msg.partition(),
                                offset = msg.offset(),
                                "Received message from Kafka"
                            );
                            match Self::parse_message(&msg) {
                                Some(queued) => {
                                    tracker.track(msg.topic(), msg.partition(), msg.offset());
                                    batch.push(queued);
                                    pending_offsets.push((msg.topic().to_string(), msg.partition(), msg.offset()));

                                    if batch.len() >= self.batch_size {
                                        self.flush_batch(&batch, &pending_offsets, &sender).await?;
                                        batch.clear();
                                        pending_offsets.clear();
                                    }
                                }
                                None => {
                                    debug!(
                                        topic = %msg.topic(),
                                        partition = msg.partition(),
                                        offset = msg.offset(),
                                        "Skipping message with empty payload"
                                    );
                                    // Done as soon as read, committed once earlier batches are
                                    let done = (msg.topic().to_string(), msg.partition(), msg.offset());
                                    tracker.track(&done.0, done.1, done.2);
                                    self.apply_decision(tracker.acknowledge(&[done], true));
                                }
                            }
                        }
                        Some(Err(e)) => {
                            error!(error = %e, "Kafka error");
                            let _ = sender.send(StreamMessage::Error(e.to_string())).await;
                        }
                        None => {
                            info!("Kafka stream ended");
                            self.flush_batch(&batch, &pending_offsets, &sender).await?;
                            let _ = sender.send(StreamMessage::End).await;
                            break;
                        }
                    }
                }
                _ = flush_timer.tick() => {
                    if !batch.is_empty() {
                        debug!(count = batch.len(), "Flushing batch due to timeout");
                        self.flush_batch(&batch, &pending_offsets, &sender).await?;
                        batch.clear();
                        pending_offsets.clear();
                    }
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constants() {
        assert_eq!(DEFAULT_BATCH_SIZE, 10);
        assert_eq!(DEFAULT_BATCH_TIMEOUT_MS, 1000);
    }

    #[tokio::test]
    async fn test_consumer_creation_does_not_connect() {
        // librdkafka connects lazily, so creation succeeds without a broker
        let consumer =
            KafkaConsumer::new("localhost:9092", "catalog-indexer-test", "index.works", None);
        assert!(consumer.is_ok());
        assert_eq!(consumer.unwrap().topics, vec!["index.works".to_string()]);
    }

    #[tokio::test]
    async fn test_consumer_creation_with_credentials() {
        let consumer = KafkaConsumer::new(
            "broker.example.com:9096",
            "catalog-indexer-test",
            "index.works",
            Some(("indexer", "secret")),
        );
        assert!(consumer.is_ok());
    }
}

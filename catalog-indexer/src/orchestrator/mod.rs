//! Orchestrator module for the indexing stage.
//!
//! Coordinates the queue consumer and the index writer.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{broadcast, mpsc};
use tokio::time::{interval, Duration};
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use crate::consumer::{QueueMessage, StreamMessage};
use crate::errors::IngestError;
use crate::loader::{IndexWriter, WriteMode};
use catalog_indexer_shared::IndexMessage;

/// Source of delivered message batches.
///
/// Implementations send `StreamMessage::Messages` batches on `sender` and
/// commit a batch only when an `Acknowledgment` with `success: true` for its
/// offsets arrives on `ack_receiver`.
#[async_trait]
pub trait Consumer: Send + Sync {
    /// Subscribe to the message source.
    fn subscribe(&self) -> Result<(), IngestError>;

    /// Deliver batches until the source ends or shutdown is signalled.
    async fn run(
        &self,
        sender: mpsc::Sender<StreamMessage>,
        ack_receiver: mpsc::Receiver<StreamMessage>,
        shutdown: broadcast::Receiver<()>,
    ) -> Result<(), IngestError>;
}

/// Configuration for the orchestrator.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Size of the message channel buffer.
    pub channel_buffer_size: usize,
    /// Interval between progress log lines.
    pub progress_interval: Duration,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            channel_buffer_size: 1000,
            progress_interval: Duration::from_secs(10),
        }
    }
}

/// Counters for one delivered batch.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BatchSummary {
    pub inserted: usize,
    pub updated: usize,
    pub failed: usize,
}

/// Orchestrator that drives the indexing stage.
///
/// The orchestrator:
/// - Starts the consumer and receives delivered batches
/// - Parses each message and hands the work to the index writer
/// - Acknowledges a batch only when every message in it succeeded
/// - Handles shutdown signals and logs progress
pub struct Orchestrator {
    consumer: Arc<dyn Consumer>,
    writer: IndexWriter,
    config: OrchestratorConfig,
    shutdown_tx: broadcast::Sender<()>,
    /// Total number of messages received since startup.
    total_messages_received: Arc<AtomicU64>,
    /// Total number of documents written since startup.
    total_documents_indexed: Arc<AtomicU64>,
    /// Total number of messages that failed since startup.
    total_failures: Arc<AtomicU64>,
}

impl Orchestrator {
    /// Create a new orchestrator with the given components.
    pub fn new(consumer: Arc<dyn Consumer>, writer: IndexWriter) -> Self {
        Self::with_config(consumer, writer, OrchestratorConfig::default())
    }

    /// Create a new orchestrator with custom configuration.
    pub fn with_config(
        consumer: Arc<dyn Consumer>,
        writer: IndexWriter,
        config: OrchestratorConfig,
    ) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);

        Self {
            consumer,
            writer,
            config,
            shutdown_tx,
            total_messages_received: Arc::new(AtomicU64::new(0)),
            total_documents_indexed: Arc::new(AtomicU64::new(0)),
            total_failures: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Run the orchestrator.
    ///
    /// Blocks until the consumer ends, a shutdown signal is received, or
    /// the consumer cannot subscribe.
    #[instrument(skip(self))]
    pub async fn run(&mut self) -> Result<(), IngestError> {
        info!("Starting catalog indexer orchestrator");

        self.consumer.subscribe()?;

        let (message_transmitter, mut message_receiver) =
            mpsc::channel::<StreamMessage>(self.config.channel_buffer_size);
        let (ack_transmitter, ack_receiver) =
            mpsc::channel::<StreamMessage>(self.config.channel_buffer_size);

        let consumer = Arc::clone(&self.consumer);
        let shutdown_rx = self.shutdown_tx.subscribe();

        let consumer_handle = tokio::spawn(async move {
            if let Err(e) = consumer
                .run(message_transmitter, ack_receiver, shutdown_rx)
                .await
            {
                error!(error = %e, "Consumer error");
            }
        });

        info!("Ready to process index messages");

        let total_messages = Arc::clone(&self.total_messages_received);
        let total_docs = Arc::clone(&self.total_documents_indexed);
        let total_failures = Arc::clone(&self.total_failures);
        let mut progress_timer = interval(self.config.progress_interval);
        progress_timer.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        let mut prev_docs: u64 = 0;
        let mut prev_time = std::time::Instant::now();

        loop {
            tokio::select! {
                msg = message_receiver.recv() => {
                    match msg {
                        Some(StreamMessage::Messages { messages, offsets }) => {
                            info!(
                                message_count = messages.len(),
                                offset_count = offsets.len(),
                                "Received batch from consumer"
                            );
                            let success = match self.process_batch(&messages).await {
                                Ok(summary) => {
                                    debug!(
                                        inserted = summary.inserted,
                                        updated = summary.updated,
                                        "Batch indexed"
                                    );
                                    StreamMessage::Acknowledgment {
                                        offsets,
                                        success: true,
                                        error: None,
                                    }
                                }
                                Err(e) => {
                                    error!(error = %e, "Batch had failures. Withholding offset commit");
                                    StreamMessage::Acknowledgment {
                                        offsets,
                                        success: false,
                                        error: Some(e.to_string()),
                                    }
                                }
                            };
                            let _ = ack_transmitter.send(success).await;
                        }
                        Some(StreamMessage::Error(e)) => {
                            error!(error = %e, "Received error from consumer");
                        }
                        Some(StreamMessage::End) | None => {
                            info!("Consumer stream ended");
                            break;
                        }
                        Some(StreamMessage::Acknowledgment { .. }) => {
                            warn!("Received acknowledgment on message channel (should be on ack channel)");
                        }
                    }
                }
                _ = tokio::signal::ctrl_c() => {
                    info!("Received shutdown signal");
                    let _ = self.shutdown_tx.send(());
                    break;
                }
                _ = progress_timer.tick() => {
                    let received = total_messages.load(Ordering::Relaxed);
                    let docs = total_docs.load(Ordering::Relaxed);
                    let failures = total_failures.load(Ordering::Relaxed);

                    let now = std::time::Instant::now();
                    let elapsed_secs = now.duration_since(prev_time).as_secs_f64();
                    let docs_per_sec = if elapsed_secs > 0.0 {
                        (docs.saturating_sub(prev_docs) as f64) / elapsed_secs
                    } else {
                        0.0
                    };

                    info!(
                        messages_received = received,
                        documents_indexed = docs,
                        failures = failures,
                        documents_per_sec = format!("{:.2}", docs_per_sec),
                        "Processing progress"
                    );

                    prev_docs = docs;
                    prev_time = now;
                }
            }
        }

        // Closing the ack channel lets the consumer loop exit. Unacknowledged
        // batches are redelivered on next startup.
        drop(ack_transmitter);
        let _ = consumer_handle.await;

        info!(
            total_messages_received = self.total_messages_received.load(Ordering::Relaxed),
            total_documents_indexed = self.total_documents_indexed.load(Ordering::Relaxed),
            total_failures = self.total_failures.load(Ordering::Relaxed),
            "Orchestrator shutdown complete"
        );
        Ok(())
    }

    /// Index every message of one delivered batch.
    ///
    /// Messages are processed sequentially. A failing message is logged and
    /// counted; the remaining messages are still processed.
    ///
    /// # Errors
    ///
    /// `IngestError::BatchFailed` when at least one message failed.
    pub async fn process_batch(&self, messages: &[QueueMessage]) -> Result<BatchSummary, IngestError> {
        self.total_messages_received
            .fetch_add(messages.len() as u64, Ordering::Relaxed);

        let mut summary = BatchSummary::default();

        for message in messages {
            match self.process_message(message).await {
                Ok(WriteMode::Insert) => summary.inserted += 1,
                Ok(WriteMode::Update) => summary.updated += 1,
                Err(e) => {
                    error!(
                        error = %e,
                        key = message.key.as_deref().unwrap_or(""),
                        "Failed to index message"
                    );
                    summary.failed += 1;
                }
            }
        }

        let written = (summary.inserted + summary.updated) as u64;
        self.total_documents_indexed
            .fetch_add(written, Ordering::Relaxed);
        self.total_failures
            .fetch_add(summary.failed as u64, Ordering::Relaxed);

        if summary.failed > 0 {
            return Err(IngestError::BatchFailed {
                failed: summary.failed,
                total: messages.len(),
            });
        }

        Ok(summary)
    }

    async fn process_message(&self, message: &QueueMessage) -> Result<WriteMode, IngestError> {
        let uuid = parse_index_message(&message.body)?;
        let outcome = self.writer.write(&uuid).await?;
        Ok(outcome.mode)
    }
}

/// Parse a message body into the work uuid it names.
pub fn parse_index_message(body: &str) -> Result<Uuid, IngestError> {
    let message = IndexMessage::from_body(body)
        .map_err(|e| IngestError::data_shape(format!("Malformed index message: {}", e)))?;

    message.work_uuid().map_err(|e| {
        IngestError::data_shape(format!(
            "Identifier '{}' is not a uuid: {}",
            message.identifier, e
        ))
    })
}

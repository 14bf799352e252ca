//! Batch dispatcher for outbound index messages.
//!
//! Messages are grouped into batches of at most [`MAX_BATCH_ENTRIES`] and
//! sent through a [`MessageQueue`]. No message is dropped silently: every
//! entry that cannot be delivered is reported in a [`DispatchError`].

mod kafka_producer;

pub use kafka_producer::KafkaQueue;

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info, instrument, warn};

use crate::errors::{DispatchError, QueueError};
use catalog_indexer_shared::IndexMessage;

/// Hard upper bound on the number of entries in one batch-send call.
pub const MAX_BATCH_ENTRIES: usize = 10;

/// Default number of extra attempts for an entry the queue reported as failed.
pub const DEFAULT_MAX_ENTRY_RETRIES: u32 = 2;

const NO_RESULT_REASON: &str = "No delivery result reported by the queue";

/// One outbound queue entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueEntry {
    /// Entry id, unique within one batch-send call.
    pub id: String,
    /// The work identifier carried by the message.
    pub identifier: String,
    /// The serialized `IndexMessage`.
    pub body: String,
}

/// An entry the queue did not accept.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedEntry {
    pub id: String,
    pub reason: String,
}

/// Per-entry result of one batch-send call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchSendOutcome {
    /// Ids of the delivered entries.
    pub successful: Vec<String>,
    pub failed: Vec<FailedEntry>,
}

/// Abstracts the durable queue between the change-detection and indexing stages.
#[async_trait]
pub trait MessageQueue: Send + Sync {
    /// Send up to [`MAX_BATCH_ENTRIES`] entries in one call.
    ///
    /// # Returns
    ///
    /// * `Ok(BatchSendOutcome)` - Per-entry success or failure
    /// * `Err(QueueError)` - If the whole call failed
    async fn send_batch(&self, entries: &[QueueEntry]) -> Result<BatchSendOutcome, QueueError>;
}

/// Dispatcher that accumulates index messages and flushes them in bounded groups.
///
/// The pending list is flushed as soon as it holds [`MAX_BATCH_ENTRIES`]
/// messages; callers flush the remainder once enumeration ends. The pending
/// list is cleared before each send, so a failed group is never resent by a
/// later flush.
pub struct BatchDispatcher {
    queue: Arc<dyn MessageQueue>,
    pending: Vec<QueueEntry>,
    max_entry_retries: u32,
    flushes: usize,
    dispatched: usize,
}

impl BatchDispatcher {
    /// Create a new dispatcher with the default retry policy.
    pub fn new(queue: Arc<dyn MessageQueue>) -> Self {
        Self::with_retries(queue, DEFAULT_MAX_ENTRY_RETRIES)
    }

    /// Create a new dispatcher that retries each failed entry `max_entry_retries` times.
    pub fn with_retries(queue: Arc<dyn MessageQueue>, max_entry_retries: u32) -> Self {
        Self {
            queue,
            pending: Vec::with_capacity(MAX_BATCH_ENTRIES),
            max_entry_retries,
            flushes: 0,
            dispatched: 0,
        }
    }

    /// Append a message, flushing when the pending list is full.
    ///
    /// # Errors
    ///
    /// Returns the error of the flush this call triggered, if any.
    pub async fn add(&mut self, message: &IndexMessage) -> Result<(), DispatchError> {
        let body = message.to_body().map_err(|e| {
            DispatchError::new(vec![message.identifier.clone()], e.to_string())
        })?;

        let id = self.unique_entry_id(&message.identifier);
        self.pending.push(QueueEntry {
            id,
            identifier: message.identifier.clone(),
            body,
        });

        if self.pending.len() >= MAX_BATCH_ENTRIES {
            self.flush().await?;
        }

        Ok(())
    }

    /// Send every pending message. A no-op when nothing is pending.
    ///
    /// Entries the queue reports as failed are resubmitted alone, up to the
    /// configured number of retries.
    ///
    /// # Errors
    ///
    /// * A wholesale send failure yields one error covering the whole group.
    /// * Entries still failing after their retries yield one error listing them.
    #[instrument(skip(self), fields(pending = self.pending.len()))]
    pub async fn flush(&mut self) -> Result<(), DispatchError> {
        if self.pending.is_empty() {
            return Ok(());
        }

        let group = std::mem::take(&mut self.pending);
        self.flushes += 1;

        let outcome = match self.queue.send_batch(&group).await {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!(error = %e, entry_count = group.len(), "Batch send failed");
                return Err(DispatchError::new(
                    group.into_iter().map(|entry| entry.identifier).collect(),
                    e.to_string(),
                ));
            }
        };

        self.dispatched += outcome.successful.len();

        // Entries the outcome mentions neither way were not delivered either
        let reported: HashSet<&str> = outcome
            .successful
            .iter()
            .map(String::as_str)
            .chain(outcome.failed.iter().map(|failed| failed.id.as_str()))
            .collect();
        let unreported: Vec<&QueueEntry> = group
            .iter()
            .filter(|entry| !reported.contains(entry.id.as_str()))
            .collect();

        if outcome.failed.is_empty() && unreported.is_empty() {
            debug!(entry_count = group.len(), "Batch delivered");
            return Ok(());
        }

        let by_id: HashMap<&str, &QueueEntry> =
            group.iter().map(|entry| (entry.id.as_str(), entry)).collect();

        let mut undelivered = Vec::new();
        let mut last_reason = String::new();

        if !unreported.is_empty() {
            warn!(
                entry_count = unreported.len(),
                "Queue returned no result for some entries"
            );
            undelivered.extend(unreported.iter().map(|entry| entry.identifier.clone()));
            last_reason = NO_RESULT_REASON.to_string();
        }

        for failed in &outcome.failed {
            let Some(entry) = by_id.get(failed.id.as_str()) else {
                warn!(entry_id = %failed.id, "Queue reported failure for unknown entry");
                continue;
            };

            match self.retry_entry(entry, &failed.reason).await {
                Ok(()) => self.dispatched += 1,
                Err(reason) => {
                    undelivered.push(entry.identifier.clone());
                    last_reason = reason;
                }
            }
        }

        if undelivered.is_empty() {
            info!(
                retried = outcome.failed.len(),
                "Failed entries delivered on retry"
            );
            return Ok(());
        }

        Err(DispatchError::new(undelivered, last_reason))
    }

    /// Number of batch-send groups flushed so far.
    pub fn flush_count(&self) -> usize {
        self.flushes
    }

    /// Number of messages delivered so far.
    pub fn dispatched_count(&self) -> usize {
        self.dispatched
    }

    /// Resubmit one entry on its own. Returns the last failure reason when
    /// every attempt fails.
    async fn retry_entry(&self, entry: &QueueEntry, first_reason: &str) -> Result<(), String> {
        let mut reason = first_reason.to_string();

        for attempt in 1..=self.max_entry_retries {
            debug!(entry_id = %entry.id, attempt, "Retrying failed entry");

            match self.queue.send_batch(std::slice::from_ref(entry)).await {
                Ok(outcome) if outcome.successful.contains(&entry.id) => return Ok(()),
                Ok(outcome) => {
                    reason = outcome
                        .failed
                        .into_iter()
                        .next()
                        .map_or_else(|| NO_RESULT_REASON.to_string(), |failed| failed.reason);
                }
                Err(e) => reason = e.to_string(),
            }
        }

        warn!(
            entry_id = %entry.id,
            identifier = %entry.identifier,
            reason = %reason,
            "Entry not delivered after retries"
        );
        Err(reason)
    }

    /// Entry ids are the identifier, suffixed `-<n>` when already pending.
    fn unique_entry_id(&self, identifier: &str) -> String {
        let taken = |candidate: &str| self.pending.iter().any(|entry| entry.id == candidate);

        if !taken(identifier) {
            return identifier.to_string();
        }

        let mut n = 1;
        loop {
            let candidate = format!("{}-{}", identifier, n);
            if !taken(&candidate) {
                return candidate;
            }
            n += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use uuid::Uuid;

    /// Queue double recording every call. Entries whose identifier is listed
    /// in `flaky` fail the given number of times before succeeding.
    struct MockQueue {
        calls: Mutex<Vec<Vec<QueueEntry>>>,
        flaky: Mutex<HashMap<String, u32>>,
        fail_wholesale: bool,
        unreported: Option<String>,
    }

    impl MockQueue {
        fn new() -> Self {
            Self {
                calls: Mutex::new(Vec::new()),
                flaky: Mutex::new(HashMap::new()),
                fail_wholesale: false,
                unreported: None,
            }
        }

        fn failing_entry(self, identifier: &str, failures: u32) -> Self {
            self.flaky
                .lock()
                .unwrap()
                .insert(identifier.to_string(), failures);
            self
        }

        fn call_sizes(&self) -> Vec<usize> {
            self.calls.lock().unwrap().iter().map(Vec::len).collect()
        }
    }

    #[async_trait]
    impl MessageQueue for MockQueue {
        async fn send_batch(
            &self,
            entries: &[QueueEntry],
        ) -> Result<BatchSendOutcome, QueueError> {
            if entries.len() > MAX_BATCH_ENTRIES {
                return Err(QueueError::BatchTooLarge {
                    size: entries.len(),
                    max: MAX_BATCH_ENTRIES,
                });
            }
            self.calls.lock().unwrap().push(entries.to_vec());

            if self.fail_wholesale {
                return Err(QueueError::transport("broker unavailable"));
            }

            let mut outcome = BatchSendOutcome::default();
            let mut flaky = self.flaky.lock().unwrap();
            for entry in entries {
                if self.unreported.as_deref() == Some(entry.identifier.as_str()) {
                    continue;
                }
                match flaky.get_mut(&entry.identifier) {
                    Some(remaining) if *remaining > 0 => {
                        *remaining -= 1;
                        outcome.failed.push(FailedEntry {
                            id: entry.id.clone(),
                            reason: "throttled".to_string(),
                        });
                    }
                    _ => outcome.successful.push(entry.id.clone()),
                }
            }
            Ok(outcome)
        }
    }

    fn messages(count: usize) -> Vec<IndexMessage> {
        (0..count).map(|_| IndexMessage::for_work(&Uuid::new_v4())).collect()
    }

    #[tokio::test]
    async fn test_batch_boundary_23_messages() {
        let queue = Arc::new(MockQueue::new());
        let mut dispatcher = BatchDispatcher::new(queue.clone());
        let sent = messages(23);

        for message in &sent {
            dispatcher.add(message).await.unwrap();
        }
        dispatcher.flush().await.unwrap();

        assert_eq!(queue.call_sizes(), vec![10, 10, 3]);
        assert_eq!(dispatcher.flush_count(), 3);
        assert_eq!(dispatcher.dispatched_count(), 23);

        let delivered: Vec<String> = queue
            .calls
            .lock()
            .unwrap()
            .iter()
            .flatten()
            .map(|entry| entry.identifier.clone())
            .collect();
        let expected: Vec<String> = sent.iter().map(|m| m.identifier.clone()).collect();
        assert_eq!(delivered, expected);
    }

    #[tokio::test]
    async fn test_flush_when_empty_is_noop() {
        let queue = Arc::new(MockQueue::new());
        let mut dispatcher = BatchDispatcher::new(queue.clone());

        dispatcher.flush().await.unwrap();
        assert!(queue.call_sizes().is_empty());
        assert_eq!(dispatcher.flush_count(), 0);
    }

    #[tokio::test]
    async fn test_entry_body_and_id() {
        let queue = Arc::new(MockQueue::new());
        let mut dispatcher = BatchDispatcher::new(queue.clone());
        let message = IndexMessage::for_work(&Uuid::new_v4());

        dispatcher.add(&message).await.unwrap();
        dispatcher.flush().await.unwrap();

        let calls = queue.calls.lock().unwrap();
        let entry = &calls[0][0];
        assert_eq!(entry.id, message.identifier);
        assert_eq!(IndexMessage::from_body(&entry.body).unwrap(), message);
    }

    #[tokio::test]
    async fn test_colliding_ids_are_suffixed() {
        let queue = Arc::new(MockQueue::new());
        let mut dispatcher = BatchDispatcher::new(queue.clone());
        let message = IndexMessage::for_work(&Uuid::new_v4());

        for _ in 0..3 {
            dispatcher.add(&message).await.unwrap();
        }
        dispatcher.flush().await.unwrap();

        let calls = queue.calls.lock().unwrap();
        let ids: Vec<&str> = calls[0].iter().map(|e| e.id.as_str()).collect();
        assert_eq!(
            ids,
            vec![
                message.identifier.clone(),
                format!("{}-1", message.identifier),
                format!("{}-2", message.identifier),
            ]
        );
    }

    #[tokio::test]
    async fn test_wholesale_failure_reports_whole_group() {
        let mut queue = MockQueue::new();
        queue.fail_wholesale = true;
        let queue = Arc::new(queue);
        let mut dispatcher = BatchDispatcher::new(queue.clone());
        let sent = messages(4);

        for message in &sent {
            dispatcher.add(message).await.unwrap();
        }
        let err = dispatcher.flush().await.unwrap_err();

        assert_eq!(err.identifiers.len(), 4);
        assert!(err.reason.contains("broker unavailable"));
        // No per-entry retry after a wholesale failure
        assert_eq!(queue.call_sizes(), vec![4]);
        assert!(dispatcher.pending.is_empty());
    }

    #[tokio::test]
    async fn test_failed_entry_retried_alone() {
        let sent = messages(3);
        let queue = Arc::new(MockQueue::new().failing_entry(&sent[1].identifier, 1));
        let mut dispatcher = BatchDispatcher::new(queue.clone());

        for message in &sent {
            dispatcher.add(message).await.unwrap();
        }
        dispatcher.flush().await.unwrap();

        assert_eq!(queue.call_sizes(), vec![3, 1]);
        assert_eq!(dispatcher.dispatched_count(), 3);
    }

    #[tokio::test]
    async fn test_entry_failing_past_retries_is_reported() {
        let sent = messages(3);
        let queue = Arc::new(MockQueue::new().failing_entry(&sent[2].identifier, 10));
        let mut dispatcher = BatchDispatcher::with_retries(queue.clone(), 2);

        for message in &sent {
            dispatcher.add(message).await.unwrap();
        }
        let err = dispatcher.flush().await.unwrap_err();

        assert_eq!(err.identifiers, vec![sent[2].identifier.clone()]);
        assert_eq!(err.reason, "throttled");
        assert_eq!(queue.call_sizes(), vec![3, 1, 1]);
        assert_eq!(dispatcher.dispatched_count(), 2);
    }

    #[tokio::test]
    async fn test_failed_group_not_resent_by_later_flush() {
        let mut queue = MockQueue::new();
        queue.fail_wholesale = true;
        let queue = Arc::new(queue);
        let mut dispatcher = BatchDispatcher::new(queue.clone());

        let sent = messages(10);
        let mut errors = Vec::new();
        for message in &sent {
            if let Err(e) = dispatcher.add(message).await {
                errors.push(e);
            }
        }
        dispatcher.flush().await.unwrap();

        assert_eq!(errors.len(), 1);
        assert_eq!(queue.call_sizes(), vec![10]);
    }

    #[tokio::test]
    async fn test_entry_missing_from_outcome_is_undelivered() {
        let sent = messages(4);
        let mut queue = MockQueue::new();
        queue.unreported = Some(sent[1].identifier.clone());
        let queue = Arc::new(queue);
        let mut dispatcher = BatchDispatcher::new(queue.clone());

        for message in &sent {
            dispatcher.add(message).await.unwrap();
        }
        let err = dispatcher.flush().await.unwrap_err();

        assert_eq!(err.identifiers, vec![sent[1].identifier.clone()]);
        assert_eq!(err.reason, NO_RESULT_REASON);
        assert_eq!(dispatcher.dispatched_count(), 3);
        assert_eq!(queue.call_sizes(), vec![4]);
    }
}

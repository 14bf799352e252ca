//! Message types for the consumer.
//!
//! Defines the structures that flow between the consumer and the orchestrator.

/// A raw message read from the index queue.
///
/// The body is left unparsed; malformed bodies are reported per message by
/// the orchestrator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueMessage {
    /// The entry id the message was produced with, if any.
    pub key: Option<String>,
    /// The message body, expected to be an `IndexMessage` JSON document.
    pub body: String,
}

impl QueueMessage {
    /// Create a message from its body.
    pub fn new(body: impl Into<String>) -> Self {
        Self {
            key: None,
            body: body.into(),
        }
    }
}

/// Messages that flow through the indexing stage.
#[derive(Debug)]
pub enum StreamMessage {
    /// A batch of queue messages with associated offsets for acknowledgment.
    Messages {
        messages: Vec<QueueMessage>,
        offsets: Vec<(String, i32, i64)>,
    },
    /// Acknowledgment of a processed batch. Offsets are committed only on success.
    Acknowledgment {
        offsets: Vec<(String, i32, i64)>,
        success: bool,
        error: Option<String>,
    },
    /// Stream has ended.
    End,
    /// An error occurred.
    Error(String),
}

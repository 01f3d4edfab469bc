//! Publishing side of the queue.
//!
//! [`MessagePublisher`] is the seam the ingest API depends on; the SQS
//! implementation lives in [`crate::sqs`].

use async_trait::async_trait;
use thiserror::Error;

/// Errors that can occur during message publication
#[derive(Error, Debug)]
pub enum PublishError {
    #[error("Failed to serialize message: {0}")]
    SerializationError(String),

    #[error("Invalid message attribute {name}: {message}")]
    InvalidAttribute { name: String, message: String },

    #[error("Failed to send message to queue {queue}: {message}")]
    SendError { queue: String, message: String },
}

/// Message to be sent to the queue
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingMessage {
    /// Serialized message body
    pub body: String,
    /// String-typed message attributes
    pub attributes: Vec<(String, String)>,
}

impl OutgoingMessage {
    /// Create a new outgoing message with a JSON body
    pub fn new_json<T: serde::Serialize>(message: &T) -> Result<Self, PublishError> {
        let body = serde_json::to_string(message)
            .map_err(|e| PublishError::SerializationError(e.to_string()))?;
        Ok(Self {
            body,
            attributes: Vec::new(),
        })
    }

    /// Add a string attribute to the message
    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.push((name.into(), value.into()));
        self
    }

    /// Get an attribute value
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }
}

/// Enqueue contract: either the message is accepted by the broker or an
/// error is returned. Implementations do not retry.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait MessagePublisher: Send + Sync {
    /// Publish a message and return the broker-assigned message id
    async fn publish(&self, message: OutgoingMessage) -> Result<String, PublishError>;
}

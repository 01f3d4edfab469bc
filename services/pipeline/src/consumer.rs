//! Receiving side of the queue.
//!
//! Messages are owned by the broker until deleted. A received message that
//! is never deleted becomes visible again once its visibility timeout expires,
//! which is the only retry mechanism the pipeline relies on.

use async_trait::async_trait;
use std::collections::HashMap;
use std::time::Duration;
use thiserror::Error;

/// Errors that can occur during message consumption
#[derive(Error, Debug)]
pub enum ConsumerError {
    #[error("Failed to receive messages: {0}")]
    ReceiveError(String),

    #[error("Failed to delete message: {0}")]
    DeleteError(String),

    #[error("Failed to read queue attributes: {0}")]
    AttributesError(String),

    #[error("Failed to deserialize message: {0}")]
    DeserializationError(String),
}

/// A received message with its body and broker metadata
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IncomingMessage {
    /// Broker-assigned message id
    pub message_id: String,
    /// Handle used to delete this delivery of the message
    pub receipt_handle: String,
    /// Raw message body
    pub body: String,
    /// String-typed message attributes
    pub attributes: HashMap<String, String>,
}

impl IncomingMessage {
    /// Deserialize the body as JSON
    pub fn decode_json<T: serde::de::DeserializeOwned>(&self) -> Result<T, ConsumerError> {
        serde_json::from_str(&self.body)
            .map_err(|e| ConsumerError::DeserializationError(e.to_string()))
    }

    /// Get an attribute value
    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).map(|s| s.as_str())
    }
}

/// Poll/acknowledge contract of the broker.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait MessageQueue: Send + Sync {
    /// Long-poll for up to `max_messages`, waiting at most `wait`
    async fn receive(
        &self,
        max_messages: i32,
        wait: Duration,
    ) -> Result<Vec<IncomingMessage>, ConsumerError>;

    /// Acknowledge a delivery by deleting it from the queue
    async fn delete(&self, receipt_handle: &str) -> Result<(), ConsumerError>;

    /// Approximate number of visible messages
    async fn approximate_depth(&self) -> Result<u64, ConsumerError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::EmailRecord;

    #[test]
    fn test_incoming_message_decode_and_attributes() {
        let record = EmailRecord::new("Test Email", "test@example.com", "1693561101", "hi");
        let mut attributes = HashMap::new();
        attributes.insert("email_sender".to_string(), "test@example.com".to_string());

        let message = IncomingMessage {
            message_id: "m-1".to_string(),
            receipt_handle: "rh-1".to_string(),
            body: record.to_message_body().unwrap(),
            attributes,
        };

        let decoded: EmailRecord = message.decode_json().unwrap();
        assert_eq!(decoded, record);
        assert_eq!(message.attribute("email_sender"), Some("test@example.com"));
    }

    #[test]
    fn test_decode_rejects_garbage() {
        let message = IncomingMessage {
            body: "not json".to_string(),
            ..Default::default()
        };
        assert!(matches!(
            message.decode_json::<EmailRecord>(),
            Err(ConsumerError::DeserializationError(_))
        ));
    }
}

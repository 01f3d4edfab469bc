//! Amazon SQS implementation of the queue traits.

use crate::config::{AwsConfig, QueueConfig};
use crate::consumer::{ConsumerError, IncomingMessage, MessageQueue};
use crate::producer::{MessagePublisher, OutgoingMessage, PublishError};
use async_trait::async_trait;
use aws_sdk_sqs::error::DisplayErrorContext;
use aws_sdk_sqs::types::{MessageAttributeValue, QueueAttributeName};
use aws_sdk_sqs::Client as SqsClient;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, info, instrument};

/// SQS-backed queue used by both the producer and the consumer
#[derive(Clone)]
pub struct SqsQueue {
    client: SqsClient,
    queue_url: String,
}

impl SqsQueue {
    /// Create a queue client from the service configuration
    pub async fn new(aws: &AwsConfig, queue: &QueueConfig) -> Self {
        let sdk_config = aws.load_sdk_config().await;

        info!(
            queue_url = %queue.queue_url,
            region = %aws.region,
            "SQS client initialized"
        );

        Self::from_client(SqsClient::new(&sdk_config), queue.queue_url.clone())
    }

    pub fn from_client(client: SqsClient, queue_url: impl Into<String>) -> Self {
        Self {
            client,
            queue_url: queue_url.into(),
        }
    }

    /// Get the queue URL
    pub fn queue_url(&self) -> &str {
        &self.queue_url
    }
}

#[async_trait]
impl MessagePublisher for SqsQueue {
    #[instrument(skip(self, message), fields(queue_url = %self.queue_url, size_bytes = message.body.len()))]
    async fn publish(&self, message: OutgoingMessage) -> Result<String, PublishError> {
        let mut request = self
            .client
            .send_message()
            .queue_url(&self.queue_url)
            .message_body(message.body);

        for (name, value) in message.attributes {
            let attribute = MessageAttributeValue::builder()
                .data_type("String")
                .string_value(value)
                .build()
                .map_err(|e| PublishError::InvalidAttribute {
                    name: name.clone(),
                    message: e.to_string(),
                })?;
            request = request.message_attributes(name, attribute);
        }

        let output = request.send().await.map_err(|e| PublishError::SendError {
            queue: self.queue_url.clone(),
            message: DisplayErrorContext(&e).to_string(),
        })?;

        let message_id = output.message_id().unwrap_or_default().to_string();
        debug!(message_id = %message_id, "Message published to SQS");

        Ok(message_id)
    }
}

#[async_trait]
impl MessageQueue for SqsQueue {
    #[instrument(skip(self), fields(queue_url = %self.queue_url))]
    async fn receive(
        &self,
        max_messages: i32,
        wait: Duration,
    ) -> Result<Vec<IncomingMessage>, ConsumerError> {
        let output = self
            .client
            .receive_message()
            .queue_url(&self.queue_url)
            .max_number_of_messages(max_messages)
            .wait_time_seconds(wait.as_secs() as i32)
            .message_attribute_names("All")
            .send()
            .await
            .map_err(|e| ConsumerError::ReceiveError(DisplayErrorContext(&e).to_string()))?;

        let messages: Vec<IncomingMessage> = output
            .messages()
            .iter()
            .map(|message| {
                let attributes = message
                    .message_attributes()
                    .map(|attrs| {
                        attrs
                            .iter()
                            .filter_map(|(k, v)| {
                                v.string_value().map(|s| (k.clone(), s.to_string()))
                            })
                            .collect::<HashMap<_, _>>()
                    })
                    .unwrap_or_default();

                IncomingMessage {
                    message_id: message.message_id().unwrap_or_default().to_string(),
                    receipt_handle: message.receipt_handle().unwrap_or_default().to_string(),
                    body: message.body().unwrap_or_default().to_string(),
                    attributes,
                }
            })
            .collect();

        if !messages.is_empty() {
            info!(count = messages.len(), "Received messages from SQS");
        }

        Ok(messages)
    }

    #[instrument(skip(self, receipt_handle), fields(queue_url = %self.queue_url))]
    async fn delete(&self, receipt_handle: &str) -> Result<(), ConsumerError> {
        self.client
            .delete_message()
            .queue_url(&self.queue_url)
            .receipt_handle(receipt_handle)
            .send()
            .await
            .map_err(|e| ConsumerError::DeleteError(DisplayErrorContext(&e).to_string()))?;

        Ok(())
    }

    async fn approximate_depth(&self) -> Result<u64, ConsumerError> {
        let output = self
            .client
            .get_queue_attributes()
            .queue_url(&self.queue_url)
            .attribute_names(QueueAttributeName::ApproximateNumberOfMessages)
            .send()
            .await
            .map_err(|e| ConsumerError::AttributesError(DisplayErrorContext(&e).to_string()))?;

        let depth = output
            .attributes()
            .and_then(|attrs| attrs.get(&QueueAttributeName::ApproximateNumberOfMessages))
            .and_then(|value| value.parse::<u64>().ok())
            .unwrap_or(0);

        Ok(depth)
    }
}

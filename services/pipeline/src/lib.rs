//! Mailpipe Pipeline - shared queue plumbing for the email ingest services
//!
//! This library holds everything the ingest API and the storage consumer
//! agree on:
//!
//! - The [`EmailRecord`] model and its JSON encodings
//! - The [`MessagePublisher`] / [`MessageQueue`] traits the services depend on
//! - The Amazon SQS implementation of both traits
//! - Queue and AWS configuration sections
//!
//! # Example
//!
//! ```rust,no_run
//! use mailpipe_pipeline::{AwsConfig, EmailRecord, MessagePublisher, OutgoingMessage, QueueConfig, SqsQueue};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let queue = SqsQueue::new(&AwsConfig::default(), &QueueConfig::new("https://sqs.us-west-1.amazonaws.com/123/emails")).await;
//!
//!     let record = EmailRecord::new("Hello", "a@example.com", "1693561101", "hi");
//!     let message = OutgoingMessage::new_json(&record)?
//!         .with_attribute("email_sender", &record.email_sender);
//!     queue.publish(message).await?;
//!
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod consumer;
pub mod producer;
pub mod record;
pub mod sqs;

pub use config::{AwsConfig, ConfigError, QueueConfig};
pub use consumer::{ConsumerError, IncomingMessage, MessageQueue};
pub use producer::{MessagePublisher, OutgoingMessage, PublishError};
pub use record::{EmailRecord, REQUIRED_FIELDS};
pub use sqs::SqsQueue;

#[cfg(any(test, feature = "testing"))]
pub use consumer::MockMessageQueue;
#[cfg(any(test, feature = "testing"))]
pub use producer::MockMessagePublisher;

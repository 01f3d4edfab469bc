//! Email producer: validate a submission and enqueue it.
//!
//! The producer never retries a failed publish. A client that receives
//! `UpstreamUnavailable` can safely resubmit, since the storage key derived
//! downstream is the same for the same record.

use crate::validation::{InvalidReason, ValidationOutcome, Validator};
use mailpipe_pipeline::{EmailRecord, MessagePublisher, OutgoingMessage, PublishError};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tracing::{error, info, instrument, warn};

/// Inbound submission
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitRequest {
    /// The email record
    #[serde(alias = "record")]
    pub data: EmailRecord,
    /// Shared authentication value
    pub token: String,
}

/// Successful submission
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmitResponse {
    pub status: String,
    pub message: String,
    pub email_subject: String,
}

impl SubmitResponse {
    fn queued(subject: &str) -> Self {
        Self {
            status: "queued".to_string(),
            message: "Email data received and queued successfully".to_string(),
            email_subject: subject.to_string(),
        }
    }
}

/// Errors surfaced to the caller of [`Producer::submit`]
#[derive(Error, Debug)]
pub enum SubmitError {
    #[error("Invalid authentication value")]
    Unauthorized,

    #[error("Missing or empty required fields: {}", .0.join(", "))]
    BadRequest(Vec<&'static str>),

    #[error("Failed to enqueue email: {0}")]
    UpstreamUnavailable(#[source] PublishError),
}

/// Validates submissions and publishes them to the queue
pub struct Producer {
    validator: Validator,
    publisher: Arc<dyn MessagePublisher>,
}

impl Producer {
    pub fn new(validator: Validator, publisher: Arc<dyn MessagePublisher>) -> Self {
        Self {
            validator,
            publisher,
        }
    }

    /// Validate, serialize, and enqueue a submission.
    #[instrument(skip(self, request), fields(subject = %request.data.email_subject))]
    pub async fn submit(&self, request: SubmitRequest) -> Result<SubmitResponse, SubmitError> {
        match self.validator.validate(&request).await {
            ValidationOutcome::Valid => {}
            ValidationOutcome::Invalid(InvalidReason::AuthFailure) => {
                metrics::counter!("api_validation_errors_total", "error_type" => "invalid_token")
                    .increment(1);
                warn!("Invalid auth value provided");
                return Err(SubmitError::Unauthorized);
            }
            ValidationOutcome::Invalid(InvalidReason::MissingFields(fields)) => {
                metrics::counter!("api_validation_errors_total", "error_type" => "invalid_data")
                    .increment(1);
                let err = SubmitError::BadRequest(fields);
                warn!(error = %err, "Invalid email data");
                return Err(err);
            }
        }

        let record = request.data;
        let message_id = self.publish(&record).await.map_err(|e| {
            metrics::counter!("api_publish_failures_total").increment(1);
            error!(error = %e, "Failed to publish message to SQS");
            SubmitError::UpstreamUnavailable(e)
        })?;

        metrics::counter!("api_messages_published_total").increment(1);
        info!(message_id = %message_id, "Email data queued");

        Ok(SubmitResponse::queued(&record.email_subject))
    }

    async fn publish(&self, record: &EmailRecord) -> Result<String, PublishError> {
        let message = OutgoingMessage::new_json(record)?
            .with_attribute("email_sender", &record.email_sender)
            .with_attribute("email_subject", &record.email_subject);

        self.publisher.publish(message).await
    }
}

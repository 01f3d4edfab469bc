use crate::keys::derive_key;
use crate::s3_uploader::StoreWriter;
use futures::stream::{self, StreamExt};
use mailpipe_pipeline::{ConsumerError, EmailRecord, IncomingMessage, MessageQueue, QueueConfig};
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

/// Why a message was left on the queue
#[derive(Error, Debug)]
pub enum ProcessingError {
    #[error("Error parsing message body: {0}")]
    Parse(#[from] ConsumerError),

    #[error("Failed to store message at {key}")]
    Store { key: String },
}

/// What happened to one message within a cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageOutcome {
    /// Stored (and delete issued)
    Processed,
    /// Left on the queue for redelivery
    Failed,
    /// Not started because the consumer is stopping
    Skipped,
}

/// Summary of one poll/drain cycle
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub received: usize,
    pub processed: usize,
    pub failed: usize,
    pub skipped: usize,
}

/// Drains the email queue into the object store
pub struct EmailConsumer {
    queue: Arc<dyn MessageQueue>,
    writer: Arc<StoreWriter>,
    config: QueueConfig,
}

impl EmailConsumer {
    pub fn new(queue: Arc<dyn MessageQueue>, writer: Arc<StoreWriter>, config: QueueConfig) -> Self {
        Self {
            queue,
            writer,
            config,
        }
    }

    /// Poll, drain, and sleep until `ctx` is cancelled.
    pub async fn run(&self, ctx: CancellationToken) {
        info!(
            poll_interval_secs = self.config.poll_interval_secs,
            max_messages = self.config.max_messages,
            wait_time_secs = self.config.wait_time_secs,
            "Starting SQS consumer loop"
        );

        while !ctx.is_cancelled() {
            let report = self.run_once(&ctx).await;
            if report.received > 0 {
                debug!(?report, "Poll cycle complete");
            }

            tokio::select! {
                _ = ctx.cancelled() => {}
                _ = tokio::time::sleep(self.config.poll_interval()) => {}
            }
        }

        info!("Consumer stopped");
    }

    /// Run a single poll/drain cycle.
    pub async fn run_once(&self, ctx: &CancellationToken) -> CycleReport {
        self.refresh_queue_depth().await;

        let messages = match self
            .queue
            .receive(self.config.max_messages, self.config.wait_time())
            .await
        {
            Ok(messages) => messages,
            Err(e) => {
                error!(error = %e, "Error receiving messages from SQS");
                metrics::counter!("sqs_receive_errors_total").increment(1);
                Vec::new()
            }
        };

        let mut report = CycleReport {
            received: messages.len(),
            ..Default::default()
        };

        let concurrency = self.config.max_messages.max(1) as usize;
        let outcomes: Vec<MessageOutcome> = stream::iter(messages)
            .map(|message| self.handle_message(message, ctx))
            .buffer_unordered(concurrency)
            .collect()
            .await;

        for outcome in outcomes {
            match outcome {
                MessageOutcome::Processed => report.processed += 1,
                MessageOutcome::Failed => report.failed += 1,
                MessageOutcome::Skipped => report.skipped += 1,
            }
        }

        report
    }

    /// Best-effort queue depth gauge update
    async fn refresh_queue_depth(&self) {
        match self.queue.approximate_depth().await {
            Ok(depth) => {
                metrics::gauge!("sqs_queue_messages_visible").set(depth as f64);
            }
            Err(e) => {
                warn!(error = %e, "Error getting queue attributes");
            }
        }
    }

    #[instrument(skip(self, message, ctx), fields(message_id = %message.message_id))]
    async fn handle_message(
        &self,
        message: IncomingMessage,
        ctx: &CancellationToken,
    ) -> MessageOutcome {
        if ctx.is_cancelled() {
            debug!("Consumer stopping, leaving message for redelivery");
            return MessageOutcome::Skipped;
        }

        let start = Instant::now();

        match self.process_message(&message).await {
            Ok(s3_key) => {
                metrics::histogram!("message_processing_duration_seconds")
                    .record(start.elapsed().as_secs_f64());
                metrics::counter!("sqs_messages_processed_total").increment(1);
                info!(s3_key = %s3_key, "Message processed successfully");

                if let Err(e) = self.queue.delete(&message.receipt_handle).await {
                    // Redelivery rewrites the same key
                    error!(error = %e, "Error deleting message from SQS");
                    metrics::counter!("sqs_delete_errors_total").increment(1);
                }

                MessageOutcome::Processed
            }
            Err(e) => {
                metrics::counter!("sqs_messages_failed_total").increment(1);
                warn!(error = %e, "Message processing failed, will retry");
                MessageOutcome::Failed
            }
        }
    }

    async fn process_message(&self, message: &IncomingMessage) -> Result<String, ProcessingError> {
        let record: EmailRecord = message.decode_json()?;
        let s3_key = derive_key(&record);

        if self.writer.store(&record, &s3_key).await {
            Ok(s3_key)
        } else {
            Err(ProcessingError::Store { key: s3_key })
        }
    }
}

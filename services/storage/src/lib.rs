//! Mailpipe Storage Consumer
//!
//! Drains the email queue and persists each record as a JSON object in S3.
//! A message is deleted from the queue only after its object has been
//! written; anything that fails stays on the queue and is redelivered once
//! its visibility timeout expires.
//!
//! ## Architecture
//!
//! ```text
//!   SQS queue                                         S3 bucket
//! ┌──────────────┐   receive    ┌──────────────┐    ┌──────────────────────┐
//! │ email        │─────────────▶│ Email        │    │ emails/              │
//! │ messages     │              │ Consumer     │    │   {YYYY}/{MM}/{DD}/  │
//! └──────────────┘              └──────────────┘    │   email-{ts}-{h}.json│
//!        ▲                         │        │       └──────────────────────┘
//!        │ delete on success       │        ▼                  ▲
//!        └─────────────────────────┘  ┌──────────────┐         │
//!                                     │ Store        │─────────┘
//!                                     │ Writer       │
//!                                     └──────────────┘
//! ```

pub mod config;
pub mod keys;
pub mod s3_uploader;
pub mod sqs_consumer;

pub use config::{Config, S3Config};
pub use keys::{derive_key, derive_key_at, KeyPlan};
pub use s3_uploader::{ObjectStore, S3Uploader, StoreError, StoreWriter};
pub use sqs_consumer::{CycleReport, EmailConsumer, MessageOutcome, ProcessingError};

//! Mailpipe Ingest API
//!
//! Accepts email submissions over HTTP, authenticates them against a shared
//! value held in SSM Parameter Store, validates the required fields, and
//! publishes valid records to SQS for the storage consumer.
//!
//! ## Architecture
//!
//! ```text
//! POST /api/email
//!        │
//!        ▼
//! ┌──────────────┐   token?   ┌──────────────┐  miss   ┌──────────────┐
//! │ Validator    │───────────▶│ Credential   │────────▶│ SSM          │
//! │              │            │ Cache (TTL)  │         │ Parameter    │
//! └──────────────┘            └──────────────┘         └──────────────┘
//!        │ valid
//!        ▼
//! ┌──────────────┐           ┌──────────────┐
//! │ Producer     │──────────▶│ SQS queue    │
//! └──────────────┘           └──────────────┘
//! ```

pub mod api;
pub mod config;
pub mod credentials;
pub mod producer;
pub mod validation;

pub use api::{create_router, start_api_server, AppState};
pub use config::IngestConfig;
pub use credentials::{CredentialCache, ParameterStore, SsmParameterStore};
pub use producer::{Producer, SubmitError, SubmitRequest, SubmitResponse};
pub use validation::{InvalidReason, ValidationOutcome, Validator};

//! Authentication and field validation for submitted emails.

use crate::credentials::CredentialCache;
use crate::producer::SubmitRequest;
use std::sync::Arc;
use tracing::{error, warn};

/// Why a request was rejected
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvalidReason {
    /// Token mismatch, empty token, or credential unavailable
    AuthFailure,
    /// Every required field that was absent or blank
    MissingFields(Vec<&'static str>),
}

/// Result of validating a request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationOutcome {
    Valid,
    Invalid(InvalidReason),
}

impl ValidationOutcome {
    pub fn is_valid(&self) -> bool {
        matches!(self, ValidationOutcome::Valid)
    }
}

/// Validator backed by the shared credential cache
#[derive(Clone)]
pub struct Validator {
    credentials: Arc<CredentialCache>,
}

impl Validator {
    pub fn new(credentials: Arc<CredentialCache>) -> Self {
        Self { credentials }
    }

    /// Check the token first, then report all missing fields at once.
    pub async fn validate(&self, request: &SubmitRequest) -> ValidationOutcome {
        if !self.token_matches(&request.token).await {
            return ValidationOutcome::Invalid(InvalidReason::AuthFailure);
        }

        let missing = request.data.missing_fields();
        if !missing.is_empty() {
            return ValidationOutcome::Invalid(InvalidReason::MissingFields(missing));
        }

        ValidationOutcome::Valid
    }

    async fn token_matches(&self, token: &str) -> bool {
        if token.is_empty() {
            warn!("Empty auth value provided");
            return false;
        }

        match self.credentials.get_credential().await {
            Ok(expected) => token == expected,
            Err(e) => {
                // Fail closed
                error!(
                    error = %e,
                    parameter = %self.credentials.parameter_name(),
                    "Auth validation error"
                );
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credentials::{MockParameterStore, ParameterStoreError};
    use mailpipe_pipeline::EmailRecord;

    fn validator_with_secret(secret: &'static str) -> Validator {
        let mut store = MockParameterStore::new();
        store
            .expect_get_parameter()
            .returning(move |_, _| Ok(secret.to_string()));
        Validator::new(Arc::new(CredentialCache::new(Arc::new(store), "/token")))
    }

    fn request(record: EmailRecord, token: &str) -> SubmitRequest {
        SubmitRequest {
            data: record,
            token: token.to_string(),
        }
    }

    fn complete_record() -> EmailRecord {
        EmailRecord::new("Test Email", "test@example.com", "1693561101", "hi")
    }

    #[tokio::test]
    async fn test_valid_request() {
        let validator = validator_with_secret("s3cret");
        let outcome = validator.validate(&request(complete_record(), "s3cret")).await;
        assert!(outcome.is_valid());
    }

    #[tokio::test]
    async fn test_wrong_token_is_auth_failure() {
        let validator = validator_with_secret("s3cret");
        let outcome = validator.validate(&request(complete_record(), "nope")).await;
        assert_eq!(outcome, ValidationOutcome::Invalid(InvalidReason::AuthFailure));
    }

    #[tokio::test]
    async fn test_empty_token_skips_credential_fetch() {
        let mut store = MockParameterStore::new();
        store.expect_get_parameter().never();
        let validator =
            Validator::new(Arc::new(CredentialCache::new(Arc::new(store), "/token")));

        let outcome = validator.validate(&request(complete_record(), "")).await;
        assert_eq!(outcome, ValidationOutcome::Invalid(InvalidReason::AuthFailure));
    }

    #[tokio::test]
    async fn test_credential_fetch_failure_fails_closed() {
        let mut store = MockParameterStore::new();
        store
            .expect_get_parameter()
            .returning(|_, _| Err(ParameterStoreError::Unavailable("timeout".to_string())));
        let validator =
            Validator::new(Arc::new(CredentialCache::new(Arc::new(store), "/token")));

        let outcome = validator.validate(&request(complete_record(), "anything")).await;
        assert_eq!(outcome, ValidationOutcome::Invalid(InvalidReason::AuthFailure));
    }

    #[tokio::test]
    async fn test_reports_every_missing_field() {
        let validator = validator_with_secret("s3cret");
        let record = EmailRecord::new(" ", "test@example.com", "", "hi");
        let outcome = validator.validate(&request(record, "s3cret")).await;
        assert_eq!(
            outcome,
            ValidationOutcome::Invalid(InvalidReason::MissingFields(vec![
                "email_subject",
                "email_timestamp"
            ]))
        );
    }

    #[tokio::test]
    async fn test_single_missing_content_field() {
        let validator = validator_with_secret("s3cret");
        let mut record = complete_record();
        record.email_content.clear();
        let outcome = validator.validate(&request(record, "s3cret")).await;
        assert_eq!(
            outcome,
            ValidationOutcome::Invalid(InvalidReason::MissingFields(vec!["email_content"]))
        );
    }
}

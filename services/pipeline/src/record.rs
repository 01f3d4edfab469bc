//! Email record model shared by the ingest API and the storage consumer.
//!
//! The record is the unit that travels through the whole pipeline: it is
//! validated by the API, serialized as the SQS message body, and written
//! verbatim (pretty-printed) to S3 by the consumer.

use serde::{Deserialize, Serialize};

/// Wire names of the required record fields, in declaration order.
pub const REQUIRED_FIELDS: [&str; 4] = [
    "email_subject",
    "email_sender",
    "email_timestamp",
    "email_content",
];

/// A single email submitted by a client.
///
/// Every field defaults to the empty string when it is missing from the JSON
/// document, so a missing field and a blank one are reported the same way by
/// [`EmailRecord::missing_fields`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailRecord {
    /// Subject line
    #[serde(default)]
    pub email_subject: String,
    /// Sender address
    #[serde(default)]
    pub email_sender: String,
    /// Epoch seconds, string encoded
    #[serde(default)]
    pub email_timestamp: String,
    /// Message body
    #[serde(default)]
    pub email_content: String,
}

impl EmailRecord {
    pub fn new(
        subject: impl Into<String>,
        sender: impl Into<String>,
        timestamp: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            email_subject: subject.into(),
            email_sender: sender.into(),
            email_timestamp: timestamp.into(),
            email_content: content.into(),
        }
    }

    fn fields(&self) -> [(&'static str, &str); 4] {
        [
            (REQUIRED_FIELDS[0], self.email_subject.as_str()),
            (REQUIRED_FIELDS[1], self.email_sender.as_str()),
            (REQUIRED_FIELDS[2], self.email_timestamp.as_str()),
            (REQUIRED_FIELDS[3], self.email_content.as_str()),
        ]
    }

    /// Names of every field that is absent or blank after trimming.
    pub fn missing_fields(&self) -> Vec<&'static str> {
        self.fields()
            .into_iter()
            .filter(|(_, value)| value.trim().is_empty())
            .map(|(name, _)| name)
            .collect()
    }

    /// Compact JSON used as the queue message body.
    pub fn to_message_body(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    /// Parse a queue message body back into a record.
    pub fn from_message_body(body: &str) -> serde_json::Result<Self> {
        serde_json::from_str(body)
    }

    /// Pretty-printed JSON used as the stored object body.
    pub fn to_pretty_json(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec_pretty(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> EmailRecord {
        EmailRecord::new("Test Email", "test@example.com", "1693561101", "hi")
    }

    #[test]
    fn test_complete_record_has_no_missing_fields() {
        assert!(sample().missing_fields().is_empty());
    }

    #[test]
    fn test_missing_fields_lists_every_blank_field() {
        let record = EmailRecord::new("", "test@example.com", "   ", "");
        assert_eq!(
            record.missing_fields(),
            vec!["email_subject", "email_timestamp", "email_content"]
        );
    }

    #[test]
    fn test_absent_json_fields_default_to_empty() {
        let record: EmailRecord = serde_json::from_str(
            r#"{"email_subject":"s","email_sender":"a@b.c","email_timestamp":"1"}"#,
        )
        .unwrap();
        assert_eq!(record.missing_fields(), vec!["email_content"]);
    }

    #[test]
    fn test_message_body_round_trip() {
        let record = EmailRecord::new("Ünïcode ✉", "a@b.c", "1693561101", "line1\nline2 \"q\"");
        let body = record.to_message_body().unwrap();
        assert_eq!(EmailRecord::from_message_body(&body).unwrap(), record);
    }

    #[test]
    fn test_pretty_json_is_indented() {
        let bytes = sample().to_pretty_json().unwrap();
        let text = String::from_utf8(bytes).unwrap();
        assert!(text.contains("\n  \"email_subject\": \"Test Email\""));
    }
}

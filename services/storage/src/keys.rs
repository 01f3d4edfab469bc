//! Storage key derivation.
//!
//! Keys are `emails/{YYYY}/{MM}/{DD}/email-{timestamp}-{senderHash}.json`,
//! with the date taken from the record's epoch-seconds timestamp in UTC. The
//! same record always maps to the same key, so a redelivered message
//! overwrites its earlier copy instead of creating a duplicate.
//!
//! Two different records sharing `(timestamp, sender)` also share a key and
//! the later write wins. The sender hash only spreads same-second emails from
//! different senders apart.

use chrono::{DateTime, Utc};
use mailpipe_pipeline::EmailRecord;
use xxhash_rust::xxh3::xxh3_64;

/// Top-level prefix for every stored email
pub const KEY_PREFIX: &str = "emails";

/// Range of the sender hash component
pub const SENDER_HASH_BUCKETS: u64 = 10_000;

/// Sender used when the record has none
pub const UNKNOWN_SENDER: &str = "unknown";

/// How a key will be built for a record
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyPlan {
    /// Date-partitioned key
    Dated {
        date: DateTime<Utc>,
        timestamp: i64,
        sender_hash: u64,
    },
    /// Flat key used when the timestamp is not a usable epoch value
    Fallback { now: i64 },
}

impl KeyPlan {
    pub fn into_key(self) -> String {
        match self {
            KeyPlan::Dated {
                date,
                timestamp,
                sender_hash,
            } => format!(
                "{prefix}/{date}/email-{timestamp}-{sender_hash}.json",
                prefix = KEY_PREFIX,
                date = date.format("%Y/%m/%d"),
            ),
            KeyPlan::Fallback { now } => format!("{KEY_PREFIX}/{now}/email-{now}.json"),
        }
    }
}

/// Stable, non-cryptographic sender hash in `0..SENDER_HASH_BUCKETS`
pub fn sender_hash(sender: &str) -> u64 {
    xxh3_64(sender.as_bytes()) % SENDER_HASH_BUCKETS
}

/// Decide how to key `record`, using `now` for a missing timestamp or the fallback.
pub fn plan_key(record: &EmailRecord, now: i64) -> KeyPlan {
    let raw_timestamp = record.email_timestamp.trim();
    let timestamp = if raw_timestamp.is_empty() {
        now
    } else {
        match raw_timestamp.parse::<i64>() {
            Ok(ts) => ts,
            Err(_) => return KeyPlan::Fallback { now },
        }
    };

    let Some(date) = DateTime::<Utc>::from_timestamp(timestamp, 0) else {
        return KeyPlan::Fallback { now };
    };

    let sender = match record.email_sender.trim() {
        "" => UNKNOWN_SENDER,
        s => s,
    };

    KeyPlan::Dated {
        date,
        timestamp,
        sender_hash: sender_hash(sender),
    }
}

/// Derive the storage key for `record` at an explicit `now` (epoch seconds).
pub fn derive_key_at(record: &EmailRecord, now: i64) -> String {
    plan_key(record, now).into_key()
}

/// Derive the storage key for `record`. Never fails.
pub fn derive_key(record: &EmailRecord) -> String {
    derive_key_at(record, Utc::now().timestamp())
}

#[cfg(test)]
mod tests {
    use super::*;

    const NOW: i64 = 1_700_000_000;

    fn record(sender: &str, timestamp: &str) -> EmailRecord {
        EmailRecord::new("Test Email", sender, timestamp, "hi")
    }

    #[test]
    fn test_dated_key_layout() {
        let key = derive_key_at(&record("test@example.com", "1693561101"), NOW);
        assert_eq!(
            key,
            format!(
                "emails/2023/09/01/email-1693561101-{}.json",
                sender_hash("test@example.com")
            )
        );
    }

    #[test]
    fn test_derivation_is_deterministic() {
        let r = record("test@example.com", "1693561101");
        assert_eq!(derive_key(&r), derive_key(&r));
        assert_eq!(derive_key_at(&r, 1), derive_key_at(&r, 2));
    }

    #[test]
    fn test_sender_hash_is_bounded_and_stable() {
        for sender in ["", "a", "test@example.com", "ünïcödé@例え.jp"] {
            let h = sender_hash(sender);
            assert!(h < SENDER_HASH_BUCKETS);
            assert_eq!(h, sender_hash(sender));
        }
    }

    #[test]
    fn test_blank_sender_uses_unknown() {
        assert_eq!(
            derive_key_at(&record("  ", "1693561101"), NOW),
            derive_key_at(&record(UNKNOWN_SENDER, "1693561101"), NOW)
        );
    }

    #[test]
    fn test_missing_timestamp_uses_now() {
        let key = derive_key_at(&record("a@b.c", ""), NOW);
        assert_eq!(
            key,
            format!("emails/2023/11/14/email-{NOW}-{}.json", sender_hash("a@b.c"))
        );
    }

    #[test]
    fn test_unparseable_timestamp_falls_back() {
        let r = record("a@b.c", "yesterday");
        assert_eq!(plan_key(&r, NOW), KeyPlan::Fallback { now: NOW });
        assert_eq!(
            derive_key_at(&r, NOW),
            format!("emails/{NOW}/email-{NOW}.json")
        );
        assert!(derive_key(&r).starts_with("emails/"));
    }

    #[test]
    fn test_equivalent_timestamp_spellings_share_a_key() {
        let canonical = derive_key_at(&record("a@b.c", "1693561101"), NOW);
        for spelling in ["+1693561101", "01693561101", " 1693561101 "] {
            assert_eq!(derive_key_at(&record("a@b.c", spelling), NOW), canonical);
        }
    }

    #[test]
    fn test_out_of_range_timestamp_falls_back() {
        let r = record("a@b.c", &i64::MAX.to_string());
        assert_eq!(plan_key(&r, NOW), KeyPlan::Fallback { now: NOW });
    }

    #[test]
    fn test_same_timestamp_and_sender_collide() {
        let first = EmailRecord::new("one", "a@b.c", "1693561101", "first body");
        let second = EmailRecord::new("two", "a@b.c", "1693561101", "second body");
        assert_eq!(derive_key_at(&first, NOW), derive_key_at(&second, NOW));
    }
}

//! Queue and AWS configuration shared by the mailpipe services.
//!
//! Both services deserialize these sections out of their own layered
//! configuration (files + environment), then hand them to the clients here.

use aws_config::{BehaviorVersion, Region, SdkConfig};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Errors that can occur during configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Missing required configuration: {0}")]
    MissingRequired(String),

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    #[error("Failed to load configuration: {0}")]
    LoadError(#[from] config::ConfigError),
}

/// AWS client configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AwsConfig {
    /// AWS region
    #[serde(default = "default_region")]
    pub region: String,
    /// Custom endpoint URL (LocalStack, ElasticMQ, MinIO, ...)
    #[serde(default)]
    pub endpoint_url: Option<String>,
}

impl Default for AwsConfig {
    fn default() -> Self {
        Self {
            region: default_region(),
            endpoint_url: None,
        }
    }
}

impl AwsConfig {
    /// Resolve credentials and build the shared SDK configuration.
    pub async fn load_sdk_config(&self) -> SdkConfig {
        let mut loader = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(self.region.clone()));

        if let Some(ref endpoint_url) = self.endpoint_url {
            loader = loader.endpoint_url(endpoint_url);
        }

        loader.load().await
    }
}

/// SQS queue configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueConfig {
    /// Queue URL; required by both services
    #[serde(default)]
    pub queue_url: String,
    /// Maximum messages per receive call (SQS caps this at 10)
    #[serde(default = "default_max_messages")]
    pub max_messages: i32,
    /// Long-poll wait in seconds (SQS caps this at 20)
    #[serde(default = "default_wait_time_secs")]
    pub wait_time_secs: i32,
    /// Pause between poll cycles in seconds
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            queue_url: String::new(),
            max_messages: default_max_messages(),
            wait_time_secs: default_wait_time_secs(),
            poll_interval_secs: default_poll_interval_secs(),
        }
    }
}

impl QueueConfig {
    pub fn new(queue_url: impl Into<String>) -> Self {
        Self {
            queue_url: queue_url.into(),
            ..Default::default()
        }
    }

    /// Get the long-poll wait as Duration
    pub fn wait_time(&self) -> Duration {
        Duration::from_secs(self.wait_time_secs.max(0) as u64)
    }

    /// Get the poll interval as Duration
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    /// Validate the queue section.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.queue_url.trim().is_empty() {
            return Err(ConfigError::MissingRequired("queue.queue_url".to_string()));
        }

        if !(1..=10).contains(&self.max_messages) {
            return Err(ConfigError::InvalidValue {
                key: "queue.max_messages".to_string(),
                message: "must be between 1 and 10".to_string(),
            });
        }

        if !(0..=20).contains(&self.wait_time_secs) {
            return Err(ConfigError::InvalidValue {
                key: "queue.wait_time_secs".to_string(),
                message: "must be between 0 and 20".to_string(),
            });
        }

        Ok(())
    }
}

fn default_region() -> String {
    "us-west-1".to_string()
}

fn default_max_messages() -> i32 {
    10
}

fn default_wait_time_secs() -> i32 {
    20
}

fn default_poll_interval_secs() -> u64 {
    30
}

use config::{Environment, File};
use mailpipe_pipeline::{AwsConfig, ConfigError, QueueConfig};
use serde::Deserialize;

/// Main configuration for the storage consumer
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Service configuration
    #[serde(default)]
    pub service: ServiceConfig,
    /// AWS client configuration
    #[serde(default)]
    pub aws: AwsConfig,
    /// Queue to drain
    #[serde(default)]
    pub queue: QueueConfig,
    /// S3 configuration
    #[serde(default)]
    pub s3: S3Config,
}

/// Service-level configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceConfig {
    /// Service name for logging/metrics
    #[serde(default = "default_service_name")]
    pub name: String,
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Metrics port
    #[serde(default = "default_metrics_port")]
    pub metrics_port: u16,
}

/// S3 storage configuration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct S3Config {
    /// S3 bucket name for email storage
    #[serde(default)]
    pub bucket: String,
    /// Force path-style access (required for MinIO)
    #[serde(default)]
    pub force_path_style: bool,
}

fn default_service_name() -> String {
    "sqs-consumer".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_metrics_port() -> u16 {
    9090
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: default_service_name(),
            log_level: default_log_level(),
            metrics_port: default_metrics_port(),
        }
    }
}

impl Config {
    /// Load configuration from environment and config files
    pub fn load() -> Result<Self, ConfigError> {
        let config = config::Config::builder()
            .add_source(File::with_name("config/storage").required(false))
            .add_source(File::with_name("/etc/mailpipe/storage").required(false))
            // Override with environment variables
            // STORAGE__QUEUE__QUEUE_URL -> queue.queue_url
            .add_source(
                Environment::with_prefix("STORAGE")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        Ok(config.try_deserialize()?)
    }

    /// Reject configurations the consumer cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.queue.validate()?;

        if self.s3.bucket.trim().is_empty() {
            return Err(ConfigError::MissingRequired("s3.bucket".to_string()));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_config() -> Config {
        Config {
            service: ServiceConfig::default(),
            aws: AwsConfig::default(),
            queue: QueueConfig::new("https://sqs.us-west-1.amazonaws.com/123/emails"),
            s3: S3Config {
                bucket: "emails-bucket".to_string(),
                force_path_style: false,
            },
        }
    }

    #[test]
    fn test_default_values() {
        let config = create_test_config();
        assert_eq!(config.service.metrics_port, 9090);
        assert_eq!(config.queue.poll_interval_secs, 30);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_missing_bucket() {
        let mut config = create_test_config();
        config.s3.bucket = String::new();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::MissingRequired(key)) if key == "s3.bucket"
        ));
    }

    #[test]
    fn test_missing_queue_url() {
        let mut config = create_test_config();
        config.queue.queue_url = String::new();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::MissingRequired(key)) if key == "queue.queue_url"
        ));
    }
}

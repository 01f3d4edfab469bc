//! Configuration management for the ingest API.
//!
//! Configuration is loaded in the following order (later sources override earlier):
//! 1. Built-in defaults
//! 2. `config/ingest` and `/etc/mailpipe/ingest` (any format the `config` crate reads)
//! 3. Environment variables prefixed with `INGEST__`, e.g. `INGEST__QUEUE__QUEUE_URL`

use config::{Config, Environment, File};
use mailpipe_pipeline::{AwsConfig, ConfigError, QueueConfig};
use serde::Deserialize;
use std::time::Duration;

/// Main configuration for the ingest service.
#[derive(Debug, Clone, Deserialize)]
pub struct IngestConfig {
    /// Service configuration
    #[serde(default)]
    pub service: ServiceConfig,
    /// HTTP listener configuration
    #[serde(default)]
    pub api: ApiConfig,
    /// AWS client configuration
    #[serde(default)]
    pub aws: AwsConfig,
    /// Queue the API publishes to
    #[serde(default)]
    pub queue: QueueConfig,
    /// Credential lookup configuration
    #[serde(default)]
    pub auth: AuthConfig,
}

/// Service-level configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceConfig {
    /// Service name for logging
    #[serde(default = "default_service_name")]
    pub name: String,
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

/// HTTP listener configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    /// API listen address
    #[serde(default = "default_api_host")]
    pub host: String,
    /// API listen port
    #[serde(default = "default_api_port")]
    pub port: u16,
}

/// Credential lookup configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    /// SSM parameter holding the shared auth value
    #[serde(default = "default_token_parameter")]
    pub token_parameter: String,
    /// How long a fetched value is trusted
    #[serde(default = "default_cache_ttl_secs")]
    pub cache_ttl_secs: u64,
}

fn default_service_name() -> String {
    "api-service".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_api_host() -> String {
    "0.0.0.0".to_string()
}

fn default_api_port() -> u16 {
    8000
}

fn default_token_parameter() -> String {
    "/devops-exam/prod/api/token".to_string()
}

fn default_cache_ttl_secs() -> u64 {
    300
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: default_service_name(),
            log_level: default_log_level(),
        }
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: default_api_host(),
            port: default_api_port(),
        }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            token_parameter: default_token_parameter(),
            cache_ttl_secs: default_cache_ttl_secs(),
        }
    }
}

impl AuthConfig {
    /// Get credential cache TTL as Duration
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }
}

impl IngestConfig {
    /// Load configuration from files and environment variables.
    pub fn load() -> Result<Self, ConfigError> {
        let config = Config::builder()
            .add_source(File::with_name("config/ingest").required(false))
            .add_source(File::with_name("/etc/mailpipe/ingest").required(false))
            .add_source(
                Environment::with_prefix("INGEST")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        Ok(config.try_deserialize()?)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.queue.validate()?;

        if self.auth.token_parameter.trim().is_empty() {
            return Err(ConfigError::MissingRequired(
                "auth.token_parameter".to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_config() -> IngestConfig {
        IngestConfig {
            service: ServiceConfig::default(),
            api: ApiConfig::default(),
            aws: AwsConfig::default(),
            queue: QueueConfig::new("https://sqs.us-west-1.amazonaws.com/123/emails"),
            auth: AuthConfig::default(),
        }
    }

    #[test]
    fn test_valid_config() {
        let config = create_test_config();
        assert!(config.validate().is_ok());
        assert_eq!(config.api.port, 8000);
        assert_eq!(config.auth.cache_ttl(), Duration::from_secs(300));
    }

    #[test]
    fn test_missing_queue_url() {
        let mut config = create_test_config();
        config.queue.queue_url = String::new();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::MissingRequired(_))
        ));
    }

    #[test]
    fn test_missing_token_parameter() {
        let mut config = create_test_config();
        config.auth.token_parameter = " ".to_string();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::MissingRequired(key)) if key == "auth.token_parameter"
        ));
    }
}

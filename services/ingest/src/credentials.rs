//! Shared API credential fetched from SSM Parameter Store.
//!
//! The credential is cached for a fixed TTL. Readers take a shared lock on
//! the fast path; on a miss, refreshes are serialized behind an async mutex and
//! re-check freshness after acquiring it, so concurrent misses collapse into a
//! single upstream `GetParameter` call.

use async_trait::async_trait;
use aws_sdk_ssm::error::DisplayErrorContext;
use aws_sdk_ssm::Client as SsmClient;
use aws_config::SdkConfig;
use parking_lot::RwLock;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument};

/// Default credential TTL (5 minutes).
pub const DEFAULT_CREDENTIAL_TTL: Duration = Duration::from_secs(300);

/// Errors returned by a parameter store
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParameterStoreError {
    #[error("Parameter not found: {0}")]
    NotFound(String),

    #[error("Parameter {0} has no value")]
    EmptyValue(String),

    #[error("Parameter store unavailable: {0}")]
    Unavailable(String),
}

/// Errors returned by [`CredentialCache::get_credential`]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CredentialError {
    #[error("Failed to fetch credential: {0}")]
    Fetch(#[from] ParameterStoreError),
}

/// Versioned key/value store holding the shared credential.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ParameterStore: Send + Sync {
    /// Fetch the current value of a parameter
    async fn get_parameter(
        &self,
        name: &str,
        with_decryption: bool,
    ) -> Result<String, ParameterStoreError>;
}

/// SSM Parameter Store client
pub struct SsmParameterStore {
    client: SsmClient,
}

impl SsmParameterStore {
    pub fn new(sdk_config: &SdkConfig) -> Self {
        Self {
            client: SsmClient::new(sdk_config),
        }
    }
}

#[async_trait]
impl ParameterStore for SsmParameterStore {
    #[instrument(skip(self))]
    async fn get_parameter(
        &self,
        name: &str,
        with_decryption: bool,
    ) -> Result<String, ParameterStoreError> {
        let output = self
            .client
            .get_parameter()
            .name(name)
            .with_decryption(with_decryption)
            .send()
            .await
            .map_err(|e| {
                let not_found = e
                    .as_service_error()
                    .map(|se| se.is_parameter_not_found())
                    .unwrap_or(false);
                if not_found {
                    ParameterStoreError::NotFound(name.to_string())
                } else {
                    ParameterStoreError::Unavailable(DisplayErrorContext(&e).to_string())
                }
            })?;

        output
            .parameter()
            .and_then(|p| p.value())
            .map(str::to_string)
            .ok_or_else(|| ParameterStoreError::EmptyValue(name.to_string()))
    }
}

#[derive(Debug, Clone)]
struct CachedCredential {
    value: String,
    fetched_at: Instant,
}

/// Most recent failed fetch, shared with callers that queued behind it
#[derive(Debug, Clone)]
struct FailedFetch {
    error: CredentialError,
    failed_at: Instant,
}

/// TTL cache around a single credential parameter.
pub struct CredentialCache {
    store: Arc<dyn ParameterStore>,
    parameter_name: String,
    ttl: Duration,
    cached: RwLock<Option<CachedCredential>>,
    refresh_lock: Mutex<Option<FailedFetch>>,
}

impl CredentialCache {
    /// Create a cache with the default TTL
    pub fn new(store: Arc<dyn ParameterStore>, parameter_name: impl Into<String>) -> Self {
        Self::with_ttl(store, parameter_name, DEFAULT_CREDENTIAL_TTL)
    }

    pub fn with_ttl(
        store: Arc<dyn ParameterStore>,
        parameter_name: impl Into<String>,
        ttl: Duration,
    ) -> Self {
        Self {
            store,
            parameter_name: parameter_name.into(),
            ttl,
            cached: RwLock::new(None),
            refresh_lock: Mutex::new(None),
        }
    }

    /// Name of the backing parameter
    pub fn parameter_name(&self) -> &str {
        &self.parameter_name
    }

    /// Return the credential, refreshing it from the store when stale.
    pub async fn get_credential(&self) -> Result<String, CredentialError> {
        if let Some(value) = self.fresh_value() {
            return Ok(value);
        }

        let waiting_since = Instant::now();
        let mut last_failure = self.refresh_lock.lock().await;

        // Another caller may have refreshed while we waited
        if let Some(value) = self.fresh_value() {
            debug!("Credential refreshed by concurrent caller");
            return Ok(value);
        }

        // ...or failed to, in which case we share its error
        if let Some(failure) = (*last_failure)
            .as_ref()
            .filter(|f| f.failed_at >= waiting_since)
        {
            debug!("Credential fetch failed for concurrent caller");
            return Err(failure.error.clone());
        }

        info!(parameter = %self.parameter_name, "Fetching credential from parameter store");
        let value = match self.store.get_parameter(&self.parameter_name, true).await {
            Ok(value) => value,
            Err(e) => {
                let error = CredentialError::from(e);
                *last_failure = Some(FailedFetch {
                    error: error.clone(),
                    failed_at: Instant::now(),
                });
                return Err(error);
            }
        };

        *last_failure = None;
        *self.cached.write() = Some(CachedCredential {
            value: value.clone(),
            fetched_at: Instant::now(),
        });
        metrics::counter!("api_credential_refreshes_total").increment(1);

        Ok(value)
    }

    /// Drop the cached value so the next call refetches.
    pub fn invalidate(&self) {
        *self.cached.write() = None;
    }

    fn fresh_value(&self) -> Option<String> {
        self.cached
            .read()
            .as_ref()
            .filter(|c| c.fetched_at.elapsed() < self.ttl)
            .map(|c| c.value.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const PARAM: &str = "/mailpipe/test/api/token";

    fn cache_with(mock: MockParameterStore, ttl: Duration) -> CredentialCache {
        CredentialCache::with_ttl(Arc::new(mock), PARAM, ttl)
    }

    #[tokio::test]
    async fn test_fetches_once_within_ttl() {
        let mut mock = MockParameterStore::new();
        mock.expect_get_parameter()
            .withf(|name, decrypt| name == PARAM && *decrypt)
            .times(1)
            .returning(|_, _| Ok("secret".to_string()));

        let cache = cache_with(mock, DEFAULT_CREDENTIAL_TTL);
        assert_eq!(cache.get_credential().await.unwrap(), "secret");
        assert_eq!(cache.get_credential().await.unwrap(), "secret");
    }

    #[tokio::test]
    async fn test_refetches_after_ttl_expires() {
        let mut mock = MockParameterStore::new();
        let mut seq = mockall::Sequence::new();
        mock.expect_get_parameter()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Ok("old".to_string()));
        mock.expect_get_parameter()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Ok("new".to_string()));

        let cache = cache_with(mock, Duration::ZERO);
        assert_eq!(cache.get_credential().await.unwrap(), "old");
        assert_eq!(cache.get_credential().await.unwrap(), "new");
    }

    #[tokio::test]
    async fn test_invalidate_forces_refetch() {
        let mut mock = MockParameterStore::new();
        mock.expect_get_parameter()
            .times(2)
            .returning(|_, _| Ok("secret".to_string()));

        let cache = cache_with(mock, DEFAULT_CREDENTIAL_TTL);
        cache.get_credential().await.unwrap();
        cache.invalidate();
        cache.get_credential().await.unwrap();
    }

    #[tokio::test]
    async fn test_fetch_failure_is_not_cached() {
        let mut mock = MockParameterStore::new();
        let mut seq = mockall::Sequence::new();
        mock.expect_get_parameter()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|name, _| Err(ParameterStoreError::NotFound(name.to_string())));
        mock.expect_get_parameter()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Ok("secret".to_string()));

        let cache = cache_with(mock, DEFAULT_CREDENTIAL_TTL);
        assert_eq!(
            cache.get_credential().await,
            Err(CredentialError::Fetch(ParameterStoreError::NotFound(
                PARAM.to_string()
            )))
        );
        assert_eq!(cache.get_credential().await.unwrap(), "secret");
    }

    struct SlowStore {
        calls: AtomicUsize,
        outage: bool,
    }

    #[async_trait]
    impl ParameterStore for SlowStore {
        async fn get_parameter(
            &self,
            _name: &str,
            _with_decryption: bool,
        ) -> Result<String, ParameterStoreError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(50)).await;
            if self.outage {
                Err(ParameterStoreError::Unavailable("timeout".to_string()))
            } else {
                Ok("secret".to_string())
            }
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_misses_collapse_into_one_fetch() {
        let store = Arc::new(SlowStore {
            calls: AtomicUsize::new(0),
            outage: false,
        });
        let cache = Arc::new(CredentialCache::new(store.clone(), PARAM));

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let cache = cache.clone();
                tokio::spawn(async move { cache.get_credential().await })
            })
            .collect();

        for result in futures::future::join_all(handles).await {
            assert_eq!(result.unwrap().unwrap(), "secret");
        }
        assert_eq!(store.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_misses_share_one_failed_fetch() {
        let store = Arc::new(SlowStore {
            calls: AtomicUsize::new(0),
            outage: true,
        });
        let cache = Arc::new(CredentialCache::new(store.clone(), PARAM));

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let cache = cache.clone();
                tokio::spawn(async move { cache.get_credential().await })
            })
            .collect();

        for result in futures::future::join_all(handles).await {
            assert!(matches!(
                result.unwrap(),
                Err(CredentialError::Fetch(ParameterStoreError::Unavailable(_)))
            ));
        }
        assert_eq!(store.calls.load(Ordering::SeqCst), 1);

        // A later caller retries instead of reusing the old failure
        assert!(cache.get_credential().await.is_err());
        assert_eq!(store.calls.load(Ordering::SeqCst), 2);
    }
}

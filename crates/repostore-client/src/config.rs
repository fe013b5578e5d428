//! Client configuration.

use std::time::Duration;

use crate::error::{StoreError, StoreResult};
use crate::queue::QueueConfig;
use crate::rate_limit::RateLimitConfig;
use crate::retry::RetryConfig;

/// Default API root of the remote store.
pub const DEFAULT_API_URL: &str = "https://api.github.com";

/// Default media type requested from the contents API.
pub const DEFAULT_ACCEPT: &str = "application/vnd.github.v3+json";

/// Repository client configuration.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// API root, without trailing slash
    pub api_url: String,
    /// Repository identifier (`owner/name`)
    pub repository: Option<String>,
    /// Branch all reads and writes target
    pub branch: String,
    /// Credential supplied at initialization
    pub token: Option<String>,
    /// Accept header sent with every request
    pub accept: String,
    /// Request timeout
    pub timeout: Duration,
    /// Connect timeout
    pub connect_timeout: Duration,
    /// Lifetime of cached file reads
    pub cache_ttl: Duration,
    /// Retry configuration
    pub retry: RetryConfig,
    /// Throttling thresholds
    pub rate_limit: RateLimitConfig,
    /// Throttled-queue pacing
    pub queue: QueueConfig,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            repository: None,
            branch: "main".to_string(),
            token: None,
            accept: DEFAULT_ACCEPT.to_string(),
            timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(5),
            cache_ttl: Duration::from_secs(5 * 60),
            retry: RetryConfig::default(),
            rate_limit: RateLimitConfig::default(),
            queue: QueueConfig::default(),
        }
    }
}

impl StoreConfig {
    /// Create a configuration for the given repository with defaults elsewhere.
    pub fn new(repository: impl Into<String>) -> Self {
        Self {
            repository: Some(repository.into()),
            ..Self::default()
        }
    }

    /// Create config from environment variables.
    ///
    /// A missing repository is not an error here; it surfaces on the first
    /// operation so a client can still be constructed and reconfigured.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let api_url = std::env::var("REPOSTORE_API_URL")
            .ok()
            .filter(|s| !s.is_empty())
            .map(|s| s.trim_end_matches('/').to_string())
            .unwrap_or(defaults.api_url);

        let repository = std::env::var("REPOSTORE_REPOSITORY")
            .ok()
            .filter(|s| !s.trim().is_empty());

        let branch = std::env::var("REPOSTORE_BRANCH")
            .ok()
            .filter(|s| !s.is_empty())
            .unwrap_or(defaults.branch);

        let token = std::env::var("REPOSTORE_TOKEN")
            .ok()
            .filter(|s| !s.is_empty());

        let timeout_secs: u64 = env_parse("REPOSTORE_TIMEOUT_SECS").unwrap_or(30);
        let connect_timeout_secs: u64 = env_parse("REPOSTORE_CONNECT_TIMEOUT_SECS").unwrap_or(5);
        let cache_ttl_secs: u64 = env_parse("REPOSTORE_CACHE_TTL_SECS").unwrap_or(5 * 60);

        Self {
            api_url,
            repository,
            branch,
            token,
            accept: defaults.accept,
            timeout: Duration::from_secs(timeout_secs),
            connect_timeout: Duration::from_secs(connect_timeout_secs),
            cache_ttl: Duration::from_secs(cache_ttl_secs),
            retry: RetryConfig::from_env(),
            rate_limit: RateLimitConfig::from_env(),
            queue: defaults.queue,
        }
    }

    /// Repository identifier, or a configuration error when none is set.
    pub fn require_repository(&self) -> StoreResult<&str> {
        match self.repository.as_deref() {
            Some(repo) if !repo.trim().is_empty() => Ok(repo),
            _ => Err(StoreError::config(
                "No repository configured. Set REPOSTORE_REPOSITORY to owner/name.",
            )),
        }
    }
}

pub(crate) fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|s| s.parse().ok())
}

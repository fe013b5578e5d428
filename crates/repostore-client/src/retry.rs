//! Retry executor with exponential backoff.
//!
//! Wraps a single HTTP exchange:
//! - Network failures back off exponentially
//! - 403 with an exhausted quota waits out the reset window when it is close
//! - 5xx responses back off exponentially
//! - 401 publishes an auth failure and returns immediately
//!
//! Every response, whatever its status, is fed to the rate limit tracker
//! before it is classified.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use tracing::{info_span, warn, Instrument};

use repostore_models::StoreEvent;

use crate::config::env_parse;
use crate::error::StoreResult;
use crate::events::EventSink;
use crate::metrics::{record_request, record_retry};
use crate::rate_limit::RateLimitTracker;
use crate::transport::{HttpTransport, StoreRequest, StoreResponse};

/// Reset windows closer than this are waited out instead of backed off.
const RESET_WAIT_LIMIT: Duration = Duration::from_secs(60);

/// Slack added on top of the reset wait.
const RESET_SLACK: Duration = Duration::from_millis(1000);

// =============================================================================
// Configuration
// =============================================================================

/// Retry policy configuration.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of retry attempts.
    pub max_retries: u32,
    /// Base delay for exponential backoff (in milliseconds).
    pub base_delay_ms: u64,
    /// Cap for rate-limit backoff (in milliseconds).
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay_ms: 1000,
            max_delay_ms: 60_000,
        }
    }
}

impl RetryConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            max_retries: defaults.max_retries,
            base_delay_ms: env_parse("REPOSTORE_RETRY_BASE_MS").unwrap_or(defaults.base_delay_ms),
            max_delay_ms: env_parse("REPOSTORE_RETRY_MAX_MS").unwrap_or(defaults.max_delay_ms),
        }
    }

    /// `base * 2^attempt`, saturating.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 2u64.saturating_pow(attempt);
        Duration::from_millis(self.base_delay_ms.saturating_mul(factor))
    }

    /// Exponential backoff capped at `max_delay_ms`.
    pub fn capped_backoff(&self, attempt: u32) -> Duration {
        self.backoff(attempt)
            .min(Duration::from_millis(self.max_delay_ms))
    }
}

// =============================================================================
// Executor
// =============================================================================

/// Executes requests with policy-driven retry.
pub struct RetryExecutor {
    transport: Arc<dyn HttpTransport>,
    tracker: Arc<RateLimitTracker>,
    sink: Arc<dyn EventSink>,
    config: RetryConfig,
}

impl RetryExecutor {
    pub fn new(
        transport: Arc<dyn HttpTransport>,
        tracker: Arc<RateLimitTracker>,
        sink: Arc<dyn EventSink>,
        config: RetryConfig,
    ) -> Self {
        Self {
            transport,
            tracker,
            sink,
            config,
        }
    }

    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    /// Perform the request, retrying transient failures.
    ///
    /// Exhausting retries surfaces the last response or error unchanged; the
    /// caller inspects the status to decide success.
    pub async fn execute(&self, request: &StoreRequest) -> StoreResult<StoreResponse> {
        let mut attempt: u32 = 0;

        loop {
            let span = info_span!(
                "repostore_attempt",
                method = %request.method,
                url = %request.url,
                attempt = attempt + 1
            );

            let start = Instant::now();
            let result = self.transport.send(request).instrument(span).await;
            let latency_ms = start.elapsed().as_millis() as f64;

            let response = match result {
                Ok(response) => response,
                Err(e) if e.is_retryable() && attempt < self.config.max_retries => {
                    let delay = self.config.backoff(attempt);
                    self.before_retry(request, attempt, delay, "network", &e.to_string());
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                    continue;
                }
                Err(e) => return Err(e),
            };

            record_request(request.method.as_str(), response.status, latency_ms);
            self.tracker.observe(&response).await;

            if let Some((delay, reason)) = self.retry_delay(&response, attempt).await {
                let detail = format!("HTTP {}", response.status);
                self.before_retry(request, attempt, delay, reason, &detail);
                tokio::time::sleep(delay).await;
                attempt += 1;
                continue;
            }

            if response.status == 401 {
                warn!(url = %request.url, "Remote rejected credential");
                self.sink.publish(StoreEvent::AuthFailed {
                    url: request.url.clone(),
                    status: response.status,
                });
            }

            return Ok(response);
        }
    }

    /// Delay before the next attempt, or `None` when the response is final.
    async fn retry_delay(
        &self,
        response: &StoreResponse,
        attempt: u32,
    ) -> Option<(Duration, &'static str)> {
        if attempt >= self.config.max_retries {
            return None;
        }

        match response.status {
            403 => {
                let quota = self.tracker.snapshot().await;
                if quota.remaining != Some(0) {
                    return None;
                }
                let delay = match quota.until_reset(Utc::now()) {
                    Some(wait) if wait < RESET_WAIT_LIMIT => wait + RESET_SLACK,
                    _ => self.config.capped_backoff(attempt),
                };
                Some((delay, "rate_limit"))
            }
            500..=599 => Some((self.config.backoff(attempt), "server_error")),
            _ => None,
        }
    }

    fn before_retry(
        &self,
        request: &StoreRequest,
        attempt: u32,
        delay: Duration,
        reason: &'static str,
        detail: &str,
    ) {
        warn!(
            url = %request.url,
            attempt = attempt + 1,
            delay_ms = delay.as_millis() as u64,
            reason,
            "Request failed, retrying: {}",
            detail
        );

        record_retry(reason);

        self.sink.publish(StoreEvent::Retrying {
            url: request.url.clone(),
            attempt: attempt + 1,
            delay_ms: delay.as_millis() as u64,
            reason: reason.to_string(),
        });
    }
}

// =============================================================================
// Tests
// =============================================================================

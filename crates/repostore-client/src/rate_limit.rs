//! Rate limit tracking.
//!
//! Keeps the remote's quota state as last observed in response headers and
//! derives the throttling flag from it. Two states, Normal and Throttling,
//! with threshold-crossing edges in both directions. The tracker owns no
//! timers; the queue drain asks it to clear an expired window.

use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use repostore_models::{QuotaSeverity, StoreEvent};

use crate::config::env_parse;
use crate::events::EventSink;
use crate::transport::StoreResponse;

/// Remaining-quota header.
pub const HEADER_REMAINING: &str = "x-ratelimit-remaining";
/// Window reset header (epoch seconds).
pub const HEADER_RESET: &str = "x-ratelimit-reset";
/// Total-quota header.
pub const HEADER_LIMIT: &str = "x-ratelimit-limit";

// =============================================================================
// Configuration
// =============================================================================

/// Throttling thresholds.
#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    /// Throttling starts when remaining drops below this.
    pub threshold: u64,
    /// Below this the notification is critical instead of low.
    pub critical_threshold: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            threshold: 20,
            critical_threshold: 5,
        }
    }
}

impl RateLimitConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            threshold: env_parse("REPOSTORE_RATE_LIMIT_THRESHOLD").unwrap_or(defaults.threshold),
            critical_threshold: defaults.critical_threshold,
        }
    }
}

// =============================================================================
// Quota State
// =============================================================================

/// Quota as last observed from the remote.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QuotaState {
    pub remaining: Option<u64>,
    pub reset_at: Option<DateTime<Utc>>,
    pub total: Option<u64>,
    pub throttling: bool,
}

impl QuotaState {
    /// Time left until the window resets, zero if it already has.
    pub fn until_reset(&self, now: DateTime<Utc>) -> Option<std::time::Duration> {
        self.reset_at
            .map(|reset| (reset - now).to_std().unwrap_or_default())
    }
}

struct TrackerState {
    quota: QuotaState,
    severity: QuotaSeverity,
}

// =============================================================================
// Tracker
// =============================================================================

/// Shared quota tracker.
pub struct RateLimitTracker {
    config: RateLimitConfig,
    state: RwLock<TrackerState>,
    sink: Arc<dyn EventSink>,
}

impl RateLimitTracker {
    pub fn new(config: RateLimitConfig, sink: Arc<dyn EventSink>) -> Self {
        Self {
            config,
            state: RwLock::new(TrackerState {
                quota: QuotaState::default(),
                severity: QuotaSeverity::Normal,
            }),
            sink,
        }
    }

    /// Update quota from response headers and evaluate threshold crossings.
    ///
    /// Absent or unparsable headers leave the known values untouched. Returns
    /// the severity that was published, if any.
    pub async fn observe(&self, response: &StoreResponse) -> Option<QuotaSeverity> {
        let remaining = response
            .header(HEADER_REMAINING)
            .and_then(|v| v.trim().parse::<u64>().ok());
        let reset_at = response
            .header(HEADER_RESET)
            .and_then(|v| v.trim().parse::<i64>().ok())
            .and_then(|secs| Utc.timestamp_opt(secs, 0).single());
        let total = response
            .header(HEADER_LIMIT)
            .and_then(|v| v.trim().parse::<u64>().ok());

        let event = {
            let mut state = self.state.write().await;
            if remaining.is_some() {
                state.quota.remaining = remaining;
            }
            if reset_at.is_some() {
                state.quota.reset_at = reset_at;
            }
            if total.is_some() {
                state.quota.total = total;
            }
            self.evaluate(&mut state)
        };

        let severity = event.as_ref().and_then(|e| match e {
            StoreEvent::RateLimit { severity, .. } => Some(*severity),
            _ => None,
        });
        if let Some(event) = event {
            self.sink.publish(event);
        }
        severity
    }

    fn evaluate(&self, state: &mut TrackerState) -> Option<StoreEvent> {
        let remaining = state.quota.remaining?;

        let next = if remaining < self.config.threshold {
            state.quota.throttling = true;
            if remaining < self.config.critical_threshold {
                QuotaSeverity::Critical
            } else {
                QuotaSeverity::Low
            }
        } else if state.quota.throttling && remaining > self.config.threshold {
            state.quota.throttling = false;
            QuotaSeverity::Normal
        } else {
            return None;
        };

        if next == state.severity {
            return None;
        }
        state.severity = next;

        match next {
            QuotaSeverity::Critical => warn!(remaining, "Rate limit critical, throttling requests"),
            QuotaSeverity::Low => warn!(remaining, "Rate limit low, throttling requests"),
            QuotaSeverity::Normal => info!(remaining, "Rate limit recovered"),
        }

        Some(StoreEvent::RateLimit {
            severity: next,
            remaining,
            total: state.quota.total,
            reset_at: state.quota.reset_at,
        })
    }

    pub async fn is_throttling(&self) -> bool {
        self.state.read().await.quota.throttling
    }

    /// Copy of the current quota state.
    pub async fn snapshot(&self) -> QuotaState {
        self.state.read().await.quota.clone()
    }

    /// Clear throttling if the tracked reset time has passed.
    ///
    /// Returns true when the flag was cleared by this call.
    pub async fn clear_if_reset_passed(&self, now: DateTime<Utc>) -> bool {
        let mut state = self.state.write().await;
        match state.quota.reset_at {
            Some(reset) if state.quota.throttling && reset <= now => {
                state.quota.throttling = false;
                state.severity = QuotaSeverity::Normal;
                debug!(reset_at = %reset, "Rate limit window reset, throttling cleared");
                true
            }
            _ => false,
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

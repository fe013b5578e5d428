//! Repository store metrics collection.
//!
//! Provides standardized metrics for monitoring remote store operations:
//! - Request counters by operation and status
//! - Latency histograms
//! - Retry counters
//! - Cache lookups and queue depth

use metrics::{counter, gauge, histogram};

// =============================================================================
// Metric Names
// =============================================================================

/// Metric name constants for consistency.
pub mod names {
    /// Total HTTP exchanges by method and status.
    pub const REQUESTS_TOTAL: &str = "repostore_requests_total";

    /// Total retry attempts by reason.
    pub const RETRIES_TOTAL: &str = "repostore_retries_total";

    /// Request latency in seconds by method.
    pub const LATENCY_SECONDS: &str = "repostore_latency_seconds";

    /// Cache lookups by outcome (hit/miss).
    pub const CACHE_LOOKUPS_TOTAL: &str = "repostore_cache_lookups_total";

    /// Requests parked while throttling.
    pub const QUEUE_DEPTH: &str = "repostore_queue_depth";
}

// =============================================================================
// Recording Functions
// =============================================================================

/// Record metrics for a completed HTTP exchange.
pub fn record_request(method: &str, status: u16, latency_ms: f64) {
    let status_str = status.to_string();

    counter!(
        names::REQUESTS_TOTAL,
        "method" => method.to_string(),
        "status" => status_str
    )
    .increment(1);

    histogram!(
        names::LATENCY_SECONDS,
        "method" => method.to_string()
    )
    .record(latency_ms / 1000.0);
}

/// Record a retry attempt.
pub fn record_retry(reason: &str) {
    counter!(
        names::RETRIES_TOTAL,
        "reason" => reason.to_string()
    )
    .increment(1);
}

/// Record a cache lookup.
pub fn record_cache_lookup(hit: bool) {
    counter!(
        names::CACHE_LOOKUPS_TOTAL,
        "outcome" => if hit { "hit" } else { "miss" }
    )
    .increment(1);
}

/// Record the current number of parked requests.
pub fn record_queue_depth(depth: usize) {
    gauge!(names::QUEUE_DEPTH).set(depth as f64);
}

// =============================================================================
// Tests
// =============================================================================

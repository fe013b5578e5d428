//! Pending request queue.
//!
//! While the rate limit tracker reports throttling, submitted requests are
//! parked here instead of hitting the remote. A drain task, started when the
//! first request is parked and stopped once the queue is empty, paces them:
//!
//! - reset window passed: throttling is cleared first
//! - not throttling: every parked request is dispatched at once, in order
//! - still throttling: only the oldest request, and only after it has waited
//!   the patience window; then the next pass is a full drain interval away
//!
//! Ordering is FIFO throughout.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures_util::future::join_all;
use tokio::sync::{oneshot, Mutex};
use tokio::time::Instant;
use tracing::{debug, info};

use crate::error::{StoreError, StoreResult};
use crate::metrics::record_queue_depth;
use crate::rate_limit::RateLimitTracker;
use crate::retry::RetryExecutor;
use crate::transport::{StoreRequest, StoreResponse};

// =============================================================================
// Configuration
// =============================================================================

/// Drain pacing.
#[derive(Debug, Clone)]
pub struct QueueConfig {
    /// Wait between passes after a dispatch.
    pub drain_interval: Duration,
    /// How long the oldest request must wait before a throttled dispatch.
    pub patience: Duration,
    /// Wait between passes when nothing was dispatched.
    pub recheck_interval: Duration,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            drain_interval: Duration::from_secs(10),
            patience: Duration::from_secs(10),
            recheck_interval: Duration::from_secs(1),
        }
    }
}

// =============================================================================
// Queue
// =============================================================================

struct PendingRequest {
    request: StoreRequest,
    enqueued_at: Instant,
    responder: oneshot::Sender<StoreResult<StoreResponse>>,
}

#[derive(Default)]
struct QueueState {
    pending: VecDeque<PendingRequest>,
    draining: bool,
}

/// Throttle-aware front door to the retry executor.
pub struct RequestQueue {
    executor: Arc<RetryExecutor>,
    tracker: Arc<RateLimitTracker>,
    config: QueueConfig,
    state: Mutex<QueueState>,
}

impl RequestQueue {
    pub fn new(
        executor: Arc<RetryExecutor>,
        tracker: Arc<RateLimitTracker>,
        config: QueueConfig,
    ) -> Self {
        Self {
            executor,
            tracker,
            config,
            state: Mutex::new(QueueState::default()),
        }
    }

    /// Execute a request now, or park it until the drain task releases it.
    pub async fn submit(self: &Arc<Self>, request: StoreRequest) -> StoreResult<StoreResponse> {
        if !self.tracker.is_throttling().await {
            return self.executor.execute(&request).await;
        }

        let handle = self.enqueue(request).await;
        handle
            .await
            .map_err(|_| StoreError::Queue("request dropped before dispatch".to_string()))?
    }

    /// Number of parked requests.
    pub async fn len(&self) -> usize {
        self.state.lock().await.pending.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    async fn enqueue(
        self: &Arc<Self>,
        request: StoreRequest,
    ) -> oneshot::Receiver<StoreResult<StoreResponse>> {
        let (responder, handle) = oneshot::channel();

        let start_drain = {
            let mut state = self.state.lock().await;
            debug!(
                url = %request.url,
                depth = state.pending.len() + 1,
                "Throttling, request queued"
            );
            state.pending.push_back(PendingRequest {
                request,
                enqueued_at: Instant::now(),
                responder,
            });
            record_queue_depth(state.pending.len());
            !std::mem::replace(&mut state.draining, true)
        };

        if start_drain {
            let queue = Arc::clone(self);
            tokio::spawn(async move { queue.run_drain().await });
        }

        handle
    }

    async fn run_drain(self: Arc<Self>) {
        while let Some(wait) = self.drain_once().await {
            tokio::time::sleep(wait).await;
        }
    }

    /// One drain pass.
    ///
    /// Returns the wait before the next pass, or `None` once the queue is
    /// empty and the drain task should stop.
    async fn drain_once(&self) -> Option<Duration> {
        self.tracker.clear_if_reset_passed(Utc::now()).await;

        if !self.tracker.is_throttling().await {
            let batch: Vec<PendingRequest> = {
                let mut state = self.state.lock().await;
                state.pending.drain(..).collect()
            };
            if !batch.is_empty() {
                info!(count = batch.len(), "Throttling cleared, dispatching queued requests");
                join_all(batch.into_iter().map(|pending| self.dispatch(pending))).await;
            }
            return self.next_pass(self.config.drain_interval).await;
        }

        let oldest = {
            let mut state = self.state.lock().await;
            let ready = state
                .pending
                .front()
                .map(|front| front.enqueued_at.elapsed() >= self.config.patience);
            match ready {
                None => {
                    state.draining = false;
                    return None;
                }
                Some(true) => state.pending.pop_front(),
                Some(false) => None,
            }
        };

        match oldest {
            Some(pending) => {
                debug!(
                    url = %pending.request.url,
                    "Dispatching oldest queued request while throttled"
                );
                let executor = Arc::clone(&self.executor);
                tokio::spawn(async move {
                    let result = executor.execute(&pending.request).await;
                    let _ = pending.responder.send(result);
                });
                self.next_pass(self.config.drain_interval).await
            }
            None => Some(self.config.recheck_interval),
        }
    }

    async fn dispatch(&self, pending: PendingRequest) {
        let result = self.executor.execute(&pending.request).await;
        // Caller may have gone away.
        let _ = pending.responder.send(result);
    }

    /// Schedule another pass if anything is parked, otherwise stop draining.
    async fn next_pass(&self, wait: Duration) -> Option<Duration> {
        let mut state = self.state.lock().await;
        record_queue_depth(state.pending.len());
        if state.pending.is_empty() {
            state.draining = false;
            None
        } else {
            Some(wait)
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

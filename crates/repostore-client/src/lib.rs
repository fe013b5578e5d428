//! Rate-limit aware client for a Git-hosted contents API.
//!
//! This crate provides:
//! - File-level operations (fetch, save, delete, history, revisions, diff)
//! - Quota tracking from rate limit headers with throttling notifications
//! - Retry with exponential backoff and reset-aware waits
//! - A pending queue that paces requests while throttled
//! - A TTL cache for file reads
//! - Pluggable transport, notification sink and credential store

pub mod cache;
pub mod client;
pub mod codec;
pub mod config;
pub mod credentials;
pub mod error;
pub mod events;
pub mod metrics;
pub mod queue;
pub mod rate_limit;
pub mod retry;
pub mod transport;

#[cfg(test)]
mod client_tests;
#[cfg(test)]
mod test_support;

pub use cache::FileCache;
pub use client::{FetchOptions, RepoClient, RepoClientBuilder, SaveOptions};
pub use config::StoreConfig;
pub use credentials::{CredentialStore, FileCredentialStore, MemoryCredentialStore, CREDENTIAL_KEY};
pub use error::{StoreError, StoreResult};
pub use events::{BroadcastSink, EventSink, RecordingSink, TracingSink};
pub use queue::{QueueConfig, RequestQueue};
pub use rate_limit::{QuotaState, RateLimitConfig, RateLimitTracker};
pub use retry::{RetryConfig, RetryExecutor};
pub use transport::{HttpTransport, ReqwestTransport, StoreRequest, StoreResponse};

pub use repostore_models::{
    ChangeKind, CommitResult, DeleteResult, FileChange, FileContent, FileDiff, HistoryEntry,
    QuotaSeverity, StoreEvent,
};

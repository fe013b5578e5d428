//! Notification events published by the repository client.
//!
//! Each event has a stable topic string and a serializable payload that
//! carries enough context (path, status, error) for a subscriber to render or
//! log it without re-deriving anything.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Severity of the remaining rate-limit quota.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum QuotaSeverity {
    Normal,
    Low,
    Critical,
}

impl QuotaSeverity {
    pub fn as_str(&self) -> &'static str {
        match self {
            QuotaSeverity::Normal => "normal",
            QuotaSeverity::Low => "low",
            QuotaSeverity::Critical => "critical",
        }
    }
}

/// Event envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StoreEvent {
    /// Remaining quota crossed a severity boundary
    RateLimit {
        severity: QuotaSeverity,
        remaining: u64,
        #[serde(skip_serializing_if = "Option::is_none")]
        total: Option<u64>,
        #[serde(rename = "resetAt", skip_serializing_if = "Option::is_none")]
        reset_at: Option<DateTime<Utc>>,
    },

    /// A request is being retried after a delay
    Retrying {
        url: String,
        /// Retry number (1-based)
        attempt: u32,
        #[serde(rename = "delayMs")]
        delay_ms: u64,
        reason: String,
    },

    /// The remote rejected the credential
    AuthFailed {
        url: String,
        status: u16,
    },

    /// A client operation failed
    OperationFailed {
        operation: String,
        path: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        status: Option<u16>,
        error: String,
    },

    /// A write or delete was attempted without a credential
    Unauthorized {
        operation: String,
        path: String,
    },

    /// A file was written
    FileSaved {
        path: String,
        #[serde(rename = "commitSha")]
        commit_sha: String,
        #[serde(rename = "isUpdate")]
        is_update: bool,
    },

    /// A file was deleted
    FileDeleted {
        path: String,
        #[serde(rename = "commitSha")]
        commit_sha: String,
    },

    /// A file could not be read or decoded
    FileReadError {
        path: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        status: Option<u16>,
        error: String,
    },
}

impl StoreEvent {
    /// Topic the event is published under.
    pub fn topic(&self) -> &'static str {
        match self {
            StoreEvent::RateLimit { severity, .. } => match severity {
                QuotaSeverity::Critical => "rate_limit.critical",
                QuotaSeverity::Low => "rate_limit.low",
                QuotaSeverity::Normal => "rate_limit.normal",
            },
            StoreEvent::Retrying { .. } => "request.retrying",
            StoreEvent::AuthFailed { .. } => "auth.failed",
            StoreEvent::OperationFailed { .. } => "operation.failed",
            StoreEvent::Unauthorized { .. } => "operation.unauthorized",
            StoreEvent::FileSaved { .. } => "file.saved",
            StoreEvent::FileDeleted { .. } => "file.deleted",
            StoreEvent::FileReadError { .. } => "file.read_error",
        }
    }
}

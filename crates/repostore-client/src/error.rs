//! Repository store error types.

use thiserror::Error;

/// Result type for repository store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur during repository store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Authentication failed ({status}): {message}")]
    AuthFailed { status: u16, message: String },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Write conflict ({status}): {message}")]
    Conflict { status: u16, message: String },

    #[error("Rate limit exhausted: {0}")]
    RateLimited(String),

    #[error("Server error ({0}): {1}")]
    ServerError(u16, String),

    #[error("Request failed ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Codec error: {0}")]
    Codec(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Request queue closed: {0}")]
    Queue(String),
}

impl From<reqwest::Error> for StoreError {
    fn from(err: reqwest::Error) -> Self {
        Self::Network(err.to_string())
    }
}

impl StoreError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn unauthorized(msg: impl Into<String>) -> Self {
        Self::Unauthorized(msg.into())
    }

    pub fn not_found(path: impl Into<String>) -> Self {
        Self::NotFound(path.into())
    }

    pub fn codec(msg: impl Into<String>) -> Self {
        Self::Codec(msg.into())
    }

    /// Map a non-success HTTP status and its parsed server message to an error.
    pub fn from_http_status(status: u16, message: impl Into<String>) -> Self {
        let message = message.into();
        match status {
            401 => Self::AuthFailed { status, message },
            404 => Self::NotFound(message),
            409 | 422 => Self::Conflict { status, message },
            403 if message.to_lowercase().contains("rate limit") => Self::RateLimited(message),
            500..=599 => Self::ServerError(status, message),
            _ => Self::Api { status, message },
        }
    }

    /// HTTP status that produced this error, if any.
    pub fn http_status(&self) -> Option<u16> {
        match self {
            StoreError::AuthFailed { status, .. }
            | StoreError::Conflict { status, .. }
            | StoreError::Api { status, .. } => Some(*status),
            StoreError::ServerError(status, _) => Some(*status),
            StoreError::NotFound(_) => Some(404),
            StoreError::RateLimited(_) => Some(403),
            _ => None,
        }
    }

    /// Check if error is retryable at the transport level.
    pub fn is_retryable(&self) -> bool {
        matches!(self, StoreError::Network(_))
    }

    /// True if the remote rejected a write because the digest was stale.
    pub fn is_conflict(&self) -> bool {
        matches!(self, StoreError::Conflict { .. })
    }
}

/// Extract the human-readable message from an error response body.
///
/// Falls back to the raw body when it is not a JSON object with a `message`.
pub fn parse_error_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| v.get("message").and_then(|m| m.as_str()).map(str::to_string))
        .unwrap_or_else(|| body.trim().to_string())
}

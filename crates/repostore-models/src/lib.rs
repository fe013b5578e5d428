//! Shared data models for the repostore client.
//!
//! This crate provides Serde-serializable types for:
//! - Decoded file content (structured JSON or verbatim text)
//! - Contents API wire envelopes and write results
//! - Normalized commit history
//! - Two-revision diff results
//! - Notification events published by the client

pub mod content;
pub mod diff;
pub mod envelope;
pub mod event;
pub mod history;

// Re-export common types
pub use content::FileContent;
pub use diff::{ChangeKind, FileChange, FileDiff};
pub use envelope::{
    CommitResult, ContentsWriteResponse, DeleteContentsRequest, DeleteResult, FileEnvelope,
    PutContentsRequest,
};
pub use event::{QuotaSeverity, StoreEvent};
pub use history::{CommitAuthor, HistoryEntry, RemoteCommit};

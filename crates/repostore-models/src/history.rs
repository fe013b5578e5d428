//! Commit history types.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Commit as returned by `GET /repos/{repo}/commits`.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct RemoteCommit {
    pub sha: String,
    pub commit: RemoteCommitDetail,
    #[serde(default)]
    pub html_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct RemoteCommitDetail {
    #[serde(default)]
    pub message: String,
    pub author: Option<CommitAuthor>,
}

/// Commit author signature.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct CommitAuthor {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    pub date: Option<DateTime<Utc>>,
}

/// Normalized history entry for a single file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct HistoryEntry {
    pub sha: String,
    pub message: String,
    pub author: CommitAuthor,
    pub url: String,
}

impl From<RemoteCommit> for HistoryEntry {
    fn from(remote: RemoteCommit) -> Self {
        Self {
            sha: remote.sha,
            message: remote.commit.message,
            author: remote.commit.author.unwrap_or(CommitAuthor {
                name: String::new(),
                email: String::new(),
                date: None,
            }),
            url: remote.html_url,
        }
    }
}

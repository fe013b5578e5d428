//! Contents API wire types.
//!
//! These mirror the request and response bodies of the remote contents
//! endpoint.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// File envelope returned by `GET /repos/{repo}/contents/{path}`.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct FileEnvelope {
    /// Base64 body (may contain line breaks)
    #[serde(default)]
    pub content: Option<String>,
    /// Content digest, required for overwrite and delete
    pub sha: String,
    /// Path within the repository
    #[serde(default)]
    pub path: String,
    /// Transport encoding reported by the remote (usually "base64")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub encoding: Option<String>,
}

/// Body of `PUT /repos/{repo}/contents/{path}`.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct PutContentsRequest {
    pub message: String,
    pub content: String,
    pub branch: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sha: Option<String>,
}

/// Body of `DELETE /repos/{repo}/contents/{path}`.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct DeleteContentsRequest {
    pub message: String,
    pub sha: String,
    pub branch: String,
}

/// Response of a contents write or delete.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ContentsWriteResponse {
    /// Written file (null after a delete)
    #[serde(default)]
    pub content: Option<WrittenContent>,
    pub commit: WriteCommit,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct WrittenContent {
    pub sha: String,
    #[serde(default)]
    pub path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct WriteCommit {
    pub sha: String,
}

/// Result of a successful save.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct CommitResult {
    /// Digest of the commit that recorded the write
    pub commit_sha: String,
    pub path: String,
    /// True when an existing file was overwritten
    pub is_update: bool,
}

/// Result of a delete request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct DeleteResult {
    /// False when the file did not exist and nothing was deleted
    pub deleted: bool,
    pub path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub commit_sha: Option<String>,
}

impl DeleteResult {
    /// Result for a path that was already absent.
    pub fn not_found(path: impl Into<String>) -> Self {
        Self {
            deleted: false,
            path: path.into(),
            commit_sha: None,
        }
    }
}

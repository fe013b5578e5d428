//! Coarse two-revision diff results.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::content::FileContent;

/// Kind of change between two revisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    Added,
    Deleted,
    Modified,
}

/// One change entry. Carries whole values, not line-level hunks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct FileChange {
    pub kind: ChangeKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub before: Option<FileContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub after: Option<FileContent>,
}

/// Comparison of one file at two revisions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct FileDiff {
    pub path: String,
    pub revision_a: String,
    pub revision_b: String,
    pub has_changed: bool,
    pub changes: Vec<FileChange>,
}

impl FileDiff {
    /// Classify the file at both revisions.
    ///
    /// Returns `None` when the file is absent at both revisions.
    pub fn between(
        path: impl Into<String>,
        revision_a: impl Into<String>,
        revision_b: impl Into<String>,
        before: Option<FileContent>,
        after: Option<FileContent>,
    ) -> Option<Self> {
        let changes = match (before, after) {
            (None, None) => return None,
            (None, Some(after)) => vec![FileChange {
                kind: ChangeKind::Added,
                before: None,
                after: Some(after),
            }],
            (Some(before), None) => vec![FileChange {
                kind: ChangeKind::Deleted,
                before: Some(before),
                after: None,
            }],
            (Some(before), Some(after)) if before == after => Vec::new(),
            (Some(before), Some(after)) => vec![FileChange {
                kind: ChangeKind::Modified,
                before: Some(before),
                after: Some(after),
            }],
        };

        Some(Self {
            path: path.into(),
            revision_a: revision_a.into(),
            revision_b: revision_b.into(),
            has_changed: !changes.is_empty(),
            changes,
        })
    }
}

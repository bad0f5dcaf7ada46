//! Domain model types for branch listings, commit history, and trial-merge
//! outcomes.
//!
//! All of these are plain value objects built fresh from parsed `git` output;
//! nothing here is persisted or mutated after construction.

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};

use crate::errors::ConflictError;

// ---------------------------------------------------------------------------
// Branch
// ---------------------------------------------------------------------------

/// A remote-tracking branch with the author and date of its latest commit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Branch {
    pub repository_name: String,
    /// Branch name with any `origin/` remote prefix stripped.
    pub name: String,
    pub last_modified_date: DateTime<FixedOffset>,
    pub author_name: String,
    pub author_email: String,
}

impl Branch {
    pub fn new(
        repository_name: impl Into<String>,
        name: impl Into<String>,
        last_modified_date: DateTime<FixedOffset>,
        author_name: impl Into<String>,
        author_email: impl Into<String>,
    ) -> Self {
        Self {
            repository_name: repository_name.into(),
            name: name.into(),
            last_modified_date,
            author_name: author_name.into(),
            author_email: author_email.into(),
        }
    }

    /// Strip a leading `refs/heads/` from a fully qualified ref name.
    pub fn name_from_ref(ref_name: &str) -> &str {
        ref_name.strip_prefix("refs/heads/").unwrap_or(ref_name)
    }
}

impl std::fmt::Display for Branch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name)
    }
}

// ---------------------------------------------------------------------------
// Commit
// ---------------------------------------------------------------------------

/// A single commit from a log query.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Commit {
    pub sha: String,
    /// Subject line of the commit message.
    pub message: String,
    pub commit_date: DateTime<FixedOffset>,
    pub author_name: String,
    pub author_email: String,
    /// Set by the client that produced the commit; `None` straight out of
    /// the parser.
    pub repository_name: Option<String>,
}

impl Commit {
    pub fn new(
        sha: impl Into<String>,
        message: impl Into<String>,
        commit_date: DateTime<FixedOffset>,
        author_name: impl Into<String>,
        author_email: impl Into<String>,
    ) -> Self {
        Self {
            sha: sha.into(),
            message: message.into(),
            commit_date,
            author_name: author_name.into(),
            author_email: author_email.into(),
            repository_name: None,
        }
    }
}

/// Two commits are the same entity when their identifiers match, regardless
/// of how the surrounding metadata was obtained. This keeps comparisons
/// stable across re-fetches.
impl PartialEq for Commit {
    fn eq(&self, other: &Self) -> bool {
        self.sha == other.sha
    }
}

impl Eq for Commit {}

impl std::hash::Hash for Commit {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.sha.hash(state);
    }
}

impl std::fmt::Display for Commit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.sha)
    }
}

// ---------------------------------------------------------------------------
// Conflict
// ---------------------------------------------------------------------------

/// The file-level result of a trial merge that could not complete.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conflict {
    pub repository_name: String,
    pub branch_a: String,
    pub branch_b: String,
    /// Conflicting file paths in the order the merge reported them.
    pub conflicting_files: Vec<String>,
}

impl Conflict {
    /// Build a conflict result. Fails when `conflicting_files` is empty: a
    /// conflict with no files is a misclassified failure, not a detection
    /// result.
    pub fn new(
        repository_name: impl Into<String>,
        branch_a: impl Into<String>,
        branch_b: impl Into<String>,
        conflicting_files: Vec<String>,
    ) -> Result<Self, ConflictError> {
        let branch_a = branch_a.into();
        let branch_b = branch_b.into();
        if conflicting_files.is_empty() {
            return Err(ConflictError::EmptyFileList { branch_a, branch_b });
        }

        Ok(Self {
            repository_name: repository_name.into(),
            branch_a,
            branch_b,
            conflicting_files,
        })
    }

    /// Whether the given branch is one of this conflict's two sides.
    pub fn contains_branch(&self, branch_name: &str) -> bool {
        self.branch_a == branch_name || self.branch_b == branch_name
    }
}

// ---------------------------------------------------------------------------
// Merge outcome
// ---------------------------------------------------------------------------

/// Classified result of a trial merge.
///
/// Failures that are not conflicts (missing refs, network, authentication)
/// are not represented here; they surface as the `Err` arm of the operation
/// that returns this.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MergeOutcome {
    /// The merge completed and produced new history on the target.
    Clean,
    /// The target already contained the source; nothing changed.
    NoOp,
    /// The merge stopped on conflicting files.
    Conflicted(Conflict),
}

impl MergeOutcome {
    /// True only when new history was actually merged.
    pub fn merged(&self) -> bool {
        matches!(self, Self::Clean)
    }

    /// The conflict, when the merge stopped on one.
    pub fn conflict(&self) -> Option<&Conflict> {
        match self {
            Self::Conflicted(conflict) => Some(conflict),
            _ => None,
        }
    }
}

impl std::fmt::Display for MergeOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Clean => write!(f, "clean"),
            Self::NoOp => write!(f, "no_op"),
            Self::Conflicted(_) => write!(f, "conflicted"),
        }
    }
}

// ---------------------------------------------------------------------------
// Merge options
// ---------------------------------------------------------------------------

/// Options for a trial merge.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MergeOptions {
    /// Merge this tag instead of the remote-tracking form of the source
    /// branch. Ignored when empty.
    pub source_tag: Option<String>,

    /// Leave the merge result in the working directory instead of resetting
    /// it away. Conflict-detection callers pass `false`.
    pub keep_changes: bool,

    /// Custom message for the merge commit.
    pub commit_message: Option<String>,
}

impl Default for MergeOptions {
    fn default() -> Self {
        Self {
            source_tag: None,
            keep_changes: true,
            commit_message: None,
        }
    }
}

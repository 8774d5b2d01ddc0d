//! Git data provider interface.
//!
//! The history reconstructor never talks to git itself. It asks a
//! [`GitProvider`] three questions: what changed between two commits, what a
//! file looked like at a commit, and where the current branch forked off.
//!
//! Implementations:
//!
//! - [`memory::MemoryProvider`] - an in-memory commit graph, loadable from a
//!   JSON snapshot
//! - [`git::GitCliProvider`] - shells out to the local `git` binary

pub mod git;
pub mod memory;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use git::GitCliProvider;
pub use memory::MemoryProvider;

/// Errors from provider queries.
#[derive(Error, Debug)]
pub enum ProviderError {
    /// The file does not exist at the requested ref.
    #[error("{path} not found at {reference}")]
    NotFound {
        /// Requested file path.
        path: String,
        /// Requested ref.
        reference: String,
    },

    /// A commit or ref could not be resolved.
    #[error("unknown commit {0}")]
    UnknownCommit(String),

    /// The provider could not serve the request.
    #[error("{operation} failed: {message}")]
    Unavailable {
        /// Which query failed.
        operation: String,
        /// Error details.
        message: String,
    },

    /// Failed to execute an external program.
    #[error("failed to run git: {0}")]
    Exec(#[from] std::io::Error),

    /// A snapshot file could not be read or parsed.
    #[error("invalid snapshot: {0}")]
    Snapshot(String),
}

impl ProviderError {
    /// Whether this error means "the file is not there" rather than a
    /// transport or lookup failure.
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

/// Result alias for provider operations.
pub type ProviderResult<T> = Result<T, ProviderError>;

/// A commit as reported by the provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Commit {
    /// Full or abbreviated SHA.
    pub sha: String,
    /// Parent SHAs, first parent first.
    #[serde(default)]
    pub parents: Vec<String>,
    /// Commit message (subject line is enough).
    #[serde(default)]
    pub message: String,
}

impl Commit {
    /// Convenience constructor.
    pub fn new(sha: impl Into<String>, parents: &[&str], message: impl Into<String>) -> Self {
        Self {
            sha: sha.into(),
            parents: parents.iter().map(|p| (*p).to_string()).collect(),
            message: message.into(),
        }
    }
}

/// Status of a file in a commit-range diff.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileStatus {
    /// File was created.
    Added,
    /// File content changed.
    Modified,
    /// File was deleted.
    Removed,
    /// File was moved (the record carries the new path).
    Renamed,
    /// File was copied.
    Copied,
    /// File type or mode changed.
    Changed,
    /// Listed but not changed.
    Unchanged,
}

/// One entry of a commit-range diff.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangedFile {
    /// Path relative to the repository root.
    pub filename: String,
    /// What happened to it.
    pub status: FileStatus,
}

impl ChangedFile {
    /// Convenience constructor.
    pub fn new(filename: impl Into<String>, status: FileStatus) -> Self {
        Self {
            filename: filename.into(),
            status,
        }
    }
}

/// Result of comparing two commits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comparison {
    /// Changed files, in provider order. `None` when the provider returned
    /// no file data at all.
    pub files: Option<Vec<ChangedFile>>,
    /// Commits after `base` up to and including `head`, oldest first.
    pub commits: Vec<Commit>,
    /// The base commit itself.
    pub base_commit: Commit,
}

/// File content at a ref, base64-encoded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileContent {
    /// Base64 payload (standard alphabet; embedded newlines are tolerated).
    pub content: String,
}

/// How a branch base was found when the triggering event carried none.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BranchPointKind {
    /// A commit shared with another ref.
    BranchPoint,
    /// The walk reached a root commit.
    Initial,
}

/// Result of walking back from a head to its first shared commit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BranchPoint {
    /// The commit found.
    pub sha: String,
    /// Why the walk stopped there.
    pub kind: BranchPointKind,
}

/// Source of commit-range and file-content data.
///
/// Implementors must be `Send + Sync`: content fetches for one run are
/// issued concurrently from scoped threads.
pub trait GitProvider: Send + Sync {
    /// Compare `base` to `head`.
    fn compare_commits(&self, base: &str, head: &str) -> ProviderResult<Comparison>;

    /// Fetch `path` at `reference`. Missing files yield
    /// [`ProviderError::NotFound`].
    fn get_content(&self, path: &str, reference: &str) -> ProviderResult<FileContent>;

    /// Walk back from `head` until a commit reachable from another ref is
    /// found, or a root commit is hit.
    fn backtrack_to_first_branch_ref(&self, head: &str) -> ProviderResult<BranchPoint>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_status_serializes_lowercase() {
        let json = serde_json::to_string(&ChangedFile::new("a.ts", FileStatus::Renamed)).unwrap();
        assert_eq!(json, r#"{"filename":"a.ts","status":"renamed"}"#);
    }

    #[test]
    fn commit_defaults_optional_fields() {
        let c: Commit = serde_json::from_str(r#"{"sha":"abc"}"#).unwrap();
        assert!(c.parents.is_empty());
        assert!(c.message.is_empty());
    }

    #[test]
    fn not_found_is_distinguished() {
        let nf = ProviderError::NotFound {
            path: "package.json".into(),
            reference: "abc".into(),
        };
        assert!(nf.is_not_found());
        assert!(!ProviderError::UnknownCommit("abc".into()).is_not_found());
        assert_eq!(nf.to_string(), "package.json not found at abc");
    }
}
